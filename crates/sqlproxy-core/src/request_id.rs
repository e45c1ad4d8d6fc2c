use std::fmt;

/// Maximum length a sanitised incoming request-id header is allowed to keep (spec §4.5.1).
const MAX_HEADER_LEN: usize = 128;

/// A request identifier, either propagated from an incoming header or generated fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Resolve a request id the way the handler's `RECEIVED` step does:
    /// prefer a sanitised `X-Request-ID`, then `X-Correlation-ID`, else generate one.
    pub fn resolve(x_request_id: Option<&str>, x_correlation_id: Option<&str>) -> Self {
        if let Some(raw) = x_request_id.or(x_correlation_id) {
            let sanitised = sanitise_header(raw);
            if !sanitised.is_empty() {
                return RequestId(sanitised);
            }
        }
        RequestId(generate())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generate a fresh id: 8 random bytes, hex-encoded to 16 characters.
pub fn generate() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Strip CR/LF/NUL/TAB/DEL and other control characters from a header value
/// and cap its length at [`MAX_HEADER_LEN`].
///
/// Header-splitting attempts (embedded CRLF followed by another header name)
/// collapse into a single line because every control character is dropped
/// outright, not merely replaced — there is nothing left for a downstream
/// log sink to re-split on.
pub fn sanitise_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .take(MAX_HEADER_LEN)
        .collect()
}
