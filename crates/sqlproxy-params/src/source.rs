use serde_json::Value;

/// A single parameter's raw, not-yet-converted value, tagged by which
/// source it came from. `Json` carries native JSON shape so nested
/// object/array detection (spec §4.1) is exact; `Form` is always a plain string.
#[derive(Debug, Clone, Copy)]
pub enum RawParam<'a> {
    Json(&'a Value),
    Form(&'a str),
}

/// The two sources a request can supply named parameters from, plus the
/// precedence rule between them (spec §4.1: JSON body, then form/query).
pub struct RequestParams {
    json_body: Option<Value>,
    form_fields: Vec<(String, String)>,
}

impl RequestParams {
    pub fn from_json(json_body: Value, form_fields: Vec<(String, String)>) -> Self {
        Self {
            json_body: Some(json_body),
            form_fields,
        }
    }

    pub fn from_form(form_fields: Vec<(String, String)>) -> Self {
        Self {
            json_body: None,
            form_fields,
        }
    }

    /// Resolve a named parameter's raw value following source precedence.
    pub fn lookup(&self, name: &str) -> Option<RawParam<'_>> {
        if let Some(Value::Object(map)) = &self.json_body {
            if let Some(v) = map.get(name) {
                return Some(RawParam::Json(v));
            }
        }
        self.form_fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| RawParam::Form(v.as_str()))
    }
}
