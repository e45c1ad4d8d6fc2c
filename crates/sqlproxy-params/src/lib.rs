//! Typed parameter parsing engine (spec §4.1).
//!
//! This crate is IO-free: it never reads a socket or a body itself. Callers
//! (the handler crate, or tests) hand it an already-parsed JSON body and an
//! already-parsed form/query field list; it does the precedence resolution,
//! type conversion, and deterministic error reporting.

mod convert;
mod source;

pub use source::RequestParams;

use sqlproxy_config::{ParamConfig, ParamType};
use sqlproxy_core::{AppError, Row};

/// Parse and bind every declared parameter against the request's available
/// sources, following the precedence and failure rules of spec §4.1.
pub fn parse_parameters(request: &RequestParams, specs: &[ParamConfig]) -> Result<Row, AppError> {
    let mut out = Row::new();

    for spec in specs {
        match request.lookup(&spec.name) {
            Some(raw) => {
                let value = convert::convert(raw, spec.param_type).map_err(|detail| {
                    AppError::ParamInvalid {
                        name: spec.name.clone(),
                        detail,
                    }
                })?;
                out.insert(spec.name.clone(), value);
            }
            None => {
                if let Some(default) = &spec.default {
                    let raw = source::RawParam::Form(default);
                    let value = convert::convert(raw, spec.param_type).map_err(|detail| {
                        AppError::ParamInvalid {
                            name: spec.name.clone(),
                            detail,
                        }
                    })?;
                    out.insert(spec.name.clone(), value);
                } else if spec.required {
                    return Err(AppError::ParamMissing(spec.name.clone()));
                }
                // Optional, absent, no default: omit — the driver binds NULL
                // for any `@name` referenced in SQL with no bound value.
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlproxy_config::ParamType;

    fn spec(name: &str, ty: ParamType, required: bool) -> ParamConfig {
        ParamConfig {
            name: name.to_string(),
            param_type: ty,
            required,
            default: None,
        }
    }

    #[test]
    fn missing_required_param_fails() {
        let req = RequestParams::from_form(vec![]);
        let err = parse_parameters(&req, &[spec("status", ParamType::String, true)]).unwrap_err();
        assert_eq!(err.client_message(), "missing required parameter: status");
    }

    #[test]
    fn optional_missing_param_is_omitted() {
        let req = RequestParams::from_form(vec![]);
        let row = parse_parameters(&req, &[spec("status", ParamType::String, false)]).unwrap();
        assert!(!row.contains_key("status"));
    }

    #[test]
    fn default_is_used_when_absent() {
        let mut s = spec("page", ParamType::Int, false);
        s.default = Some("1".to_string());
        let req = RequestParams::from_form(vec![]);
        let row = parse_parameters(&req, &[s]).unwrap();
        assert_eq!(row.get("page").unwrap(), &sqlproxy_core::RowValue::Int(1));
    }

    #[test]
    fn form_field_is_used_when_present() {
        let req = RequestParams::from_form(vec![("status".to_string(), "active".to_string())]);
        let row = parse_parameters(&req, &[spec("status", ParamType::String, true)]).unwrap();
        assert_eq!(
            row.get("status").unwrap(),
            &sqlproxy_core::RowValue::String("active".to_string())
        );
    }

    #[test]
    fn json_body_takes_precedence_over_form() {
        let req = RequestParams::from_json(
            json!({"status": "inactive"}),
            vec![("status".to_string(), "active".to_string())],
        );
        let row = parse_parameters(&req, &[spec("status", ParamType::String, true)]).unwrap();
        assert_eq!(
            row.get("status").unwrap(),
            &sqlproxy_core::RowValue::String("inactive".to_string())
        );
    }

    #[test]
    fn int_array_from_json_body() {
        let req = RequestParams::from_json(json!({"ids": [1, 2]}), vec![]);
        let row = parse_parameters(&req, &[spec("ids", ParamType::IntArray, true)]).unwrap();
        match row.get("ids").unwrap() {
            sqlproxy_core::RowValue::Json(serde_json::Value::Array(arr)) => {
                assert_eq!(arr.len(), 2);
            }
            other => panic!("expected json array, got {other:?}"),
        }
    }

    #[test]
    fn int_array_element_type_error_reports_index() {
        let req = RequestParams::from_json(json!({"ids": ["not", "integers"]}), vec![]);
        let err = parse_parameters(&req, &[spec("ids", ParamType::IntArray, true)]).unwrap_err();
        assert!(err.client_message().contains("expected integer"));
    }

    #[test]
    fn bad_int_rejects_decimal() {
        let req = RequestParams::from_form(vec![("n".to_string(), "1.5".to_string())]);
        let err = parse_parameters(&req, &[spec("n", ParamType::Int, true)]).unwrap_err();
        assert!(err.client_message().contains("expected integer"));
    }

    #[test]
    fn nested_object_rejected_for_non_json_param() {
        let req = RequestParams::from_json(json!({"status": {"nested": true}}), vec![]);
        let err = parse_parameters(&req, &[spec("status", ParamType::String, true)]).unwrap_err();
        assert!(err.client_message().contains("nested objects not supported"));
    }

    #[test]
    fn array_rejected_for_non_array_param() {
        let req = RequestParams::from_json(json!({"status": [1, 2]}), vec![]);
        let err = parse_parameters(&req, &[spec("status", ParamType::String, true)]).unwrap_err();
        assert!(err.client_message().contains("arrays not supported"));
    }

    #[test]
    fn bool_accepts_common_forms() {
        for (raw, expected) in [("true", true), ("0", false), ("T", true), ("f", false)] {
            let req = RequestParams::from_form(vec![("flag".to_string(), raw.to_string())]);
            let row = parse_parameters(&req, &[spec("flag", ParamType::Bool, true)]).unwrap();
            assert_eq!(row.get("flag").unwrap(), &sqlproxy_core::RowValue::Bool(expected));
        }
    }

    #[test]
    fn datetime_accepts_date_only() {
        let req = RequestParams::from_form(vec![("d".to_string(), "2024-01-01".to_string())]);
        let row = parse_parameters(&req, &[spec("d", ParamType::DateTime, true)]).unwrap();
        assert!(matches!(row.get("d").unwrap(), sqlproxy_core::RowValue::Timestamp(_)));
    }
}
