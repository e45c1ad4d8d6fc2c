use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use sqlproxy_config::ParamType;
use sqlproxy_core::RowValue;

use crate::source::RawParam;

/// Convert one raw parameter value into its bound [`RowValue`], per the
/// conversion rules of spec §4.1. Errors are the short detail string that
/// gets wrapped as `invalid value for parameter <name>: <detail>` by the caller.
pub fn convert(raw: RawParam<'_>, ty: ParamType) -> Result<RowValue, String> {
    // Nested-value rejection applies to every non-JSON, non-array type when
    // the source is a native JSON object/array (spec §4.1: "a non-JSON-typed
    // parameter that receives a nested object or array fails").
    if let RawParam::Json(v) = raw {
        let is_container_type = matches!(
            ty,
            ParamType::Json | ParamType::IntArray | ParamType::StringArray | ParamType::FloatArray | ParamType::BoolArray
        );
        if !is_container_type {
            match v {
                Value::Object(_) => return Err("nested objects not supported".to_string()),
                Value::Array(_) => return Err("arrays not supported".to_string()),
                _ => {}
            }
        }
    }

    match ty {
        ParamType::String => Ok(RowValue::String(scalar_as_string(raw)?)),
        ParamType::Int => Ok(RowValue::Int(parse_int(raw)?)),
        ParamType::Float => Ok(RowValue::Float(parse_float(raw)?)),
        ParamType::Bool => Ok(RowValue::Bool(parse_bool(raw)?)),
        ParamType::DateTime => Ok(RowValue::Timestamp(parse_datetime(raw)?)),
        ParamType::Json => Ok(RowValue::Json(parse_json(raw)?)),
        ParamType::IntArray => Ok(RowValue::Json(Value::Array(parse_array(raw, |e| {
            parse_int(RawParam::Json(e)).map(|i| Value::from(i))
        })?))),
        ParamType::StringArray => Ok(RowValue::Json(Value::Array(parse_array(raw, |e| {
            scalar_as_string(RawParam::Json(e)).map(Value::String)
        })?))),
        ParamType::FloatArray => Ok(RowValue::Json(Value::Array(parse_array(raw, |e| {
            parse_float(RawParam::Json(e)).map(|f| Value::from(f))
        })?))),
        ParamType::BoolArray => Ok(RowValue::Json(Value::Array(parse_array(raw, |e| {
            parse_bool(RawParam::Json(e)).map(Value::Bool)
        })?))),
    }
}

fn scalar_as_string(raw: RawParam<'_>) -> Result<String, String> {
    match raw {
        RawParam::Form(s) => Ok(s.to_string()),
        RawParam::Json(Value::String(s)) => Ok(s.clone()),
        RawParam::Json(Value::Number(n)) => Ok(n.to_string()),
        RawParam::Json(Value::Bool(b)) => Ok(b.to_string()),
        RawParam::Json(Value::Null) => Ok(String::new()),
        RawParam::Json(other) => Ok(other.to_string()),
    }
}

fn parse_int(raw: RawParam<'_>) -> Result<i64, String> {
    match raw {
        RawParam::Json(Value::Number(n)) => n.as_i64().ok_or_else(|| "expected integer".to_string()),
        RawParam::Json(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| "expected integer".to_string()),
        RawParam::Form(s) => s.trim().parse::<i64>().map_err(|_| "expected integer".to_string()),
        RawParam::Json(_) => Err("expected integer".to_string()),
    }
}

fn parse_float(raw: RawParam<'_>) -> Result<f64, String> {
    match raw {
        RawParam::Json(Value::Number(n)) => n.as_f64().ok_or_else(|| "expected float".to_string()),
        RawParam::Json(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| "expected float".to_string()),
        RawParam::Form(s) => s.trim().parse::<f64>().map_err(|_| "expected float".to_string()),
        RawParam::Json(_) => Err("expected float".to_string()),
    }
}

fn parse_bool(raw: RawParam<'_>) -> Result<bool, String> {
    let s = match raw {
        RawParam::Json(Value::Bool(b)) => return Ok(*b),
        RawParam::Json(Value::String(s)) => s.clone(),
        RawParam::Json(Value::Number(n)) => n.to_string(),
        RawParam::Form(s) => s.to_string(),
        RawParam::Json(_) => return Err("expected boolean".to_string()),
    };
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "t" => Ok(true),
        "false" | "0" | "f" => Ok(false),
        _ => Err("expected boolean".to_string()),
    }
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

fn parse_datetime(raw: RawParam<'_>) -> Result<DateTime<Utc>, String> {
    let s = scalar_as_string(raw)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
    }
    Err("expected a recognised date/time format".to_string())
}

fn parse_json(raw: RawParam<'_>) -> Result<Value, String> {
    let value = match raw {
        RawParam::Json(v) => v.clone(),
        RawParam::Form(s) => serde_json::from_str(s).map_err(|e| format!("invalid json: {e}"))?,
    };
    // Canonical round-trip: re-serialize then re-parse so downstream binding
    // always sees the canonical form (spec §4.1: "round-trip through a
    // canonical marshal").
    let canonical = serde_json::to_string(&value).map_err(|e| format!("invalid json: {e}"))?;
    serde_json::from_str(&canonical).map_err(|e| format!("invalid json: {e}"))
}

fn parse_array<F>(raw: RawParam<'_>, convert_elem: F) -> Result<Vec<Value>, String>
where
    F: Fn(&Value) -> Result<Value, String>,
{
    let array = match raw {
        RawParam::Json(Value::Array(arr)) => arr.clone(),
        RawParam::Json(_) => return Err("expected a JSON array".to_string()),
        RawParam::Form(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(arr)) => arr,
            Ok(_) => return Err("expected a JSON array".to_string()),
            Err(_) => return Err("expected a JSON array".to_string()),
        },
    };

    array
        .iter()
        .enumerate()
        .map(|(i, elem)| convert_elem(elem).map_err(|detail| format!("element {i}: {detail}")))
        .collect()
}
