use serde::{Deserialize, Deserializer};

/// The closed set of parameter types a [`ParamConfig`] can declare (spec §4.1).
///
/// Parsed case-insensitively at config-load time so a typo in `type:` is a
/// `ConfigInvalid` load-time error rather than a runtime surprise (spec §9
/// Design Notes: "unknown fields should fail validation at load time").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    Json,
    IntArray,
    StringArray,
    FloatArray,
    BoolArray,
}

impl ParamType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "string" => Some(ParamType::String),
            "int" | "integer" => Some(ParamType::Int),
            "float" | "double" => Some(ParamType::Float),
            "bool" | "boolean" => Some(ParamType::Bool),
            "datetime" | "date" => Some(ParamType::DateTime),
            "json" => Some(ParamType::Json),
            "int[]" => Some(ParamType::IntArray),
            "string[]" => Some(ParamType::StringArray),
            "float[]" => Some(ParamType::FloatArray),
            "bool[]" => Some(ParamType::BoolArray),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for ParamType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ParamType::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown parameter type: {raw}")))
    }
}

/// One declared parameter of a [`crate::QueryConfig`] (spec §3).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    pub default: Option<String>,
}
