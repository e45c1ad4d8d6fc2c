use serde_json::{json, Map, Value};

use sqlproxy_config::{ParamConfig, ParamType, QueryConfig};

/// Configuration for the generated OpenAPI document, mirroring
/// `r2e_openapi::OpenApiConfig` minus the `docs_ui` flag — this crate is
/// descriptor generation only, no interactive UI is served (spec §2:
/// "OpenAPI / introspection surface (interface only)").
pub struct OpenApiConfig {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

impl OpenApiConfig {
    pub fn new(title: &str, version: &str) -> Self {
        Self {
            title: title.to_string(),
            version: version.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }
}

/// Build an OpenAPI 3.1.0 document describing every query that is
/// reachable as an HTTP endpoint (`QueryConfig.path.is_some()`). Queries
/// with no `path` are scheduler-only and are not surfaced here.
pub fn build_spec(config: &OpenApiConfig, queries: &[QueryConfig]) -> Value {
    let mut paths: Map<String, Value> = Map::new();

    for query in queries.iter().filter(|q| q.is_http_endpoint()) {
        let path = query.path.as_deref().expect("filtered to http endpoints");
        let method_lower = query.http_method().to_ascii_lowercase();

        let mut operation: Map<String, Value> = Map::new();
        operation.insert("operationId".into(), json!(query.name));

        let parameters: Vec<Value> = query.params.iter().map(param_to_schema).collect();
        if !parameters.is_empty() {
            operation.insert("parameters".into(), json!(parameters));
        }

        operation.insert(
            "responses".into(),
            json!({
                "200": {
                    "description": "Successful response",
                    "content": {
                        "application/json": {
                            "schema": { "type": "array", "items": { "type": "object" } }
                        }
                    }
                },
                "400": { "description": "Invalid or missing parameter" },
                "429": { "description": "Too many concurrent requests for this endpoint" },
                "500": { "description": "Query execution failed" },
                "504": { "description": "Query exceeded its timeout" }
            }),
        );

        paths
            .entry(path.to_string())
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .expect("just inserted as an object")
            .insert(method_lower, Value::Object(operation));
    }

    let mut info: Map<String, Value> = Map::new();
    info.insert("title".into(), json!(config.title));
    info.insert("version".into(), json!(config.version));
    if let Some(ref desc) = config.description {
        info.insert("description".into(), json!(desc));
    }

    json!({
        "openapi": "3.1.0",
        "info": info,
        "paths": paths,
    })
}

fn param_to_schema(param: &ParamConfig) -> Value {
    json!({
        "name": param.name,
        "in": "query",
        "required": param.required,
        "schema": param_type_schema(param.param_type),
    })
}

fn param_type_schema(ty: ParamType) -> Value {
    match ty {
        ParamType::String => json!({ "type": "string" }),
        ParamType::Int => json!({ "type": "integer" }),
        ParamType::Float => json!({ "type": "number" }),
        ParamType::Bool => json!({ "type": "boolean" }),
        ParamType::DateTime => json!({ "type": "string", "format": "date-time" }),
        ParamType::Json => json!({ "type": "object" }),
        ParamType::IntArray => json!({ "type": "array", "items": { "type": "integer" } }),
        ParamType::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        ParamType::FloatArray => json!({ "type": "array", "items": { "type": "number" } }),
        ParamType::BoolArray => json!({ "type": "array", "items": { "type": "boolean" } }),
    }
}
