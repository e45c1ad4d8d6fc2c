use std::collections::HashMap;

/// Minimal template language for cache keys (spec §6: `<literal>|{{.<name>}}|
/// {{.<name> | default "<lit>"}}`): `{{.name}}` substitutions plus a single
/// pipeline stage, `.name | default "lit"`, that yields `lit` when `.name`
/// is nil or empty.
pub fn build_key(template: &str, params: &HashMap<String, String>) -> Result<String, String> {
    if template.is_empty() {
        return Err("empty template".to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err("parse failure: unterminated '{{'".to_string());
        };
        let expr = after[..end].trim();
        out.push_str(&eval_expr(expr, params)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Evaluate `.<name>` optionally followed by `| default "<lit>"` pipeline stages.
fn eval_expr(expr: &str, params: &HashMap<String, String>) -> Result<String, String> {
    let mut stages = expr.split('|').map(str::trim);
    let field_expr = stages.next().unwrap_or("");
    let mut value = eval_field(field_expr, params)?;
    for stage in stages {
        value = apply_pipeline(stage, value)?;
    }
    Ok(value)
}

fn eval_field(expr: &str, params: &HashMap<String, String>) -> Result<String, String> {
    let name = expr
        .strip_prefix('.')
        .ok_or_else(|| format!("execution failure: unsupported expression '{expr}'"))?;
    Ok(params.get(name).cloned().unwrap_or_default())
}

fn apply_pipeline(stage: &str, value: String) -> Result<String, String> {
    let literal = stage
        .strip_prefix("default ")
        .ok_or_else(|| format!("execution failure: unsupported pipeline stage '{stage}'"))?;
    if value.is_empty() {
        Ok(unquote(literal.trim()))
    } else {
        Ok(value)
    }
}

fn unquote(s: &str) -> String {
    s.trim_matches('"').to_string()
}
