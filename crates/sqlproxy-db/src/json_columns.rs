use sqlproxy_core::{Row, RowValue};

use crate::error::DataError;

/// Re-parse each non-empty string cell in the named columns as JSON before
/// the row leaves the driver boundary (spec §4.2 point 6). A parse failure
/// is a hard error for the whole row, not just that cell.
pub fn apply_json_columns(rows: &mut [Row], columns: &[String]) -> Result<(), DataError> {
    for row in rows.iter_mut() {
        for column in columns {
            let Some(cell) = row.get(column) else { continue };
            let RowValue::String(text) = cell else { continue };
            if text.is_empty() {
                continue;
            }
            let parsed: serde_json::Value =
                serde_json::from_str(text).map_err(|e| DataError::JsonColumn {
                    column: column.clone(),
                    detail: e.to_string(),
                })?;
            row.insert(column.clone(), RowValue::Json(parsed));
        }
    }
    Ok(())
}
