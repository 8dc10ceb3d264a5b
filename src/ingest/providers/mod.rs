// src/ingest/providers/mod.rs
pub mod fixture;
pub mod github;

use anyhow::{anyhow, Result};
use serde_json::Value;

/// Extract the record array from a fetched listings document.
///
/// Accepts a bare JSON array or an object wrapping it under `listings`.
pub fn records_from_document(doc: Value) -> Result<Vec<Value>> {
    match doc {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("listings") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(anyhow!("listings document is an object without a `listings` array")),
        },
        other => Err(anyhow!("listings document has unexpected type: {}", type_name(&other))),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_and_wrapped_documents() {
        assert_eq!(records_from_document(json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(
            records_from_document(json!({"listings": [{"id": 1}, {"id": 2}]}))
                .unwrap()
                .len(),
            2
        );
        assert!(records_from_document(json!("nope")).is_err());
    }
}
