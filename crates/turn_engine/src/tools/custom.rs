//! Custom tools built from OpenAPI-style schemas
//!
//! One tool instance is built per operation declared under `paths`. Custom
//! tools never go through credential resolution; credentials, if any, are
//! baked into the schema's server definition.

use serde_json::Value;

use crate::error::{Result, TurnError};

use super::CustomToolOperation;

const HTTP_METHODS: &[&str] = &["get", "post", "put", "patch", "delete"];

/// Parses the schema into one operation per path/method pair.
pub fn build_custom_tool_operations(schema: &Value) -> Result<Vec<CustomToolOperation>> {
    let base_url = schema
        .pointer("/servers/0/url")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let paths = schema
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            TurnError::Configuration("custom tool schema has no 'paths' object".to_string())
        })?;

    let mut operations = Vec::new();
    for (path, methods) in paths {
        let Some(methods) = methods.as_object() else {
            continue;
        };
        for (method, operation) in methods {
            if !HTTP_METHODS.contains(&method.as_str()) {
                continue;
            }
            let name = operation
                .get("operationId")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    TurnError::Configuration(format!(
                        "custom tool operation {} {} has no operationId",
                        method.to_ascii_uppercase(),
                        path
                    ))
                })?;
            let description = operation
                .get("description")
                .or_else(|| operation.get("summary"))
                .and_then(Value::as_str)
                .unwrap_or_default();

            operations.push(CustomToolOperation {
                name: name.to_string(),
                description: description.to_string(),
                method: method.to_ascii_uppercase(),
                path: path.clone(),
                base_url: base_url.clone(),
            });
        }
    }

    if operations.is_empty() {
        return Err(TurnError::Configuration(
            "custom tool schema declares no operations".to_string(),
        ));
    }

    Ok(operations)
}
