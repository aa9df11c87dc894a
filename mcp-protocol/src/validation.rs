//! Tool catalog and argument validation

use crate::{Error, Result};
use jsonschema::{JSONSchema, ValidationError};
use serde_json::Value;

const MAX_TOOL_NAME_LEN: usize = 64;

/// Protocol validation utilities
pub struct Validator;

impl Validator {
    /// Validate a tool name: 1-64 characters of `[A-Za-z0-9_-]`
    ///
    /// # Errors
    ///
    /// Returns an invalid-params error describing the offending name
    pub fn validate_tool_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_params("Tool name cannot be empty"));
        }
        if name.len() > MAX_TOOL_NAME_LEN {
            return Err(Error::invalid_params(format!(
                "Tool name exceeds {MAX_TOOL_NAME_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::invalid_params(format!(
                "Tool name '{name}' contains invalid characters"
            )));
        }
        Ok(())
    }

    /// Validate that a tool input schema describes an object
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is not an object schema
    pub fn validate_json_schema(schema: &Value) -> Result<()> {
        let Some(obj) = schema.as_object() else {
            return Err(Error::invalid_params("JSON schema must be an object"));
        };
        match obj.get("type").and_then(Value::as_str) {
            Some("object") => Ok(()),
            Some(other) => Err(Error::invalid_params(format!(
                "Tool input schema must have type 'object', found '{other}'"
            ))),
            None => Err(Error::invalid_params("JSON schema must have a 'type' field")),
        }
    }

    /// Render validation errors as a single readable line
    pub fn format_validation_errors<'a>(errors: impl Iterator<Item = ValidationError<'a>>) -> String {
        let messages: Vec<String> = errors
            .map(|error| {
                let path_str = error.instance_path.to_string();
                if path_str.is_empty() {
                    error.to_string()
                } else {
                    format!("at '{path_str}': {error}")
                }
            })
            .collect();

        if messages.is_empty() {
            "Unknown validation error".to_string()
        } else {
            messages.join("; ")
        }
    }
}

/// A tool input schema compiled once at catalog build time
pub struct ArgumentSchema {
    compiled: JSONSchema,
}

impl std::fmt::Debug for ArgumentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentSchema").finish_non_exhaustive()
    }
}

impl ArgumentSchema {
    /// Compile `schema`, rejecting anything that is not a valid object schema
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is malformed
    pub fn compile(schema: &Value) -> Result<Self> {
        Validator::validate_json_schema(schema)?;
        let compiled = JSONSchema::compile(schema)
            .map_err(|e| Error::invalid_params(format!("Invalid JSON schema: {e}")))?;
        Ok(Self { compiled })
    }

    /// Validate tool arguments. Missing arguments are treated as `{}`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-params error listing every violation
    pub fn validate(&self, arguments: Option<&Value>) -> Result<()> {
        let empty = Value::Object(Default::default());
        let instance = arguments.unwrap_or(&empty);
        self.compiled.validate(instance).map_err(|errors| {
            Error::invalid_params(format!(
                "Invalid arguments: {}",
                Validator::format_validation_errors(errors)
            ))
        })
    }
}
