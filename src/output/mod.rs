//! Structured output contract for code generation
//!
//! Every generation round must end in a [`GeneratedCode`] record with three
//! non-empty string fields: the code itself, a description of it, and the
//! filename it should be saved under. The same three fields are described to
//! the model through [`format_instructions`] and checked again when the model's
//! answer comes back through the [`normalizer`].

pub mod literal;
pub mod normalizer;

use serde::{Deserialize, Serialize};

pub use literal::{parse_literal, LiteralError};
pub use normalizer::{normalize_response, strip_role_marker, try_normalize, NormalizeError, ROLE_MARKER};

/// Field names of the record, in the order they are described to the model
pub const CODE_OUTPUT_FIELDS: [&str; 3] = ["code", "description", "filename"];

/// A validated code generation result
///
/// Fields are private: a record only exists once all three fields have been
/// checked, and it cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CodeOutput")]
pub struct GeneratedCode {
    code: String,
    description: String,
    filename: String,
}

/// Unvalidated wire shape of the record
#[derive(Debug, Deserialize)]
pub struct CodeOutput {
    pub code: String,
    pub description: String,
    pub filename: String,
}

/// Contract violation while building a [`GeneratedCode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// The parsed value is not a dictionary
    NotAnObject,
    /// A field is missing or has the wrong type
    Shape(String),
    /// A required field is present but empty
    EmptyField(&'static str),
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractError::NotAnObject => write!(f, "expected a dictionary with code, description and filename"),
            ContractError::Shape(msg) => write!(f, "invalid record: {}", msg),
            ContractError::EmptyField(field) => write!(f, "field `{}` is empty", field),
        }
    }
}

impl std::error::Error for ContractError {}

impl GeneratedCode {
    /// Build a record, rejecting empty fields
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Self, ContractError> {
        let record = Self {
            code: code.into(),
            description: description.into(),
            filename: filename.into(),
        };
        for (field, value) in CODE_OUTPUT_FIELDS.iter().zip(record.values()) {
            if value.trim().is_empty() {
                return Err(ContractError::EmptyField(*field));
            }
        }
        Ok(record)
    }

    /// Build a record from a parsed literal value
    ///
    /// Extra keys are ignored; missing, non-string or empty required fields fail.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ContractError> {
        if !value.is_object() {
            return Err(ContractError::NotAnObject);
        }
        let raw: CodeOutput =
            serde_json::from_value(value).map_err(|e| ContractError::Shape(e.to_string()))?;
        Self::try_from(raw)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    fn values(&self) -> [&str; 3] {
        [&self.code, &self.description, &self.filename]
    }
}

impl TryFrom<CodeOutput> for GeneratedCode {
    type Error = ContractError;

    fn try_from(raw: CodeOutput) -> Result<Self, Self::Error> {
        GeneratedCode::new(raw.code, raw.description, raw.filename)
    }
}

/// JSON schema of the record, as shown to the model
pub fn code_output_schema() -> serde_json::Value {
    serde_json::json!({
        "title": "CodeOutput",
        "type": "object",
        "properties": {
            "code": { "title": "Code", "type": "string" },
            "description": { "title": "Description", "type": "string" },
            "filename": { "title": "Filename", "type": "string" }
        },
        "required": CODE_OUTPUT_FIELDS
    })
}

/// Append the record's schema and output instructions to a prompt template
///
/// Placeholders in `template` (such as `{response}`) are left untouched.
pub fn format_instructions(template: &str) -> String {
    format!(
        "{}\n\nHere's a JSON schema to follow:\n{}\n\nOutput a valid JSON object but do not repeat the schema.",
        template.trim_end(),
        code_output_schema()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_empty_fields() {
        assert_eq!(
            GeneratedCode::new("", "d", "f.py"),
            Err(ContractError::EmptyField("code"))
        );
        assert_eq!(
            GeneratedCode::new("x", "d", "   "),
            Err(ContractError::EmptyField("filename"))
        );
    }

    #[test]
    fn test_from_value_ignores_extra_keys() {
        let record = GeneratedCode::from_value(json!({
            "code": "print(1)",
            "description": "demo",
            "filename": "demo.py",
            "language": "python"
        }))
        .unwrap();
        assert_eq!(record.code(), "print(1)");
        assert_eq!(record.description(), "demo");
        assert_eq!(record.filename(), "demo.py");
    }

    #[test]
    fn test_from_value_missing_or_wrong_type() {
        assert!(matches!(
            GeneratedCode::from_value(json!({"code": "x", "description": "d"})),
            Err(ContractError::Shape(_))
        ));
        assert!(matches!(
            GeneratedCode::from_value(json!({"code": 1, "description": "d", "filename": "f"})),
            Err(ContractError::Shape(_))
        ));
        assert_eq!(
            GeneratedCode::from_value(json!(["code", "description", "filename"])),
            Err(ContractError::NotAnObject)
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let err = serde_json::from_str::<GeneratedCode>(r#"{"code":"","description":"d","filename":"f"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_format_instructions_keeps_placeholder() {
        let prompt = format_instructions("Here is the response: {response}.");
        assert!(prompt.starts_with("Here is the response: {response}."));
        assert!(prompt.contains("\"required\":[\"code\",\"description\",\"filename\"]"));
        assert!(prompt.ends_with("do not repeat the schema."));
    }
}
