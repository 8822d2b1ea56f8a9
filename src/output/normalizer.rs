//! Response normalizer
//!
//! Coerces the re-formatted model answer into a [`GeneratedCode`] record or
//! reports that it could not. Failures are logged here and surface to callers
//! only as `None`.

use tracing::warn;

use super::literal::{parse_literal, LiteralError};
use super::{ContractError, GeneratedCode};

/// Role tag some chat backends prepend to the message text
pub const ROLE_MARKER: &str = "assistant:";

/// Why a response could not be normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The text is not a single literal value
    Literal(LiteralError),
    /// The literal does not satisfy the record contract
    Contract(ContractError),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::Literal(e) => write!(f, "not a literal: {}", e),
            NormalizeError::Contract(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for NormalizeError {}

impl From<LiteralError> for NormalizeError {
    fn from(e: LiteralError) -> Self {
        NormalizeError::Literal(e)
    }
}

impl From<ContractError> for NormalizeError {
    fn from(e: ContractError) -> Self {
        NormalizeError::Contract(e)
    }
}

/// Remove a leading role marker (case-insensitive) and surrounding whitespace
pub fn strip_role_marker(text: &str) -> &str {
    let text = text.trim();
    match text.get(..ROLE_MARKER.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(ROLE_MARKER) => text[ROLE_MARKER.len()..].trim_start(),
        _ => text,
    }
}

/// Parse and validate a response, returning the reason on failure
pub fn try_normalize(response: &str) -> Result<GeneratedCode, NormalizeError> {
    let value = parse_literal(strip_role_marker(response))?;
    Ok(GeneratedCode::from_value(value)?)
}

/// Parse and validate a response; `None` means the response is unusable
pub fn normalize_response(response: &str) -> Option<GeneratedCode> {
    match try_normalize(response) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "Error processing response");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{'code': "print(1)", 'description': "demo", 'filename': "demo.py"}"#;

    #[test]
    fn test_well_formed_without_marker() {
        let record = normalize_response(WELL_FORMED).unwrap();
        assert_eq!(record.code(), "print(1)");
        assert_eq!(record.description(), "demo");
        assert_eq!(record.filename(), "demo.py");
    }

    #[test]
    fn test_well_formed_with_marker() {
        for prefix in ["assistant:", "assistant: ", "  Assistant:\n"] {
            let record = normalize_response(&format!("{}{}", prefix, WELL_FORMED)).unwrap();
            assert_eq!(record.filename(), "demo.py");
        }
    }

    #[test]
    fn test_marker_inside_code_is_preserved() {
        let record = normalize_response(
            "assistant: {'code': 'role = \"assistant:\"', 'description': 'd', 'filename': 'r.py'}",
        )
        .unwrap();
        assert_eq!(record.code(), "role = \"assistant:\"");
    }

    #[test]
    fn test_plain_json_is_accepted() {
        let record = normalize_response(
            r#"{"code": "echo hi", "description": "greets", "filename": "hi.sh"}"#,
        )
        .unwrap();
        assert_eq!(record.code(), "echo hi");
    }

    #[test]
    fn test_malformed_inputs_return_none() {
        let cases = [
            "",
            "assistant:",
            "I could not produce code this time.",
            "{'code': 'x', 'description': 'y'}",
            "Sure! {'code': 'x', 'description': 'y', 'filename': 'z'}",
            "{'code': 'x', 'description': 'y', 'filename': 'z'} Let me know!",
            "{'code': 'x', 'description': 'y', 'filename': ''}",
            "['x', 'y', 'z']",
            "{'code': 'x', 'description': 'y', 'filename': 'z'",
        ];
        for case in cases {
            assert!(normalize_response(case).is_none(), "expected None for {:?}", case);
        }
    }

    #[test]
    fn test_try_normalize_reports_reason() {
        assert!(matches!(try_normalize("nope"), Err(NormalizeError::Literal(_))));
        assert!(matches!(
            try_normalize("{'code': 'x'}"),
            Err(NormalizeError::Contract(ContractError::Shape(_)))
        ));
    }

    #[test]
    fn test_json_surrogate_pair_escape_is_accepted() {
        let record = normalize_response(
            r#"assistant: {"code": "print('\uD83D\uDE00')", "description": "emoji", "filename": "e.py"}"#,
        )
        .unwrap();
        assert_eq!(record.code(), "print('\u{1F600}')");
        assert_eq!(record.filename(), "e.py");
    }
}
