//! Prompt templates
//!
//! Two fixed templates ship with the binary:
//! - `code_generator.txt` - the operating context given to the reasoning agent
//! - `code_parser.txt` - the re-format prompt that turns a free-text answer into
//!   the structured record (contains a `{response}` placeholder)
//!
//! Either can be overridden by placing a file of the same name in a prompt
//! directory.

use std::path::Path;

/// File name of the agent context template
pub const CONTEXT_TEMPLATE: &str = "code_generator.txt";

/// File name of the re-format template
pub const CODE_PARSER_TEMPLATE: &str = "code_parser.txt";

const DEFAULT_CONTEXT: &str = include_str!("templates/code_generator.txt");
const DEFAULT_CODE_PARSER: &str = include_str!("templates/code_parser.txt");

/// Read a template, preferring `dir/name` when a directory is given
///
/// Names without a built-in default must exist in `dir`.
pub fn get_raw_template(dir: Option<&Path>, name: &str) -> std::io::Result<String> {
    if let Some(dir) = dir {
        let path = dir.join(name);
        if path.is_file() {
            return std::fs::read_to_string(path);
        }
    }
    match name {
        CONTEXT_TEMPLATE => Ok(DEFAULT_CONTEXT.to_string()),
        CODE_PARSER_TEMPLATE => Ok(DEFAULT_CODE_PARSER.to_string()),
        other => Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no prompt template named {}", other),
        )),
    }
}

/// The agent's operating context
pub fn get_context(dir: Option<&Path>) -> std::io::Result<String> {
    get_raw_template(dir, CONTEXT_TEMPLATE)
}

/// The re-format template (before output instructions are appended)
pub fn get_code_parser_template(dir: Option<&Path>) -> std::io::Result<String> {
    get_raw_template(dir, CODE_PARSER_TEMPLATE)
}

/// A template with `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute placeholders in a single pass
    ///
    /// Unknown placeholders and other braces are kept as-is, and substituted
    /// values are never scanned again.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let name_len = after
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];
            let closes = after[name_len..].starts_with('}');

            match vars.iter().find(|(key, _)| *key == name) {
                Some((_, value)) if closes && !name.is_empty() => {
                    out.push_str(value);
                    rest = &after[name_len + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_placeholders() {
        let tmpl = PromptTemplate::new("Here is the response: {response}.");
        assert_eq!(tmpl.render(&[("response", "abc")]), "Here is the response: abc.");
    }

    #[test]
    fn test_render_keeps_unknown_and_json_braces() {
        let tmpl = PromptTemplate::new("{other} {\"type\": \"object\"} {response}");
        assert_eq!(
            tmpl.render(&[("response", "x")]),
            "{other} {\"type\": \"object\"} x"
        );
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let tmpl = PromptTemplate::new("{response}");
        assert_eq!(tmpl.render(&[("response", "{response}")]), "{response}");
    }

    #[test]
    fn test_builtin_templates() {
        let parser = get_code_parser_template(None).unwrap();
        assert!(parser.contains("{response}"));
        let context = get_context(None).unwrap();
        assert!(context.contains("code_generation"));
        assert!(context.contains("code_reader"));
        assert!(get_raw_template(None, "missing.txt").is_err());
    }

    #[test]
    fn test_template_override_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONTEXT_TEMPLATE), "custom context").unwrap();
        assert_eq!(get_context(Some(dir.path())).unwrap(), "custom context");
        // Falls back to the built-in when the directory has no override
        assert!(get_code_parser_template(Some(dir.path())).unwrap().contains("{response}"));
    }
}
