//! Literal-only parser for model output
//!
//! Models asked for structured output answer with dictionary-literal text such as
//! `{'code': "...", 'description': "...", 'filename': "..."}` (single-quoted keys,
//! `True`/`None`, trailing commas) or with plain JSON. This parser accepts both and
//! turns them into a [`serde_json::Value`].
//!
//! Only literal containers, strings, numbers, booleans and null are understood.
//! Names, calls, operators and every other expression are rejected, so nothing
//! in the input is ever evaluated.

use serde_json::{Map, Number, Value};

/// Maximum nesting of dicts/lists/tuples before the input is rejected.
const MAX_DEPTH: usize = 64;

/// Error produced when the input is not a single well-formed literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    /// Byte offset into the input where parsing stopped
    pub offset: usize,
    /// What went wrong
    pub message: String,
}

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// Parse `input` as exactly one literal value.
///
/// Leading/trailing whitespace and `#` comments are allowed; anything else
/// surrounding the literal (prose, a second value) is an error.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    parser.skip_trivia();
    let value = parser.parse_value()?;
    parser.skip_trivia();
    if parser.pos != input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected `{}`, found `{}`", expected, c))),
            None => Err(self.error(format!("expected `{}`, found end of input", expected))),
        }
    }

    /// Skip whitespace, comments and explicit line continuations.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('\\') if self.rest()[1..].starts_with('\n') => {
                    self.pos += 2;
                }
                _ => break,
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        if self.string_prefix_len().is_some() {
            return self.parse_strings();
        }
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('{') => self.nested(Self::parse_dict),
            Some('[') => self.nested(|p| p.parse_sequence('[', ']').map(|(items, _)| Value::Array(items))),
            Some('(') => self.nested(Self::parse_parenthesized),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            Some(c) => Err(self.error(format!("unexpected character `{}`", c))),
        }
    }

    fn nested(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        self.skip_trivia();
        if self.peek() == Some('}') {
            self.bump();
            return Ok(Value::Object(map));
        }
        loop {
            let key_offset = self.pos;
            let key = match self.parse_value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => {
                    return Err(LiteralError {
                        offset: key_offset,
                        message: "unsupported dictionary key".to_string(),
                    })
                }
            };
            self.skip_trivia();
            self.expect(':')?;
            self.skip_trivia();
            let value = self.parse_value()?;
            // Later duplicates win, as with a dict display.
            map.insert(key, value);
            self.skip_trivia();
            match self.bump() {
                Some(',') => {
                    self.skip_trivia();
                    if self.peek() == Some('}') {
                        self.bump();
                        break;
                    }
                }
                Some('}') => break,
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.error(format!("expected `,` or `}}`, found `{}`", c)));
                }
                None => return Err(self.error("unterminated dictionary")),
            }
        }
        Ok(Value::Object(map))
    }

    /// Parse `open item, item, ... close`; also reports whether any comma was seen.
    fn parse_sequence(&mut self, open: char, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        let mut saw_comma = false;
        self.skip_trivia();
        if self.peek() == Some(close) {
            self.bump();
            return Ok((items, saw_comma));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_trivia();
            match self.bump() {
                Some(',') => {
                    saw_comma = true;
                    self.skip_trivia();
                    if self.peek() == Some(close) {
                        self.bump();
                        break;
                    }
                }
                Some(c) if c == close => break,
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.error(format!("expected `,` or `{}`, found `{}`", close, c)));
                }
                None => return Err(self.error(format!("unterminated sequence, expected `{}`", close))),
            }
        }
        Ok((items, saw_comma))
    }

    /// `(x)` is just `x`; `()` and `(x,)` are tuples, represented as arrays.
    fn parse_parenthesized(&mut self) -> Result<Value, LiteralError> {
        let (mut items, saw_comma) = self.parse_sequence('(', ')')?;
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    fn parse_keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            name => Err(LiteralError {
                offset: start,
                message: format!("unsupported name `{}`", name),
            }),
        }
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut negative = false;
        while let Some(c @ ('-' | '+')) = self.peek() {
            if c == '-' {
                negative = !negative;
            }
            self.bump();
            self.skip_trivia();
        }

        let digits_start = self.pos;
        let radix = match self.rest().get(..2) {
            Some("0x") | Some("0X") => Some(16),
            Some("0o") | Some("0O") => Some(8),
            Some("0b") | Some("0B") => Some(2),
            _ => None,
        };

        if let Some(radix) = radix {
            self.pos += 2;
            let body_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let body: String = self.src[body_start..self.pos].chars().filter(|c| *c != '_').collect();
            let magnitude = i64::from_str_radix(&body, radix).map_err(|_| LiteralError {
                offset: digits_start,
                message: "invalid integer literal".to_string(),
            })?;
            let value = if negative { -magnitude } else { magnitude };
            return Ok(Value::Number(Number::from(value)));
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {
                    self.bump();
                }
                '.' => {
                    is_float = true;
                    self.bump();
                }
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if let Some('+' | '-') = self.peek() {
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let text: String = self.src[digits_start..self.pos].chars().filter(|c| *c != '_').collect();
        if text.is_empty() || text == "." {
            return Err(LiteralError {
                offset: start,
                message: "expected a number".to_string(),
            });
        }
        let invalid = || LiteralError {
            offset: digits_start,
            message: format!("invalid number `{}`", text),
        };

        if is_float {
            let magnitude: f64 = text.parse().map_err(|_| invalid())?;
            let value = if negative { -magnitude } else { magnitude };
            return Number::from_f64(value).map(Value::Number).ok_or_else(invalid);
        }

        if negative {
            let magnitude: i128 = text.parse().map_err(|_| invalid())?;
            let value = i64::try_from(-magnitude).map_err(|_| invalid())?;
            Ok(Value::Number(Number::from(value)))
        } else {
            let value: u64 = text.parse().map_err(|_| invalid())?;
            Ok(Value::Number(Number::from(value)))
        }
    }

    /// Length of a string prefix (`r`, `u`, `b`, `rb`, `br`) if a string literal starts here.
    fn string_prefix_len(&self) -> Option<usize> {
        let rest = self.rest();
        let prefix_len = rest
            .chars()
            .take_while(|c| matches!(c, 'r' | 'R' | 'u' | 'U' | 'b' | 'B'))
            .count();
        if prefix_len > 2 {
            return None;
        }
        let prefix = rest[..prefix_len].to_ascii_lowercase();
        if !matches!(prefix.as_str(), "" | "r" | "u" | "b" | "rb" | "br") {
            return None;
        }
        match rest[prefix_len..].chars().next() {
            Some('\'') | Some('"') => Some(prefix_len),
            _ => None,
        }
    }

    /// Parse one or more adjacent string literals and concatenate them.
    fn parse_strings(&mut self) -> Result<Value, LiteralError> {
        let mut out = String::new();
        while let Some(prefix_len) = self.string_prefix_len() {
            let raw = self.src[self.pos..self.pos + prefix_len]
                .chars()
                .any(|c| c == 'r' || c == 'R');
            self.pos += prefix_len;
            self.parse_string_body(raw, &mut out)?;
            self.skip_trivia();
        }
        Ok(Value::String(out))
    }

    fn parse_string_body(&mut self, raw: bool, out: &mut String) -> Result<(), LiteralError> {
        let start = self.pos;
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a string")),
        };
        let triple: String = std::iter::repeat(quote).take(3).collect();
        let is_triple = self.src[start..].starts_with(&triple);
        if is_triple {
            self.pos = start + 3;
        }

        loop {
            let c = self.bump().ok_or_else(|| LiteralError {
                offset: start,
                message: "unterminated string".to_string(),
            })?;
            match c {
                c if c == quote => {
                    if !is_triple {
                        return Ok(());
                    }
                    if self.rest().starts_with(&triple[..2]) {
                        self.pos += 2;
                        return Ok(());
                    }
                    out.push(c);
                }
                '\n' if !is_triple => {
                    return Err(self.error("newline in single-quoted string"));
                }
                '\\' if raw => {
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                '\\' => self.parse_escape(out)?,
                c => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let escape_start = self.pos - 1;
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        match c {
            '\n' => {}
            '\\' | '\'' | '"' => out.push(c),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid octal escape"))?);
            }
            'x' => out.push(self.hex_char(2, escape_start)?),
            'u' => out.push(self.utf16_escape(escape_start)?),
            'U' => out.push(self.hex_char(8, escape_start)?),
            other => {
                // Unknown escapes keep their backslash.
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    /// Reads `len` hex digits after the escape letter
    fn hex_escape(&mut self, len: usize, escape_start: usize) -> Result<u32, LiteralError> {
        let invalid = || LiteralError {
            offset: escape_start,
            message: "invalid hex escape".to_string(),
        };
        let digits = self.rest().get(..len).ok_or_else(invalid)?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let code = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
        self.pos += len;
        Ok(code)
    }

    fn hex_char(&mut self, len: usize, escape_start: usize) -> Result<char, LiteralError> {
        let code = self.hex_escape(len, escape_start)?;
        char::from_u32(code).ok_or_else(|| LiteralError {
            offset: escape_start,
            message: "invalid hex escape".to_string(),
        })
    }

    /// `\uXXXX`, joining a UTF-16 surrogate pair into one char.
    ///
    /// A surrogate without its partner becomes U+FFFD.
    fn utf16_escape(&mut self, escape_start: usize) -> Result<char, LiteralError> {
        let code = self.hex_escape(4, escape_start)?;
        match code {
            0xD800..=0xDBFF => {
                let low_start = self.pos;
                if self.rest().starts_with("\\u") {
                    self.pos += 2;
                    match self.hex_escape(4, low_start) {
                        Ok(low @ 0xDC00..=0xDFFF) => {
                            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                            return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                        }
                        // Not a low surrogate: leave it to be read as its own escape
                        _ => self.pos = low_start,
                    }
                }
                Ok(char::REPLACEMENT_CHARACTER)
            }
            0xDC00..=0xDFFF => Ok(char::REPLACEMENT_CHARACTER),
            _ => char::from_u32(code).ok_or_else(|| LiteralError {
                offset: escape_start,
                message: "invalid hex escape".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_quoted_dict() {
        let value = parse_literal("{'code': 'print(1)', 'description': \"demo\", 'filename': 'demo.py'}")
            .unwrap();
        assert_eq!(
            value,
            json!({"code": "print(1)", "description": "demo", "filename": "demo.py"})
        );
    }

    #[test]
    fn test_json_spellings_and_python_keywords() {
        assert_eq!(parse_literal("[true, False, null, None]").unwrap(), json!([true, false, null, null]));
    }

    #[test]
    fn test_escapes_in_code_strings() {
        let value = parse_literal(r#"'import os\nprint(\'hi\')\t\x41\u00e9'"#).unwrap();
        assert_eq!(value, json!("import os\nprint('hi')\tAé"));
    }

    #[test]
    fn test_unknown_escape_keeps_backslash() {
        assert_eq!(parse_literal(r"'C:\d'").unwrap(), json!("C:\\d"));
    }

    #[test]
    fn test_raw_string() {
        assert_eq!(parse_literal(r"r'\n\d'").unwrap(), json!("\\n\\d"));
    }

    #[test]
    fn test_triple_quoted_multiline() {
        let value = parse_literal("\"\"\"line one\nline \"two\" here\"\"\"").unwrap();
        assert_eq!(value, json!("line one\nline \"two\" here"));
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        assert_eq!(parse_literal("('abc'\n 'def')").unwrap(), json!("abcdef"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_literal("[1, -2, 3.5, 1e3, 0x1f, 1_000]").unwrap(), json!([1, -2, 3.5, 1000.0, 31, 1000]));
    }

    #[test]
    fn test_tuples_and_trailing_commas() {
        assert_eq!(parse_literal("((1,), (2), (), {'a': 1,},)").unwrap(), json!([[1], 2, [], {"a": 1}]));
    }

    #[test]
    fn test_comments_are_ignored() {
        assert_eq!(parse_literal("{ # header\n 'a': 1 # value\n}").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_rejects_names_and_calls() {
        assert!(parse_literal("__import__('os').system('id')").is_err());
        assert!(parse_literal("{'code': open('x').read()}").is_err());
    }

    #[test]
    fn test_rejects_surrounding_prose() {
        let err = parse_literal("Here you go: {'a': 1}").unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(parse_literal("{'a': 1} hope that helps").is_err());
    }

    #[test]
    fn test_rejects_unterminated_input() {
        assert!(parse_literal("{'a': 'b'").is_err());
        assert!(parse_literal("'abc").is_err());
        assert!(parse_literal("").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        let err = parse_literal(&deep).unwrap_err();
        assert!(err.message.contains("nested too deeply"));

        let ok = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_literal(&ok).is_ok());
    }

    #[test]
    fn test_surrogate_pair_escape_joins_into_one_char() {
        let value = parse_literal(r#"{"code": "print('\uD83D\uDE00')", "description": "d", "filename": "e.py"}"#)
            .unwrap();
        assert_eq!(value["code"], json!("print('\u{1F600}')"));
    }

    #[test]
    fn test_lone_surrogate_becomes_replacement_char() {
        assert_eq!(parse_literal(r#""\uD83Dx""#).unwrap(), json!("\u{FFFD}x"));
        assert_eq!(parse_literal(r#""\uDE00""#).unwrap(), json!("\u{FFFD}"));
        assert_eq!(parse_literal(r#""\uD83DA""#).unwrap(), json!("\u{FFFD}A"));
    }

    #[test]
    fn test_hex_escape_requires_hex_digits() {
        assert!(parse_literal(r"'\x+1'").is_err());
        assert!(parse_literal(r#""\u+041""#).is_err());
        assert!(parse_literal(r"'\U+0001F60'").is_err());
    }
}
