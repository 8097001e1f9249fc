//! Sandboxed reader for the script that carries the vendor's release data.
//!
//! The vendor page declares its release list as a JavaScript variable whose
//! initializer is a plain object/array literal. Nothing here executes script:
//! the initializer is parsed against a narrow grammar and turned into a
//! [`serde_json::Value`]. Anything outside the grammar is an error.
//!
//! ```text
//! script      := ("var" | "let" | "const") NAME "=" value ";"? EOF
//! value       := object | array | string | number | "true" | "false" | "null"
//! object      := "{" (member ("," member)* ","?)? "}"
//! member      := (IDENT | string | number) ":" value
//! array       := "[" (value ("," value)* ","?)? "]"
//! string      := '"' ... '"' | "'" ... "'"
//! ```
//!
//! Whitespace, `//` line comments and `/* */` block comments may appear
//! between tokens.

use serde_json::{Map, Number, Value};

/// Declaration keywords accepted in front of the variable name.
const KEYWORDS: [&str; 3] = ["var", "let", "const"];

/// Maximum nesting of arrays and objects.
const MAX_DEPTH: usize = 64;

/// A syntax error in the script, with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at byte {offset}")]
pub struct LiteralError {
    /// Byte offset into the script source.
    pub offset: usize,
    /// What was expected or found.
    pub message: String,
}

/// Returns `true` if `source` starts with a declaration of `variable`.
///
/// Only the prefix `KEYWORD NAME =` is checked, so scripts that merely
/// mention the variable elsewhere are not matched.
#[must_use]
pub fn declares(source: &str, variable: &str) -> bool {
    let mut parser = Parser::new(source);
    parser.declaration_prefix(variable).is_ok()
}

/// Parses `source` as a single declaration of `variable` and returns its value.
///
/// # Errors
///
/// Returns a [`LiteralError`] if the script is not exactly one declaration of
/// `variable` initialised with a literal.
pub fn parse_declaration(source: &str, variable: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(source);
    parser.declaration_prefix(variable)?;
    let value = parser.value(0)?;
    parser.skip_trivia()?;
    parser.eat(b';');
    parser.skip_trivia()?;
    if parser.pos < source.len() {
        return Err(parser.error("unexpected trailing content"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LiteralError> {
        self.skip_trivia()?;
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LiteralError> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                let end = trimmed[2..]
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated block comment"))?;
                self.pos += end + 4;
            } else {
                return Ok(());
            }
        }
    }

    fn identifier(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| {
                !(c == '_' || c == '$' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()))
            })
            .map_or(rest.len(), |(i, _)| i);
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn declaration_prefix(&mut self, variable: &str) -> Result<(), LiteralError> {
        self.skip_trivia()?;
        match self.identifier() {
            Some(keyword) if KEYWORDS.contains(&keyword) => {}
            _ => return Err(self.error("expected a variable declaration")),
        }
        self.skip_trivia()?;
        match self.identifier() {
            Some(name) if name == variable => {}
            _ => return Err(self.error(format!("expected variable '{variable}'"))),
        }
        self.expect(b'=')
    }

    fn value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("literal nested too deeply"));
        }
        self.skip_trivia()?;
        match self.peek() {
            Some(b'{') => self.object(depth),
            Some(b'[') => self.array(depth),
            Some(quote @ (b'"' | b'\'')) => self.string(quote).map(Value::String),
            Some(b'-' | b'.' | b'0'..=b'9') => self.number().map(Value::Number),
            Some(_) => {
                let start = self.pos;
                match self.identifier() {
                    Some("true") => Ok(Value::Bool(true)),
                    Some("false") => Ok(Value::Bool(false)),
                    Some("null") => Ok(Value::Null),
                    Some(other) => {
                        self.pos = start;
                        Err(self.error(format!("unsupported expression '{other}'")))
                    }
                    None => Err(self.error("expected a literal value")),
                }
            }
            None => Err(self.error("unexpected end of script")),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut map = Map::new();
        loop {
            self.skip_trivia()?;
            if self.eat(b'}') {
                return Ok(Value::Object(map));
            }

            let key = match self.peek() {
                Some(quote @ (b'"' | b'\'')) => self.string(quote)?,
                Some(b'0'..=b'9') => self.number()?.to_string(),
                _ => self
                    .identifier()
                    .map(str::to_string)
                    .ok_or_else(|| self.error("expected a property name"))?,
            };
            self.expect(b':')?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);

            self.skip_trivia()?;
            if !self.eat(b',') {
                self.expect(b'}')?;
                return Ok(Value::Object(map));
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.eat(b']') {
                return Ok(Value::Array(items));
            }

            items.push(self.value(depth + 1)?);

            self.skip_trivia()?;
            if !self.eat(b',') {
                self.expect(b']')?;
                return Ok(Value::Array(items));
            }
        }
    }

    fn number(&mut self) -> Result<Number, LiteralError> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
            .unwrap_or(rest.len());
        let text = &rest[..len];

        let number = if let Ok(int) = text.parse::<i64>() {
            Number::from(int)
        } else {
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .ok_or_else(|| self.error(format!("invalid number '{text}'")))?
        };
        self.pos += len;
        Ok(number)
    }

    fn string(&mut self, quote: u8) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let mut chars = self.rest().chars();
            let Some(c) = chars.next() else {
                return Err(self.error("unterminated string"));
            };
            self.pos += c.len_utf8();
            match c {
                c if c as u32 == u32::from(quote) => return Ok(out),
                '\n' | '\r' => return Err(self.error("newline in string")),
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let Some(c) = self.rest().chars().next() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += c.len_utf8();
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => {
                let code = self.hex_digits(2)?;
                out.push(char::from_u32(code).ok_or_else(|| self.error("invalid \\x escape"))?);
            }
            'u' => {
                let c = self.unicode_escape()?;
                out.push(c);
            }
            // Line continuation.
            '\n' => {}
            other => out.push(other),
        }
        Ok(())
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, LiteralError> {
        let digits = self
            .rest()
            .get(..count)
            .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid hex escape"))?;
        self.pos += count;
        u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid hex escape"))
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        if self.eat(b'{') {
            let rest = self.rest();
            let end = rest
                .find('}')
                .ok_or_else(|| self.error("unterminated \\u{} escape"))?;
            let code = u32::from_str_radix(&rest[..end], 16)
                .map_err(|_| self.error("invalid \\u{} escape"))?;
            self.pos += end + 1;
            return char::from_u32(code).ok_or_else(|| self.error("invalid code point"));
        }

        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high) {
            if !self.rest().starts_with("\\u") {
                return Err(self.error("unpaired surrogate"));
            }
            self.pos += 2;
            let low = self.hex_digits(4)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error("invalid low surrogate"));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code).ok_or_else(|| self.error("invalid code point"));
        }
        char::from_u32(high).ok_or_else(|| self.error("unpaired surrogate"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_release_list_with_unquoted_keys() {
        let script = r#"var releases = [
            { version: "1.0.0.1", data: [ { architecture: 'x64', url: "http://x/a.cab" }, ] },
        ];"#;

        let value = parse_declaration(script, "releases").unwrap();
        assert_eq!(
            value,
            json!([{ "version": "1.0.0.1", "data": [{ "architecture": "x64", "url": "http://x/a.cab" }] }])
        );
    }

    #[test]
    fn accepts_let_and_const() {
        assert_eq!(parse_declaration("let a = 1", "a").unwrap(), json!(1));
        assert_eq!(parse_declaration("const a = null;", "a").unwrap(), Value::Null);
    }

    #[test]
    fn skips_comments_between_tokens() {
        let script = "/* header */ var a = { // inline\n b: /* c */ true };";
        assert_eq!(parse_declaration(script, "a").unwrap(), json!({ "b": true }));
    }

    #[test]
    fn decodes_string_escapes() {
        let script = r#"var a = ["\x41B\u{43}", 'it\'s', "😀", "a\/b"];"#;
        assert_eq!(
            parse_declaration(script, "a").unwrap(),
            json!(["ABC", "it's", "\u{1F600}", "a/b"])
        );
    }

    #[test]
    fn parses_numbers() {
        let script = "var a = [0, -3, 1.5, 2e3];";
        assert_eq!(parse_declaration(script, "a").unwrap(), json!([0, -3, 1.5, 2000.0]));
    }

    #[test]
    fn keeps_key_order() {
        let value = parse_declaration("var a = { z: 1, a: 2 }", "a").unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a"]);
    }

    #[test]
    fn rejects_function_calls() {
        let err = parse_declaration("var a = fetch('http://evil');", "a").unwrap_err();
        assert!(err.message.contains("unsupported expression 'fetch'"));
        assert_eq!(err.offset, 8);
    }

    #[test]
    fn rejects_identifier_values() {
        assert!(parse_declaration("var a = { b: window };", "a").is_err());
    }

    #[test]
    fn rejects_template_literals() {
        assert!(parse_declaration("var a = `x`;", "a").is_err());
    }

    #[test]
    fn rejects_trailing_statements() {
        let err = parse_declaration("var a = []; alert(1);", "a").unwrap_err();
        assert_eq!(err.message, "unexpected trailing content");
    }

    #[test]
    fn rejects_other_variables() {
        assert!(parse_declaration("var b = [];", "a").is_err());
        assert!(parse_declaration("var ab = [];", "a").is_err());
    }

    #[test]
    fn rejects_unterminated_input() {
        assert!(parse_declaration("var a = [1, 2", "a").is_err());
        assert!(parse_declaration("var a = \"abc", "a").is_err());
        assert!(parse_declaration("var a = /* open", "a").is_err());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let script = format!("var a = {}{};", "[".repeat(100), "]".repeat(100));
        let err = parse_declaration(&script, "a").unwrap_err();
        assert_eq!(err.message, "literal nested too deeply");
    }

    #[test]
    fn declares_checks_only_the_prefix() {
        assert!(declares("  var releases = oops(", "releases"));
        assert!(declares("const releases=[]", "releases"));
        assert!(!declares("releases = []", "releases"));
        assert!(!declares("var other = []", "releases"));
        assert!(!declares("window.releases = []", "releases"));
    }
}
