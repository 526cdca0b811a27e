//! Parser for the `bl_info` metadata literal.
//!
//! Add-ons declare their metadata as a Python dict literal. This module
//! understands the subset of Python literal syntax that shows up there and
//! turns it into a JSON value:
//!
//! - dicts with string keys, tuples and lists (both become arrays)
//! - single, double and triple quoted strings with `r`/`u` prefixes
//! - implicit concatenation of adjacent string literals
//! - ints, floats, `True`, `False`, `None`
//! - `#` comments and trailing commas

use serde_json::{Map, Number, Value};

/// Nesting limit for containers inside the literal.
const MAX_NESTING: usize = 32;

/// Error produced when the literal is not in the supported dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    /// Byte offset of the failure.
    pub offset: usize,
    /// What went wrong.
    pub message: &'static str,
}

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// Finds the first `bl_info = {...}` assignment in `source` that parses.
///
/// Returns `None` if there is no such assignment.
#[must_use]
pub fn find_bl_info(source: &str) -> Option<Map<String, Value>> {
    const MARKER: &str = "bl_info";

    let mut search_from = 0;
    while let Some(found) = source[search_from..].find(MARKER) {
        let start = search_from + found;
        search_from = start + MARKER.len();

        if !at_identifier_boundary(source, start, MARKER.len()) {
            continue;
        }

        let Some(open) = assignment_brace(source, search_from) else {
            continue;
        };

        let mut parser = Parser::new(source, open);
        if let Ok(Value::Object(map)) = parser.parse_value(0) {
            return Some(map);
        }
    }

    None
}

/// Parses a complete literal (e.g. `{'a': (1, 2)}`) into a JSON value.
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(text, 0);
    let value = parser.parse_value(0)?;
    parser.skip_trivia();
    if parser.pos != text.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

fn at_identifier_boundary(source: &str, start: usize, len: usize) -> bool {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let before = source[..start].chars().next_back();
    let after = source[start + len..].chars().next();
    !before.is_some_and(is_ident) && !after.is_some_and(is_ident)
}

/// Returns the offset of `{` if `rest` continues with `= {`.
fn assignment_brace(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut pos = skip_inline_space(bytes, from);
    if bytes.get(pos) != Some(&b'=') || bytes.get(pos + 1) == Some(&b'=') {
        return None;
    }
    pos = skip_inline_space(bytes, pos + 1);
    (bytes.get(pos) == Some(&b'{')).then_some(pos)
}

/// Skips spaces, tabs and `\` line continuations.
fn skip_inline_space(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        match bytes.get(pos..) {
            Some([b' ' | b'\t', ..]) => pos += 1,
            Some([b'\\', b'\n', ..]) => pos += 2,
            Some([b'\\', b'\r', b'\n', ..]) => pos += 3,
            _ => return pos,
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, pos: usize) -> Self {
        Self { src, pos }
    }

    fn error(&self, message: &'static str) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Skips whitespace, newlines, line continuations and comments.
    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '\\' if self.rest()[1..].starts_with('\n')
                    || self.rest()[1..].starts_with("\r\n") =>
                {
                    self.bump();
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    fn expect(&mut self, wanted: char, message: &'static str) -> Result<(), LiteralError> {
        self.skip_trivia();
        if self.peek() == Some(wanted) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_NESTING {
            return Err(self.error("nesting too deep"));
        }

        self.skip_trivia();
        match self.peek() {
            Some('{') => self.parse_dict(depth),
            Some('(') => self.parse_sequence(')', depth),
            Some('[') => self.parse_sequence(']', depth),
            Some(c) if c == '\'' || c == '"' || self.at_prefixed_string() => {
                self.parse_strings().map(Value::String)
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                self.parse_number()
            }
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_dict(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.expect('{', "expected '{'")?;
        let mut map = Map::new();

        loop {
            self.skip_trivia();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }

            let key = match self.parse_value(depth + 1)? {
                Value::String(key) => key,
                _ => return Err(self.error("dict keys must be strings")),
            };
            self.expect(':', "expected ':'")?;
            let value = self.parse_value(depth + 1)?;
            map.insert(key, value);

            self.skip_trivia();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_sequence(&mut self, close: char, depth: usize) -> Result<Value, LiteralError> {
        self.bump();
        let mut items = Vec::new();

        loop {
            self.skip_trivia();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(Value::Array(items));
            }

            items.push(self.parse_value(depth + 1)?);

            self.skip_trivia();
            match self.bump() {
                Some(',') => {}
                Some(c) if c == close => return Ok(Value::Array(items)),
                _ => return Err(self.error("expected ',' or closing bracket")),
            }
        }
    }

    /// True if the cursor sits on a string prefix such as `r'` or `u"`.
    fn at_prefixed_string(&self) -> bool {
        let mut chars = self.rest().chars();
        matches!(
            (chars.next(), chars.next()),
            (Some('r' | 'R' | 'u' | 'U'), Some('\'' | '"'))
        )
    }

    /// Parses one or more adjacent string literals and joins them.
    fn parse_strings(&mut self) -> Result<String, LiteralError> {
        let mut out = self.parse_string()?;
        loop {
            let checkpoint = self.pos;
            self.skip_trivia();
            match self.peek() {
                Some('\'' | '"') => out.push_str(&self.parse_string()?),
                Some(_) if self.at_prefixed_string() => out.push_str(&self.parse_string()?),
                _ => {
                    self.pos = checkpoint;
                    return Ok(out);
                }
            }
        }
    }

    fn parse_string(&mut self) -> Result<String, LiteralError> {
        let mut raw = false;
        if let Some(c @ ('r' | 'R' | 'u' | 'U')) = self.peek() {
            raw = matches!(c, 'r' | 'R');
            self.bump();
        }

        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected string")),
        };
        let triple = if quote == '"' { "\"\"\"" } else { "'''" };
        let is_triple = self.rest().starts_with(&triple[1..]);
        if is_triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            if is_triple && self.rest().starts_with(triple) {
                self.pos += 3;
                return Ok(out);
            }

            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote && !is_triple => return Ok(out),
                Some('\n') if !is_triple => return Err(self.error("newline in string")),
                Some('\\') if raw => {
                    out.push('\\');
                    if let Some(next) = self.bump() {
                        out.push(next);
                    }
                }
                Some('\\') => self.parse_escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        match self.bump() {
            Some('\n') => {}
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('x') => out.push(self.parse_hex_escape(2)?),
            Some('u') => out.push(self.parse_hex_escape(4)?),
            Some('U') => out.push(self.parse_hex_escape(8)?),
            Some(other) => {
                // Python keeps unknown escapes verbatim
                out.push('\\');
                out.push(other);
            }
            None => return Err(self.error("unterminated escape")),
        }
        Ok(())
    }

    fn parse_hex_escape(&mut self, len: usize) -> Result<char, LiteralError> {
        let digits = self
            .rest()
            .get(..len)
            .ok_or_else(|| self.error("short hex escape"))?;
        let code = u32::from_str_radix(digits, 16).map_err(|_| self.error("bad hex escape"))?;
        let c = char::from_u32(code).ok_or_else(|| self.error("invalid code point"))?;
        self.pos += len;
        Ok(c)
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                self.bump();
            } else {
                break;
            }
        }

        let text: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let text = text.strip_prefix('+').unwrap_or(&text);

        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        if let Ok(n) = text.parse::<u64>() {
            return Ok(Value::Number(n.into()));
        }
        text.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or(LiteralError {
                offset: start,
                message: "invalid number",
            })
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
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => Err(LiteralError {
                offset: start,
                message: "unsupported expression",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_tuples_become_arrays() {
        let value = parse_literal("{'version': (1, 2, 3), 'blender': (2, 80, 0),}").unwrap();
        assert_eq!(value, json!({"version": [1, 2, 3], "blender": [2, 80, 0]}));
    }

    #[test]
    fn test_mixed_quotes_and_comments() {
        let text = r#"{
            "name": 'Widget',   # display name
            'warning': "",      # used for warning icon
            "support": 'COMMUNITY'
        }"#;
        let value = parse_literal(text).unwrap();
        assert_eq!(
            value,
            json!({"name": "Widget", "warning": "", "support": "COMMUNITY"})
        );
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        let text = "{'description': 'Hello '\n                 'World',}";
        let value = parse_literal(text).unwrap();
        assert_eq!(value, json!({"description": "Hello World"}));
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = "{'name': 'a {b} c', 'category': 'Mesh'}";
        let value = parse_literal(text).unwrap();
        assert_eq!(value, json!({"name": "a {b} c", "category": "Mesh"}));
    }

    #[test]
    fn test_escapes_and_prefixes() {
        let text = r#"{'a': 'it\'s', 'b': r'C:\path', 'c': u"caf\u00e9", 'd': """tri"ple"""}"#;
        let value = parse_literal(text).unwrap();
        assert_eq!(
            value,
            json!({"a": "it's", "b": "C:\\path", "c": "café", "d": "tri\"ple"})
        );
    }

    #[test]
    fn test_keywords_and_numbers() {
        let value = parse_literal("{'x': True, 'y': None, 'z': -1.5, 'w': 1_000}").unwrap();
        assert_eq!(value, json!({"x": true, "y": null, "z": -1.5, "w": 1000}));
    }

    #[test]
    fn test_rejects_expressions() {
        assert!(parse_literal("{'a': foo()}").is_err());
        assert!(parse_literal("{1: 'a'}").is_err());
        assert!(parse_literal("{'a': 1").is_err());
        assert!(parse_literal("{'a': 'open}").is_err());
    }

    #[test]
    fn test_find_bl_info_skips_comparisons() {
        let source = "if bl_info == {}:\n    pass\nbl_info = {'name': 'Real'}\n";
        let map = find_bl_info(source).unwrap();
        assert_eq!(map.get("name"), Some(&json!("Real")));
    }

    #[test]
    fn test_find_bl_info_line_continuation() {
        let source = "bl_info = \\\n    {'name': 'Wrapped'}\n";
        let map = find_bl_info(source).unwrap();
        assert_eq!(map.get("name"), Some(&json!("Wrapped")));

        let source = "bl_info \\\r\n= {'name': 'Crlf'}";
        assert_eq!(find_bl_info(source).unwrap().get("name"), Some(&json!("Crlf")));
    }

    #[test]
    fn test_keys_keep_source_order() {
        let source =
            "bl_info = {'name': 'W', 'author': 'A', 'blender': (2, 80, 0), 'category': 'Mesh'}";
        let map = find_bl_info(source).unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "author", "blender", "category"]);
    }

    #[test]
    fn test_find_bl_info_requires_identifier() {
        assert!(find_bl_info("my_bl_info = {'name': 'x'}").is_none());
        assert!(find_bl_info("print('hello')").is_none());
    }

    #[test]
    fn test_find_bl_info_falls_through_broken_candidate() {
        let source = "bl_info = {'name': oops}\nbl_info = {'name': 'ok'}";
        let map = find_bl_info(source).unwrap();
        assert_eq!(map.get("name"), Some(&json!("ok")));
    }

    proptest! {
        #[test]
        fn prop_never_panics(input in ".{0,200}") {
            let _ = parse_literal(&input);
            let _ = find_bl_info(&format!("bl_info = {}", input));
        }
    }
}
