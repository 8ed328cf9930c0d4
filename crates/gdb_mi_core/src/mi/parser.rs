//! Recursive-descent parser for MI payloads.
//!
//! ```text
//! results := result ( "," result )*
//! result  := variable "=" value
//! value   := const | tuple | list
//! const   := c-string
//! tuple   := "{}" | "{" results "}"
//! list    := "[]" | "[" value ( "," value )* "]" | "[" result ( "," result )* "]"
//! ```

use thiserror::Error;

use super::value::MiValue;

const MAX_DEPTH: usize = 128;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("MI parse error at byte {position}: {message}")]
pub struct MiParseError {
    pub position: usize,
    pub message: String,
}

/// Parses a comma-separated `key=value` sequence, e.g. the part of
/// `^done,bkpt={...}` after the first comma. Empty input yields no results.
pub fn parse_results(input: &str) -> Result<Vec<(String, MiValue)>, MiParseError> {
    let mut cursor = Cursor::new(input);
    if cursor.at_end() {
        return Ok(Vec::new());
    }
    let results = cursor.results(None, 0)?;
    if !cursor.at_end() {
        return Err(cursor.error("trailing characters after results"));
    }
    Ok(results)
}

/// Decodes one complete C-string literal (quotes included).
pub fn parse_c_string(input: &str) -> Result<String, MiParseError> {
    let mut cursor = Cursor::new(input);
    let text = cursor.c_string()?;
    if !cursor.at_end() {
        return Err(cursor.error("trailing characters after string"));
    }
    Ok(text)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), MiParseError> {
        match self.peek() {
            Some(byte) if byte == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(byte) => Err(self.error(format!(
                "expected '{}', found '{}'",
                expected as char, byte as char
            ))),
            None => Err(self.error(format!("expected '{}', found end of input", expected as char))),
        }
    }

    fn error(&self, message: impl Into<String>) -> MiParseError {
        MiParseError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn results(&mut self, close: Option<u8>, depth: usize) -> Result<Vec<(String, MiValue)>, MiParseError> {
        let mut results = vec![self.result(depth)?];
        loop {
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    results.push(self.result(depth)?);
                }
                Some(byte) if Some(byte) == close => return Ok(results),
                None if close.is_none() => return Ok(results),
                Some(byte) => {
                    return Err(self.error(format!("unexpected '{}' after value", byte as char)))
                }
                None => return Err(self.error("unterminated tuple or list")),
            }
        }
    }

    fn result(&mut self, depth: usize) -> Result<(String, MiValue), MiParseError> {
        let key = self.variable()?;
        self.expect(b'=')?;
        let value = self.value(depth)?;
        Ok((key, value))
    }

    fn variable(&mut self) -> Result<String, MiParseError> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if matches!(byte, b'=' | b',' | b'{' | b'}' | b'[' | b']' | b'"') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected variable name"));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn value(&mut self, depth: usize) -> Result<MiValue, MiParseError> {
        if depth >= MAX_DEPTH {
            return Err(self.error("payload nested too deeply"));
        }
        match self.peek() {
            Some(b'"') => Ok(MiValue::Const(self.c_string()?)),
            Some(b'{') => self.tuple(depth + 1),
            Some(b'[') => self.list(depth + 1),
            Some(byte) => Err(self.error(format!("unexpected '{}' at start of value", byte as char))),
            None => Err(self.error("expected value, found end of input")),
        }
    }

    fn tuple(&mut self, depth: usize) -> Result<MiValue, MiParseError> {
        self.expect(b'{')?;
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(MiValue::Tuple(Vec::new()));
        }
        let entries = self.results(Some(b'}'), depth)?;
        self.expect(b'}')?;
        Ok(MiValue::Tuple(entries))
    }

    fn list(&mut self, depth: usize) -> Result<MiValue, MiParseError> {
        self.expect(b'[')?;
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(MiValue::List(Vec::new()));
        }

        let holds_values = matches!(self.peek(), Some(b'"' | b'{' | b'['));
        let mut items = Vec::new();
        loop {
            if holds_values {
                items.push(self.value(depth)?);
            } else {
                let (key, value) = self.result(depth)?;
                items.push(MiValue::Tuple(vec![(key, value)]));
            }
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => return Ok(MiValue::List(items)),
                Some(byte) => {
                    self.pos -= 1;
                    return Err(self.error(format!("unexpected '{}' in list", byte as char)));
                }
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    fn c_string(&mut self) -> Result<String, MiParseError> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            let byte = self.bump().ok_or_else(|| self.error("unterminated string"))?;
            match byte {
                b'"' => break,
                b'\\' => {
                    let escaped = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b't' => out.push(b'\t'),
                        b'r' => out.push(b'\r'),
                        b'a' => out.push(0x07),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'v' => out.push(0x0b),
                        b'e' => out.push(0x1b),
                        b'0'..=b'7' => out.push(self.octal_escape(escaped)),
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
        // GDB escapes non-ASCII bytes as octal, so decode after unescaping.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn octal_escape(&mut self, first: u8) -> u8 {
        let mut value = u32::from(first - b'0');
        for _ in 0..2 {
            match self.peek() {
                Some(digit @ b'0'..=b'7') => {
                    value = value * 8 + u32::from(digit - b'0');
                    self.pos += 1;
                }
                _ => break,
            }
        }
        (value & 0xff) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> MiValue {
        MiValue::Const(s.to_string())
    }

    #[test]
    fn test_flat_results() {
        let results = parse_results(r#"reason="breakpoint-hit",bkptno="1",thread-id="1""#).unwrap();
        assert_eq!(
            results,
            vec![
                ("reason".to_string(), c("breakpoint-hit")),
                ("bkptno".to_string(), c("1")),
                ("thread-id".to_string(), c("1")),
            ]
        );
    }

    #[test]
    fn test_nested_tuple_with_lists() {
        let input = r#"bkptno="1",frame={addr="0x0000000000401000",func="main",args=[{name="argc",value="1"},{name="argv",value="0x7ffe"}],arch="i386:x86-64"},stopped-threads="all""#;
        let results = parse_results(input).unwrap();
        let payload = MiValue::Tuple(results);

        let frame = payload.get("frame").unwrap();
        assert_eq!(frame.get_str("addr"), Some("0x0000000000401000"));
        assert_eq!(frame.get_str("arch"), Some("i386:x86-64"));

        let args = frame.get("args").and_then(MiValue::as_list).unwrap();
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].get_str("name"), Some("argv"));
        assert_eq!(payload.get_str("stopped-threads"), Some("all"));
    }

    #[test]
    fn test_result_list_items_become_single_entry_tuples() {
        let results = parse_results(r#"stack=[frame={level="0",addr="0x1"},frame={level="1",addr="0x2"}]"#).unwrap();
        let stack = results[0].1.as_list().unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(
            stack[1].get("frame").and_then(|f| f.get_str("level")),
            Some("1")
        );
    }

    #[test]
    fn test_empty_containers_and_value_lists() {
        let results = parse_results(r#"a={},b=[],c=["x","y"],d=[[],{}]"#).unwrap();
        assert_eq!(results[0].1, MiValue::Tuple(vec![]));
        assert_eq!(results[1].1, MiValue::List(vec![]));
        assert_eq!(results[2].1, MiValue::List(vec![c("x"), c("y")]));
        assert_eq!(
            results[3].1,
            MiValue::List(vec![MiValue::List(vec![]), MiValue::Tuple(vec![])])
        );
    }

    #[test]
    fn test_memory_block_payload() {
        let input = r#"memory=[{begin="0x00007ffe3c2a0000",offset="0x0000000000000000",end="0x00007ffe3c2a0004",contents="7f454c46"}]"#;
        let results = parse_results(input).unwrap();
        let blocks = results[0].1.as_list().unwrap();
        assert_eq!(blocks[0].get_str("contents"), Some("7f454c46"));
    }

    #[test]
    fn test_c_string_escapes() {
        assert_eq!(parse_c_string(r#""line\n""#).unwrap(), "line\n");
        assert_eq!(parse_c_string(r#""tab\there""#).unwrap(), "tab\there");
        assert_eq!(parse_c_string(r#""say \"hi\"""#).unwrap(), "say \"hi\"");
        assert_eq!(parse_c_string(r#""back\\slash""#).unwrap(), "back\\slash");
        assert_eq!(parse_c_string(r#""\101\102""#).unwrap(), "AB");
        // UTF-8 "é" escaped byte by byte.
        assert_eq!(parse_c_string(r#""\303\251""#).unwrap(), "é");
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_nesting() {
        let results = parse_results(r#"value="{a = [1, 2]}",next="ok""#).unwrap();
        assert_eq!(results[0].1, c("{a = [1, 2]}"));
        assert_eq!(results[1].1, c("ok"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_results("").unwrap(), vec![]);
    }

    #[test]
    fn test_malformed_inputs_report_errors() {
        assert!(parse_results(r#"msg="unterminated"#).is_err());
        assert!(parse_results(r#"frame={addr="0x1""#).is_err());
        assert!(parse_results(r#"list=["a","b""#).is_err());
        assert!(parse_results("novalue").is_err());
        assert!(parse_results(r#"a="1"garbage"#).is_err());
        assert!(parse_c_string(r#""ok" trailing"#).is_err());

        let err = parse_results(r#"a=1"#).unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let input = format!("a={}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        let err = parse_results(&input).unwrap_err();
        assert!(err.message.contains("nested too deeply"), "{err}");
    }
}
