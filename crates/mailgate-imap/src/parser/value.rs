//! Generic reader for the data items of an IMAP response.
//!
//! The server grammar is a handful of shapes: atoms, numbers, quoted
//! strings, literals, `NIL` and parenthesized lists. The reader turns a
//! response line into [`Value`] trees, leaving interpretation to the
//! response parsers.

use std::borrow::Cow;

use crate::{Error, Result};

/// One parsed data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// `NIL`
    Nil,
    /// An all-digit atom.
    Number(u64),
    /// Any other atom, including section specifiers such as `BODY[1.2]<0>`.
    Atom(String),
    /// A quoted string or literal, as raw bytes.
    String(Vec<u8>),
    /// A parenthesized list.
    List(Vec<Self>),
}

impl Value {
    /// Returns the atom text, if this is an atom.
    #[must_use]
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns raw string bytes, if this is a string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(b) => Some(b),
            _ => None,
        }
    }

    /// Text form of a string, atom or number. `NIL` and lists yield `None`.
    #[must_use]
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::String(b) => Some(String::from_utf8_lossy(b)),
            Self::Atom(s) => Some(Cow::Borrowed(s)),
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Nil | Self::List(_) => None,
        }
    }

    /// Like [`Value::to_text`] but owned.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::String(b) => Some(String::from_utf8_lossy(&b).into_owned()),
            Self::Atom(s) => Some(s),
            Self::Number(n) => Some(n.to_string()),
            Self::Nil | Self::List(_) => None,
        }
    }
}

/// Cursor over one response line (including any embedded literals).
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader at the start of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte offset.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Peeks at the next byte.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// True at end of input or at the terminating CRLF.
    #[must_use]
    pub fn at_line_end(&self) -> bool {
        matches!(self.peek(), None | Some(b'\r' | b'\n'))
    }

    /// Skips any run of spaces.
    pub fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    /// Consumes exactly one space.
    pub fn expect_space(&mut self) -> Result<()> {
        if self.peek() == Some(b' ') {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error("expected space"))
        }
    }

    /// Consumes `byte` if it is next.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads one value of any shape.
    pub fn read_value(&mut self) -> Result<Value> {
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'(') => self.read_list(),
            Some(b'"') => self.read_quoted().map(Value::String),
            Some(b'{') => self.read_literal().map(Value::String),
            Some(_) => {
                let atom = self.read_atom()?;
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(Value::Nil)
                } else if !atom.is_empty() && atom.bytes().all(|b| b.is_ascii_digit()) {
                    atom.parse()
                        .map(Value::Number)
                        .map_err(|_| self.error("number out of range"))
                } else {
                    Ok(Value::Atom(atom.to_string()))
                }
            }
        }
    }

    /// Reads an atom. Brackets may enclose spaces and parentheses.
    pub fn read_atom(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'[' => depth += 1,
                b']' if depth > 0 => depth -= 1,
                b'\r' | b'\n' => break,
                b' ' | b'(' | b')' | b'{' | b'"' if depth == 0 => break,
                b']' => break,
                _ => {}
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected atom"));
        }
        std::str::from_utf8(&self.input[start..self.pos]).map_err(|_| self.error("atom is not UTF-8"))
    }

    /// Reads `[ ... ]` and returns the bytes between the brackets.
    pub fn read_bracketed(&mut self) -> Result<&'a [u8]> {
        if !self.eat(b'[') {
            return Err(self.error("expected '['"));
        }
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(b) = self.peek() {
            match b {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &self.input[start..self.pos];
                        self.pos += 1;
                        return Ok(inner);
                    }
                }
                b'\r' | b'\n' => break,
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error("unterminated response code"))
    }

    /// Everything up to the line end, lossily decoded.
    pub fn rest_of_line(&mut self) -> String {
        let start = self.pos;
        while !self.at_line_end() {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn read_list(&mut self) -> Result<Value> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                None | Some(b'\r' | b'\n') => return Err(self.error("unterminated list")),
                Some(_) => items.push(self.read_value()?),
            }
        }
    }

    fn read_quoted(&mut self) -> Result<Vec<u8>> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ (b'"' | b'\\')) => out.push(c),
                        _ => return Err(self.error("invalid escape in quoted string")),
                    }
                    self.pos += 1;
                }
                Some(b'\r' | b'\n') | None => {
                    return Err(self.error("unterminated quoted string"));
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_literal(&mut self) -> Result<Vec<u8>> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let len: usize = std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid literal length"))?;
        self.eat(b'+');
        if !(self.eat(b'}') && self.eat(b'\r') && self.eat(b'\n')) {
            return Err(self.error("malformed literal prefix"));
        }
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("literal exceeds response"))?;
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(data)
    }

    pub(crate) fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn read(input: &str) -> Value {
        Reader::new(input.as_bytes()).read_value().unwrap()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(read("NIL"), Value::Nil);
        assert_eq!(read("nil"), Value::Nil);
        assert_eq!(read("1234"), Value::Number(1234));
        assert_eq!(read("\\Seen"), Value::Atom("\\Seen".into()));
        assert_eq!(read("\"a \\\"b\\\" c\""), Value::String(b"a \"b\" c".to_vec()));
    }

    #[test]
    fn test_section_atom_keeps_brackets() {
        let mut reader = Reader::new(b"BODY[HEADER.FIELDS (DATE FROM)]<0> rest");
        assert_eq!(
            reader.read_value().unwrap(),
            Value::Atom("BODY[HEADER.FIELDS (DATE FROM)]<0>".into())
        );
        reader.expect_space().unwrap();
        assert_eq!(reader.rest_of_line(), "rest");
    }

    #[test]
    fn test_literal_inside_list() {
        let value = read("(BODY[1] {5}\r\nhello UID 7)");
        assert_eq!(
            value,
            Value::List(vec![
                Value::Atom("BODY[1]".into()),
                Value::String(b"hello".to_vec()),
                Value::Atom("UID".into()),
                Value::Number(7),
            ])
        );
    }

    #[test]
    fn test_adjacent_lists_without_space() {
        let value = read("(3 6 (4 23)(44 7 96))");
        let items = value.as_list().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[3].as_list().unwrap().len(), 3);
    }

    #[test]
    fn test_truncated_literal_is_error() {
        let mut reader = Reader::new(b"{10}\r\nshort");
        assert!(reader.read_value().is_err());
    }

    #[test]
    fn test_unterminated_list_is_error() {
        let mut reader = Reader::new(b"(1 2\r\n");
        assert!(reader.read_value().is_err());
    }

    #[test]
    fn test_bracketed_code() {
        let mut reader = Reader::new(b"[APPENDUID 38505 3955] done\r\n");
        assert_eq!(reader.read_bracketed().unwrap(), b"APPENDUID 38505 3955");
        reader.skip_spaces();
        assert_eq!(reader.rest_of_line(), "done");
    }
}
