//! Pull-style JSON lexing over a [`ByteStream`].
//!
//! The same reader drives the single indexing pass and every lazy value decode. Value
//! readers consume exactly the bytes of one value: a number stops at the first byte that
//! cannot continue it without consuming that byte.

use std::fmt::Display;

use lazyjson_common::{Error, Result};
use lazyjson_io::ByteStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Colon,
    Comma,
    String,
    Number,
    True,
    False,
    Null,
}

impl TokenKind {
    fn classify(b: u8) -> Option<TokenKind> {
        let kind = match b {
            b'{' => TokenKind::BeginObject,
            b'}' => TokenKind::EndObject,
            b'[' => TokenKind::BeginArray,
            b']' => TokenKind::EndArray,
            b':' => TokenKind::Colon,
            b',' => TokenKind::Comma,
            b'"' => TokenKind::String,
            b'-' | b'0'..=b'9' => TokenKind::Number,
            b't' => TokenKind::True,
            b'f' => TokenKind::False,
            b'n' => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }

    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::BeginObject => "`{`",
            TokenKind::EndObject => "`}`",
            TokenKind::BeginArray => "`[`",
            TokenKind::EndArray => "`]`",
            TokenKind::Colon => "`:`",
            TokenKind::Comma => "`,`",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::True | TokenKind::False => "boolean",
            TokenKind::Null => "null",
        }
    }
}

/// A token and the absolute offset of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: u64,
}

pub struct JsonReader<S> {
    stream: S,
}

impl<S: ByteStream> JsonReader<S> {
    pub fn new(stream: S) -> JsonReader<S> {
        JsonReader { stream }
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.stream.position()
    }

    /// Skips whitespace and classifies the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        loop {
            match self.peek()? {
                Some(b' ' | b'\t' | b'\n' | b'\r') => {
                    self.bump()?;
                }
                Some(b) => {
                    let pos = self.position();
                    let kind = TokenKind::classify(b).ok_or_else(|| {
                        error_at(format!("unexpected character `{}`", b.escape_ascii()), pos)
                    })?;
                    return Ok(Some(Token { kind, pos }));
                }
                None => return Ok(None),
            }
        }
    }

    /// Like [`peek_token`](Self::peek_token), but end of input is an error.
    pub fn require_token(&mut self) -> Result<Token> {
        self.peek_token()?
            .ok_or_else(|| error_at("unexpected end of input", self.position()))
    }

    /// Consumes the next token entirely, including the text of strings, numbers
    /// and literals.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        let Some(token) = self.peek_token()? else {
            return Ok(None);
        };
        match token.kind {
            TokenKind::String => self.skip_string()?,
            TokenKind::Number => {
                self.read_number()?;
            }
            TokenKind::True | TokenKind::False | TokenKind::Null => {
                self.read_literal()?;
            }
            _ => {
                self.bump()?;
            }
        }
        Ok(Some(token))
    }

    /// Consumes a token of the given kind and returns its offset.
    pub fn expect(&mut self, kind: TokenKind) -> Result<u64> {
        let token = self.require_token()?;
        if token.kind != kind {
            return Err(mismatch(kind.describe(), token));
        }
        self.next_token()?;
        Ok(token.pos)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let pos = self.require_token()?.pos;
        let mut buf = Vec::new();
        self.string_bytes(Some(&mut buf))?;
        String::from_utf8(buf).map_err(|_| error_at("invalid UTF-8 in string", pos))
    }

    pub fn skip_string(&mut self) -> Result<()> {
        self.string_bytes(None)
    }

    /// Reads the text of a number, checking it against the JSON number grammar.
    pub fn read_number(&mut self) -> Result<String> {
        let token = self.require_token()?;
        if token.kind != TokenKind::Number {
            return Err(mismatch("number", token));
        }
        let mut text = String::new();
        if self.peek()? == Some(b'-') {
            self.push_next(&mut text)?;
        }
        match self.peek()? {
            Some(b'0') => self.push_next(&mut text)?,
            Some(b'1'..=b'9') => {
                self.digits(&mut text)?;
            }
            _ => return Err(error_at("invalid number", token.pos)),
        }
        if self.peek()? == Some(b'.') {
            self.push_next(&mut text)?;
            if self.digits(&mut text)? == 0 {
                return Err(error_at("missing fraction digits", token.pos));
            }
        }
        if matches!(self.peek()?, Some(b'e' | b'E')) {
            self.push_next(&mut text)?;
            if matches!(self.peek()?, Some(b'+' | b'-')) {
                self.push_next(&mut text)?;
            }
            if self.digits(&mut text)? == 0 {
                return Err(error_at("missing exponent digits", token.pos));
            }
        }
        Ok(text)
    }

    /// Reads `true`, `false` or `null`.
    pub fn read_literal(&mut self) -> Result<TokenKind> {
        let token = self.require_token()?;
        let word: &[u8] = match token.kind {
            TokenKind::True => b"true",
            TokenKind::False => b"false",
            TokenKind::Null => b"null",
            _ => return Err(mismatch("literal", token)),
        };
        for &expected in word {
            if self.next_required()? != expected {
                return Err(error_at("invalid literal", token.pos));
            }
        }
        Ok(token.kind)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let token = self.require_token()?;
        match token.kind {
            TokenKind::True | TokenKind::False => Ok(self.read_literal()? == TokenKind::True),
            _ => Err(mismatch("boolean", token)),
        }
    }

    /// Skips one complete value, failing on containers nested deeper than `max_depth`.
    ///
    /// Skipped containers are checked against the JSON grammar: array elements and
    /// object members must be separated by commas, and members are `string : value`.
    pub fn skip_value(&mut self, max_depth: usize) -> Result<()> {
        let mut open: Vec<TokenKind> = Vec::new();
        loop {
            let token = self.require_token()?;
            match token.kind {
                TokenKind::BeginObject | TokenKind::BeginArray => {
                    if open.len() >= max_depth {
                        return Err(error_at(
                            format!("nesting deeper than {max_depth}"),
                            token.pos,
                        ));
                    }
                    self.next_token()?;
                    if self.require_token()?.kind == closer(token.kind) {
                        self.next_token()?;
                    } else {
                        open.push(token.kind);
                        if token.kind == TokenKind::BeginObject {
                            self.skip_member_name()?;
                        }
                        continue;
                    }
                }
                TokenKind::String
                | TokenKind::Number
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null => {
                    self.next_token()?;
                }
                _ => return Err(mismatch("value", token)),
            }

            // A value is complete: close finished containers, or move to the next item.
            loop {
                let Some(&opener) = open.last() else {
                    return Ok(());
                };
                let token = self.require_token()?;
                if token.kind == TokenKind::Comma {
                    self.next_token()?;
                    if opener == TokenKind::BeginObject {
                        self.skip_member_name()?;
                    }
                    break;
                }
                if token.kind != closer(opener) {
                    let expected = match opener {
                        TokenKind::BeginObject => "`,` or `}`",
                        _ => "`,` or `]`",
                    };
                    return Err(mismatch(expected, token));
                }
                self.next_token()?;
                open.pop();
            }
        }
    }

    fn skip_member_name(&mut self) -> Result<()> {
        let token = self.require_token()?;
        if token.kind != TokenKind::String {
            return Err(mismatch("member name", token));
        }
        self.skip_string()?;
        self.expect(TokenKind::Colon)?;
        Ok(())
    }

    fn string_bytes(&mut self, mut out: Option<&mut Vec<u8>>) -> Result<()> {
        let token = self.require_token()?;
        if token.kind != TokenKind::String {
            return Err(mismatch("string", token));
        }
        self.bump()?;
        loop {
            let b = self.next_required()?;
            match b {
                b'"' => return Ok(()),
                b'\\' => {
                    let c = match self.next_required()? {
                        b'"' => '"',
                        b'\\' => '\\',
                        b'/' => '/',
                        b'b' => '\u{8}',
                        b'f' => '\u{c}',
                        b'n' => '\n',
                        b'r' => '\r',
                        b't' => '\t',
                        b'u' => self.unicode_escape()?,
                        other => {
                            return Err(error_at(
                                format!("invalid escape `\\{}`", other.escape_ascii()),
                                self.position() - 1,
                            ));
                        }
                    };
                    if let Some(out) = out.as_deref_mut() {
                        let mut tmp = [0u8; 4];
                        out.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                    }
                }
                0x00..=0x1F => {
                    return Err(error_at("control character in string", self.position() - 1));
                }
                _ => {
                    if let Some(out) = out.as_deref_mut() {
                        out.push(b);
                    }
                }
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char> {
        let pos = self.position();
        let high = self.hex4()?;
        let code = if (0xD800..0xDC00).contains(&high) {
            if self.next_required()? != b'\\' || self.next_required()? != b'u' {
                return Err(error_at("unpaired surrogate", pos));
            }
            let low = self.hex4()?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(error_at("invalid low surrogate", pos));
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };
        char::from_u32(code).ok_or_else(|| error_at("unpaired surrogate", pos))
    }

    fn hex4(&mut self) -> Result<u32> {
        let mut value = 0;
        for _ in 0..4 {
            let b = self.next_required()?;
            let digit = (b as char)
                .to_digit(16)
                .ok_or_else(|| error_at("invalid unicode escape", self.position() - 1))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn digits(&mut self, text: &mut String) -> Result<usize> {
        let mut count = 0;
        while let Some(b'0'..=b'9') = self.peek()? {
            self.push_next(text)?;
            count += 1;
        }
        Ok(count)
    }

    fn push_next(&mut self, text: &mut String) -> Result<()> {
        let b = self.next_required()?;
        text.push(b as char);
        Ok(())
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        self.stream.peek_byte().map_err(|e| Error::io("read json", e))
    }

    fn bump(&mut self) -> Result<Option<u8>> {
        self.stream.next_byte().map_err(|e| Error::io("read json", e))
    }

    fn next_required(&mut self) -> Result<u8> {
        self.bump()?
            .ok_or_else(|| error_at("unexpected end of input", self.position()))
    }
}

fn error_at(message: impl Display, pos: u64) -> Error {
    Error::invalid_format_msg("json", format!("{message} at offset {pos}"))
}

fn closer(opener: TokenKind) -> TokenKind {
    match opener {
        TokenKind::BeginObject => TokenKind::EndObject,
        _ => TokenKind::EndArray,
    }
}

pub(crate) fn mismatch(expected: &str, token: Token) -> Error {
    error_at(
        format!("expected {expected}, found {}", token.kind.describe()),
        token.pos,
    )
}
