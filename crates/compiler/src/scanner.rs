//! Lexical analysis for IFJ21 source.
//!
//! The scanner reads a byte tape with one-step lookahead (`get` / `unget` /
//! `peek`) and produces tokens carrying source coordinates. Tokens are
//! consumed exactly once through [`TokenCursor`], the single cursor shared by
//! the statement parser and the expression parser: whichever parser stops
//! first leaves the cursor at the first token it did not consume.

use crate::errors::CompileError;
use std::fmt;

/// Line/column coordinates of a lexeme, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Reserved words of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Require,
    Global,
    Function,
    Local,
    End,
    If,
    Then,
    Elseif,
    Else,
    While,
    Do,
    Repeat,
    Until,
    For,
    Return,
    Break,
    True,
    False,
    Nil,
    And,
    Or,
    Not,
    String,
    Integer,
    Number,
    Boolean,
}

impl Keyword {
    fn from_ident(text: &str) -> Option<Keyword> {
        Some(match text {
            "require" => Keyword::Require,
            "global" => Keyword::Global,
            "function" => Keyword::Function,
            "local" => Keyword::Local,
            "end" => Keyword::End,
            "if" => Keyword::If,
            "then" => Keyword::Then,
            "elseif" => Keyword::Elseif,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "do" => Keyword::Do,
            "repeat" => Keyword::Repeat,
            "until" => Keyword::Until,
            "for" => Keyword::For,
            "return" => Keyword::Return,
            "break" => Keyword::Break,
            "true" => Keyword::True,
            "false" => Keyword::False,
            "nil" => Keyword::Nil,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "string" => Keyword::String,
            "integer" => Keyword::Integer,
            "number" => Keyword::Number,
            "boolean" => Keyword::Boolean,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Require => "require",
            Keyword::Global => "global",
            Keyword::Function => "function",
            Keyword::Local => "local",
            Keyword::End => "end",
            Keyword::If => "if",
            Keyword::Then => "then",
            Keyword::Elseif => "elseif",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Do => "do",
            Keyword::Repeat => "repeat",
            Keyword::Until => "until",
            Keyword::For => "for",
            Keyword::Return => "return",
            Keyword::Break => "break",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Nil => "nil",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::String => "string",
            Keyword::Integer => "integer",
            Keyword::Number => "number",
            Keyword::Boolean => "boolean",
        }
    }
}

/// One lexeme kind, with payload where the lexeme carries a value.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Id(String),
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    Kw(Keyword),
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    Caret,
    Concat,
    Hash,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Assign,
    LParen,
    RParen,
    Colon,
    Comma,
    Semicolon,
    Eof,
}

impl TokenKind {
    /// True when `other` has the same kind, ignoring payloads.
    pub fn same_kind(&self, other: &TokenKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Human-readable rendering for "expected X, got Y" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Id(name) => format!("identifier '{name}'"),
            TokenKind::IntLit(_) => "integer literal".into(),
            TokenKind::FloatLit(_) => "number literal".into(),
            TokenKind::StrLit(_) => "string literal".into(),
            TokenKind::Kw(kw) => format!("'{}'", kw.as_str()),
            TokenKind::Plus => "'+'".into(),
            TokenKind::Minus => "'-'".into(),
            TokenKind::Star => "'*'".into(),
            TokenKind::Slash => "'/'".into(),
            TokenKind::SlashSlash => "'//'".into(),
            TokenKind::Percent => "'%'".into(),
            TokenKind::Caret => "'^'".into(),
            TokenKind::Concat => "'..'".into(),
            TokenKind::Hash => "'#'".into(),
            TokenKind::Lt => "'<'".into(),
            TokenKind::Le => "'<='".into(),
            TokenKind::Gt => "'>'".into(),
            TokenKind::Ge => "'>='".into(),
            TokenKind::Eq => "'=='".into(),
            TokenKind::Ne => "'~='".into(),
            TokenKind::Assign => "'='".into(),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::Colon => "':'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Semicolon => "';'".into(),
            TokenKind::Eof => "end of file".into(),
        }
    }
}

/// A token with the coordinates of its first character.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: SourcePos,
}

/// Random-access byte tape over the source with one-step pushback.
struct Tape {
    bytes: Vec<u8>,
    at: usize,
    line: usize,
    column: usize,
    // coordinates before the last `get`, restored on `unget`
    prev: (usize, usize),
}

impl Tape {
    fn new(source: &str) -> Tape {
        Tape {
            bytes: source.as_bytes().to_vec(),
            at: 0,
            line: 1,
            column: 1,
            prev: (1, 1),
        }
    }

    fn get(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.at)?;
        self.at += 1;
        self.prev = (self.line, self.column);
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    /// Push the last byte back. At most one step; a second `unget` without an
    /// intervening `get` corrupts the coordinates.
    fn unget(&mut self) {
        debug_assert!(self.at > 0);
        self.at -= 1;
        let (line, column) = self.prev;
        self.line = line;
        self.column = column;
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.at).copied()
    }

    fn pos(&self) -> SourcePos {
        SourcePos {
            line: self.line,
            column: self.column,
        }
    }
}

/// The lexer: turns the byte tape into a token stream.
pub struct Scanner {
    tape: Tape,
}

impl Scanner {
    pub fn new(source: &str) -> Scanner {
        Scanner {
            tape: Tape::new(source),
        }
    }

    fn lexical(&self, pos: SourcePos, what: impl Into<String>) -> CompileError {
        CompileError::Lexical {
            pos,
            what: what.into(),
        }
    }

    /// Produce the next token, skipping whitespace and comments.
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        loop {
            let pos = self.tape.pos();
            let Some(b) = self.tape.get() else {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    pos,
                });
            };
            let kind = match b {
                b' ' | b'\t' | b'\r' | b'\n' => continue,
                b'-' => {
                    if self.tape.peek() == Some(b'-') {
                        self.tape.get();
                        self.skip_comment(pos)?;
                        continue;
                    }
                    TokenKind::Minus
                }
                b'+' => TokenKind::Plus,
                b'*' => TokenKind::Star,
                b'/' => {
                    if self.tape.peek() == Some(b'/') {
                        self.tape.get();
                        TokenKind::SlashSlash
                    } else {
                        TokenKind::Slash
                    }
                }
                b'%' => TokenKind::Percent,
                b'^' => TokenKind::Caret,
                b'#' => TokenKind::Hash,
                b'(' => TokenKind::LParen,
                b')' => TokenKind::RParen,
                b':' => TokenKind::Colon,
                b',' => TokenKind::Comma,
                b';' => TokenKind::Semicolon,
                b'.' => {
                    if self.tape.get() == Some(b'.') {
                        TokenKind::Concat
                    } else {
                        return Err(self.lexical(pos, "stray '.'"));
                    }
                }
                b'~' => {
                    if self.tape.get() == Some(b'=') {
                        TokenKind::Ne
                    } else {
                        return Err(self.lexical(pos, "stray '~'"));
                    }
                }
                b'<' => {
                    if self.tape.peek() == Some(b'=') {
                        self.tape.get();
                        TokenKind::Le
                    } else {
                        TokenKind::Lt
                    }
                }
                b'>' => {
                    if self.tape.peek() == Some(b'=') {
                        self.tape.get();
                        TokenKind::Ge
                    } else {
                        TokenKind::Gt
                    }
                }
                b'=' => {
                    if self.tape.peek() == Some(b'=') {
                        self.tape.get();
                        TokenKind::Eq
                    } else {
                        TokenKind::Assign
                    }
                }
                b'"' => self.lex_string(pos)?,
                b'0'..=b'9' => {
                    self.tape.unget();
                    self.lex_number(pos)?
                }
                b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                    self.tape.unget();
                    self.lex_identifier()
                }
                other => {
                    return Err(self.lexical(pos, format!("stray character '{}'", other as char)));
                }
            };
            tracing::trace!(?kind, line = pos.line, column = pos.column, "token");
            return Ok(Token { kind, pos });
        }
    }

    /// Consume a comment after the opening `--` has been read.
    ///
    /// `--[[` opens a block comment closed by `]]`; anything else is a line
    /// comment running to the end of the line.
    fn skip_comment(&mut self, start: SourcePos) -> Result<(), CompileError> {
        match self.tape.get() {
            None | Some(b'\n') => Ok(()),
            Some(b'[') if self.tape.peek() == Some(b'[') => {
                self.tape.get();
                let mut closing = 0u8;
                loop {
                    match self.tape.get() {
                        None => {
                            return Err(self.lexical(start, "unterminated block comment"));
                        }
                        Some(b']') => {
                            closing += 1;
                            if closing == 2 {
                                return Ok(());
                            }
                        }
                        Some(_) => closing = 0,
                    }
                }
            }
            Some(_) => {
                while let Some(b) = self.tape.get() {
                    if b == b'\n' {
                        break;
                    }
                }
                Ok(())
            }
        }
    }

    /// Lex a string literal; the opening quote is already consumed.
    ///
    /// Escapes: `\n` `\t` `\\` `\"` and `\DDD` with `DDD` in 001..=255.
    /// `\000` is rejected by the range check, an asymmetry inherited from the
    /// language definition.
    fn lex_string(&mut self, start: SourcePos) -> Result<TokenKind, CompileError> {
        let mut text = Vec::new();
        loop {
            match self.tape.get() {
                None | Some(b'\n') => {
                    return Err(self.lexical(start, "unterminated string literal"));
                }
                Some(b'"') => break,
                Some(b'\\') => match self.tape.get() {
                    Some(b'n') => text.push(b'\n'),
                    Some(b't') => text.push(b'\t'),
                    Some(b'\\') => text.push(b'\\'),
                    Some(b'"') => text.push(b'"'),
                    Some(d @ b'0'..=b'9') => {
                        let mut value = (d - b'0') as u16;
                        for _ in 0..2 {
                            match self.tape.get() {
                                Some(d @ b'0'..=b'9') => {
                                    value = value * 10 + (d - b'0') as u16;
                                }
                                _ => {
                                    return Err(
                                        self.lexical(start, "escape needs three decimal digits")
                                    );
                                }
                            }
                        }
                        if value == 0 || value > 255 {
                            return Err(self.lexical(
                                start,
                                format!("escape \\{value:03} out of range 001-255"),
                            ));
                        }
                        // escapes above 0x7f are stored as the matching
                        // Unicode scalar so the payload stays valid UTF-8
                        let mut buf = [0u8; 4];
                        text.extend_from_slice(
                            char::from(value as u8).encode_utf8(&mut buf).as_bytes(),
                        );
                    }
                    Some(other) => {
                        return Err(
                            self.lexical(start, format!("invalid escape '\\{}'", other as char))
                        );
                    }
                    None => {
                        return Err(self.lexical(start, "unterminated string literal"));
                    }
                },
                Some(b) => text.push(b),
            }
        }
        let text = String::from_utf8(text).expect("source and escapes are encoded as UTF-8");
        Ok(TokenKind::StrLit(text))
    }

    /// Lex an integer or float literal starting at the current digit.
    ///
    /// Integers are `0`, `[1-9][0-9]*`, or a run of zeros. A `.` fraction or
    /// an `e`/`E` exponent (optionally signed) turns the literal into a
    /// float; both require at least one following digit.
    fn lex_number(&mut self, start: SourcePos) -> Result<TokenKind, CompileError> {
        let mut digits = String::new();
        let mut is_float = false;

        let first = self.tape.get().expect("caller saw a digit");
        digits.push(first as char);
        if first == b'0' {
            // only further zeros extend an integer that starts with zero
            while self.tape.peek() == Some(b'0') {
                self.tape.get();
                digits.push('0');
            }
        } else {
            while let Some(d @ b'0'..=b'9') = self.tape.peek() {
                self.tape.get();
                digits.push(d as char);
            }
        }

        if self.tape.peek() == Some(b'.') {
            self.tape.get();
            digits.push('.');
            is_float = true;
            let mut any = false;
            while let Some(d @ b'0'..=b'9') = self.tape.peek() {
                self.tape.get();
                digits.push(d as char);
                any = true;
            }
            if !any {
                return Err(self.lexical(start, "missing digits after decimal point"));
            }
        }

        if matches!(self.tape.peek(), Some(b'e') | Some(b'E')) {
            self.tape.get();
            digits.push('e');
            is_float = true;
            if matches!(self.tape.peek(), Some(b'+') | Some(b'-')) {
                let sign = self.tape.get().expect("peeked");
                digits.push(sign as char);
            }
            let mut any = false;
            while let Some(d @ b'0'..=b'9') = self.tape.peek() {
                self.tape.get();
                digits.push(d as char);
                any = true;
            }
            if !any {
                return Err(self.lexical(start, "missing digits in exponent"));
            }
        }

        if is_float {
            let value: f64 = digits
                .parse()
                .map_err(|_| self.lexical(start, format!("bad number literal '{digits}'")))?;
            if !value.is_finite() {
                return Err(self.lexical(start, format!("number literal '{digits}' overflows")));
            }
            Ok(TokenKind::FloatLit(value))
        } else {
            let value: i64 = digits
                .parse()
                .map_err(|_| self.lexical(start, format!("integer literal '{digits}' overflows")))?;
            Ok(TokenKind::IntLit(value))
        }
    }

    fn lex_identifier(&mut self) -> TokenKind {
        let mut text = String::new();
        while let Some(b) = self.tape.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.tape.get();
                text.push(b as char);
            } else {
                break;
            }
        }
        match Keyword::from_ident(&text) {
            Some(kw) => TokenKind::Kw(kw),
            None => TokenKind::Id(text),
        }
    }
}

/// The one token cursor shared by both parsers.
///
/// Holds the current (not yet consumed) token; `advance` replaces it with
/// the next one from the scanner. A parser that cannot use the current token
/// simply returns without advancing, leaving it for its caller.
pub struct TokenCursor {
    scanner: Scanner,
    current: Token,
}

impl TokenCursor {
    pub fn new(source: &str) -> Result<TokenCursor, CompileError> {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token()?;
        Ok(TokenCursor { scanner, current })
    }

    pub fn current(&self) -> &TokenKind {
        &self.current.kind
    }

    /// Coordinates of the current token.
    pub fn pos(&self) -> SourcePos {
        self.current.pos
    }

    /// Consume the current token and fetch the next.
    pub fn advance(&mut self) -> Result<(), CompileError> {
        self.current = self.scanner.next_token()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        loop {
            let token = scanner.next_token().expect("lexes");
            let eof = token.kind == TokenKind::Eof;
            out.push(token.kind);
            if eof {
                break;
            }
        }
        out
    }

    fn first_err(source: &str) -> CompileError {
        let mut scanner = Scanner::new(source);
        loop {
            match scanner.next_token() {
                Ok(token) if token.kind == TokenKind::Eof => panic!("expected lexical error"),
                Ok(_) => continue,
                Err(err) => return err,
            }
        }
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("while whilex _x"),
            vec![
                TokenKind::Kw(Keyword::While),
                TokenKind::Id("whilex".into()),
                TokenKind::Id("_x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("< <= == ~= = // / .. #"),
            vec![
                TokenKind::Lt,
                TokenKind::Le,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Assign,
                TokenKind::SlashSlash,
                TokenKind::Slash,
                TokenKind::Concat,
                TokenKind::Hash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("0 00 42 3.14 1e3 2.5e-2 0.5"),
            vec![
                TokenKind::IntLit(0),
                TokenKind::IntLit(0),
                TokenKind::IntLit(42),
                TokenKind::FloatLit(3.14),
                TokenKind::FloatLit(1e3),
                TokenKind::FloatLit(2.5e-2),
                TokenKind::FloatLit(0.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_number_needs_fraction_digits() {
        assert!(matches!(
            first_err("1."),
            CompileError::Lexical { .. }
        ));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\n\t\\\"b\065""#),
            vec![TokenKind::StrLit("a\n\t\\\"bA".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_zero_escape_forbidden() {
        let err = first_err(r#""\000""#);
        assert!(matches!(err, CompileError::Lexical { .. }));
        // but 001 and 255 are fine
        assert_eq!(
            kinds(r#""\001\255""#),
            vec![TokenKind::StrLit("\u{1}\u{ff}".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            first_err("\"abc\ndef\""),
            CompileError::Lexical { .. }
        ));
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("a -- line comment\nb --[[ block\ncomment ]] c"),
            vec![
                TokenKind::Id("a".into()),
                TokenKind::Id("b".into()),
                TokenKind::Id("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert!(matches!(
            first_err("--[[ never closed"),
            CompileError::Lexical { .. }
        ));
    }

    #[test]
    fn test_stray_characters() {
        assert!(matches!(first_err("a ~ b"), CompileError::Lexical { .. }));
        assert!(matches!(first_err("a . b"), CompileError::Lexical { .. }));
        assert!(matches!(first_err("@"), CompileError::Lexical { .. }));
    }

    #[test]
    fn test_positions() {
        let mut scanner = Scanner::new("x\n  y");
        let x = scanner.next_token().unwrap();
        assert_eq!(x.pos, SourcePos { line: 1, column: 1 });
        let y = scanner.next_token().unwrap();
        assert_eq!(y.pos, SourcePos { line: 2, column: 3 });
    }
}
