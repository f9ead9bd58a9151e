//! Lexer for Osprey source code.
//!
//! Handles tokenization including:
//! - Reserved words and case-folded identifiers
//! - Numeric, string and boolean literals
//! - Single-character punctuation and two-character lookahead operators
//! - Nestable `/* ... */` block comments and `//` line comments
//!
//! The lexer owns the token cursor: [`Lexer::scan`] advances the current
//! token and [`Lexer::unscan`] marks it for exactly one re-delivery. It also
//! owns the line counter used by every diagnostic. Lexical errors are
//! recorded but never abort: a scan always yields a token or EOF.

use std::iter::Peekable;
use std::str::Chars;

use crate::frontend::diagnostics::{CompileError, ErrorKind};
use crate::frontend::token::{
    ArithOp, BoolOp, LexToken, LiteralValue, MAX_TOKEN_LEN, RelOp, TermOp, TokenKind, reserved_word,
};

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    current: LexToken,
    /// Pending pushback. At most one token deep; the grammar never needs
    /// more, and a second `unscan` before the next `scan` is a caller bug.
    unscanned: bool,
    errors: Vec<CompileError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            current: LexToken::new(TokenKind::Eof, 1),
            unscanned: false,
            errors: Vec::new(),
        }
    }

    /// The token most recently delivered by [`Lexer::scan`].
    pub fn current(&self) -> &LexToken {
        &self.current
    }

    /// Line of the current token, for diagnostics.
    pub fn line(&self) -> u32 {
        self.current.line
    }

    /// Advance the cursor to the next token, honoring a pending pushback.
    pub fn scan(&mut self) {
        if self.unscanned {
            self.unscanned = false;
            return;
        }
        self.current = self.next_token();
    }

    /// Mark the current token for re-delivery on the next [`Lexer::scan`].
    pub fn unscan(&mut self) {
        assert!(!self.unscanned, "INVARIANT: double unscan leaves the token stream undefined");
        self.unscanned = true;
    }

    /// Lexical errors recorded so far, in source order.
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<CompileError> {
        std::mem::take(&mut self.errors)
    }

    // ========================================================================
    // Character handling
    // ========================================================================

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn report(&mut self, kind: ErrorKind, line: u32) {
        self.errors.push(CompileError::new(kind, line));
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    fn next_token(&mut self) -> LexToken {
        loop {
            while self.peek_char().is_some_and(|c| c.is_whitespace()) {
                self.next_char();
            }

            let line = self.line;
            let Some(c) = self.next_char() else {
                return LexToken::new(TokenKind::Eof, line);
            };

            let kind = match c {
                '.' => TokenKind::Period,
                ';' => TokenKind::Semicolon,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                '&' => TokenKind::BoolOp(BoolOp::And),
                '|' => TokenKind::BoolOp(BoolOp::Or),
                '+' => TokenKind::ArithOp(ArithOp::Plus),
                '-' => TokenKind::ArithOp(ArithOp::Minus),
                '*' => TokenKind::TermOp(TermOp::Star),
                '/' => match self.peek_char() {
                    Some('*') => {
                        self.next_char();
                        self.skip_block_comment(line);
                        continue;
                    }
                    Some('/') => {
                        while self.peek_char().is_some_and(|c| c != '\n') {
                            self.next_char();
                        }
                        continue;
                    }
                    _ => TokenKind::TermOp(TermOp::Slash),
                },
                '<' => {
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        TokenKind::RelOp(RelOp::LessEq)
                    } else {
                        TokenKind::RelOp(RelOp::Less)
                    }
                }
                '>' => {
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        TokenKind::RelOp(RelOp::GreaterEq)
                    } else {
                        TokenKind::RelOp(RelOp::Greater)
                    }
                }
                '=' => {
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        TokenKind::RelOp(RelOp::Equal)
                    } else {
                        self.report(ErrorKind::UnrecognizedToken("=".to_string()), line);
                        continue;
                    }
                }
                '!' => {
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        TokenKind::RelOp(RelOp::NotEqual)
                    } else {
                        self.report(ErrorKind::UnrecognizedToken("!".to_string()), line);
                        continue;
                    }
                }
                ':' => {
                    if self.peek_char() == Some('=') {
                        self.next_char();
                        TokenKind::Assign
                    } else {
                        TokenKind::Colon
                    }
                }
                '"' => self.scan_string(line),
                '0'..='9' => self.scan_number(c, line),
                'A'..='Z' | 'a'..='z' => self.scan_identifier(c, line),
                other => {
                    self.report(ErrorKind::UnrecognizedToken(other.to_string()), line);
                    continue;
                }
            };
            return LexToken::new(kind, line);
        }
    }

    /// Skip a `/* ... */` comment, honoring nesting. `line` is where the
    /// comment opened, which is where an unterminated comment is reported.
    fn skip_block_comment(&mut self, line: u32) {
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_char() {
                Some('/') if self.peek_char() == Some('*') => {
                    self.next_char();
                    depth += 1;
                }
                Some('*') if self.peek_char() == Some('/') => {
                    self.next_char();
                    depth -= 1;
                }
                Some(_) => {}
                None => {
                    self.report(ErrorKind::UnterminatedComment, line);
                    return;
                }
            }
        }
    }

    /// Scan a `"`-delimited string literal. No escapes; an unterminated
    /// string is reported and the collected text kept best-effort.
    fn scan_string(&mut self, line: u32) -> TokenKind {
        let mut text = String::new();
        let mut too_long = false;
        loop {
            match self.next_char() {
                Some('"') => break,
                Some(c) => {
                    if text.len() < MAX_TOKEN_LEN - 1 {
                        text.push(c);
                    } else {
                        too_long = true;
                    }
                }
                None => {
                    self.report(ErrorKind::UnterminatedString, line);
                    break;
                }
            }
        }
        if too_long {
            self.report(ErrorKind::TokenTooLong("string literal".to_string()), line);
        }
        TokenKind::Literal(LiteralValue::Str(text))
    }

    /// Scan a digit/`.` run. Exactly one `.` makes a float; more than one is
    /// reported and the literal kept as a best-effort float.
    fn scan_number(&mut self, first: char, line: u32) -> TokenKind {
        let mut text = String::new();
        text.push(first);
        while self.peek_char().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            // Unwrap is fine: peek said there is a character.
            let c = self.next_char().expect("INVARIANT: peeked character present");
            if text.len() < MAX_TOKEN_LEN - 1 {
                text.push(c);
            }
        }
        if text.len() >= MAX_TOKEN_LEN - 1 {
            self.report(ErrorKind::TokenTooLong("numeric literal".to_string()), line);
        }

        let decimal_points = text.bytes().filter(|&b| b == b'.').count();
        match decimal_points {
            0 => TokenKind::Literal(LiteralValue::Int(text.parse().unwrap_or(i64::MAX))),
            1 => TokenKind::Literal(LiteralValue::Float(text.parse().unwrap_or(0.0))),
            _ => {
                self.report(ErrorKind::ExtraDecimalPoint, line);
                // Best effort: parse up to the second decimal point.
                let mut end = text.len();
                let mut seen = 0usize;
                for (i, b) in text.bytes().enumerate() {
                    if b == b'.' {
                        seen += 1;
                        if seen == 2 {
                            end = i;
                            break;
                        }
                    }
                }
                TokenKind::Literal(LiteralValue::Float(text[..end].parse().unwrap_or(0.0)))
            }
        }
    }

    /// Scan a letter/digit/underscore run, folded to uppercase, and classify
    /// it against the reserved words.
    fn scan_identifier(&mut self, first: char, line: u32) -> TokenKind {
        let mut spelling = String::new();
        spelling.push(first.to_ascii_uppercase());
        while self.peek_char().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            let c = self.next_char().expect("INVARIANT: peeked character present");
            if spelling.len() < MAX_TOKEN_LEN - 1 {
                spelling.push(c.to_ascii_uppercase());
            }
        }
        if spelling.len() >= MAX_TOKEN_LEN - 1 {
            self.report(ErrorKind::TokenTooLong("identifier".to_string()), line);
        }

        match reserved_word(&spelling) {
            Some(kind) => kind,
            None => TokenKind::Ident(spelling),
        }
    }
}
