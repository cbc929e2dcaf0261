//! Module `scanner` implements a one‑pass, streaming lexer for the Sprig language.
//!
//! It transforms a source string into a sequence of `Token<'a>`s, skipping whitespace
//! and comments, and emitting exactly one `EOF` token at the end. Designed as a `FusedIterator`,
//! it can be chained safely with other iterator adapters.
//!
//! # Public API
//!
//! - `Scanner::new(src: &'a str) -> Scanner<'a>`
//!   Create a new lexer over the input buffer.
//!
//! - `impl Iterator for Scanner<'a>`
//!   Yields `Result<Token<'a>, SprigError>` on each `.next()`.  An unknown character
//!   yields `Err(SprigError::UnexpectedCharacter)` and scanning continues; a fatal
//!   error (unterminated string, malformed number) is yielded once and the
//!   iterator is exhausted afterwards.
//!
//! - `scan(src, reporter) -> Result<Vec<Token<'a>>>`
//!   Drains a scanner, forwarding non‑fatal errors to the reporter.
//!
//! # Token Recognition (`scan_token`)
//!
//! - Single‑character tokens: `(`, `)`, `{`, `}`, `,`, `;`.
//! - Operators with an optional `=` suffix, always tried two‑character first:
//!   `-=`, `+=`, `*=`, `/=`, `!=`, `==`, `<=`, `>=`.
//! - String literals: `"` … `"` or `'` … `'`, verbatim, may span lines.
//! - Numeric literals: digit run with an optional single fractional part.
//! - Identifiers/keywords: alphanumeric/_ sequences, resolved via a perfect‑hash `KEYWORDS` map.
//!
//! Comments are skipped in bulk with `memchr`, and every token's lexeme is a
//! slice of the original buffer.

use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::{Result, SprigError};
use crate::token::{Position, Token, TokenType};
use log::{debug, info};
use memchr::memchr;
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"for"    => TokenType::FOR,
    b"func"   => TokenType::FUNC,
    b"if"     => TokenType::IF,
    b"let"    => TokenType::LET,
    b"nil"    => TokenType::NIL,
    b"not"    => TokenType::NOT,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"true"   => TokenType::TRUE,
    b"while"  => TokenType::WHILE,
};

/// A single pass **scanner / lexer** that converts source text into a
/// sequence of [`Token`]s.  The lifetime `'a` ties every emitted token’s
/// `lexeme` slice back to the original source buffer.
pub struct Scanner<'a> {
    src: &'a str,               // entire source unit
    start: usize,               // index of the *first* byte of the current lexeme
    curr: usize,                // index *one past* the last byte examined
    line: usize,                // 1‑based line counter (\n increments)
    line_start: usize,          // byte index where the current line begins
    token_pos: Position,        // where the current lexeme began
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            line_start: 0,
            token_pos: Position::new(1, 1),
            pending: None,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    #[inline(always)]
    fn len(&self) -> usize {
        self.src.len()
    }

    /// Are we at (or past) the end of input?
    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Advance one byte and return it.  Callers guard with [`is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes()[self.curr];
        self.curr += 1;
        b
    }

    /// Peek at the current byte without consuming it.  Returns `0` if past EOF
    /// to avoid branching at call‑site.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes()[self.curr]
        }
    }

    /// Peek one byte beyond [`peek`].  Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.bytes()[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Record a newline whose `\n` byte sits just before `self.curr`.
    #[inline(always)]
    fn new_line(&mut self) {
        self.line += 1;
        self.line_start = self.curr;
    }

    /// Pick the two‑character form when the next byte is `=`.
    #[inline(always)]
    fn with_equal(&mut self, two: TokenType, one: TokenType) -> TokenType {
        if self.match_byte(b'=') {
            two
        } else {
            one
        }
    }

    /// After a fatal error nothing else is emitted, not even `EOF`.
    fn halt(&mut self) {
        self.curr = self.len() + 1;
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* token starting at `self.curr`.  If the lexeme produces an
    /// actual token the kind is stored in `self.pending`.  Whitespace and
    /// comments are skipped by returning `Ok(())` with `pending = None`.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        match b {
            // ── single‑character punctuators ──────────────────────────────
            b'(' => self.pending = Some(TokenType::LEFT_PAREN),
            b')' => self.pending = Some(TokenType::RIGHT_PAREN),
            b'{' => self.pending = Some(TokenType::LEFT_BRACE),
            b'}' => self.pending = Some(TokenType::RIGHT_BRACE),
            b',' => self.pending = Some(TokenType::COMMA),
            b';' => self.pending = Some(TokenType::SEMICOLON),

            // ── maximal munch: X= before X ───────────────────────────────
            b'-' => {
                self.pending = Some(self.with_equal(TokenType::MINUS_EQUAL, TokenType::MINUS))
            }
            b'+' => self.pending = Some(self.with_equal(TokenType::PLUS_EQUAL, TokenType::PLUS)),
            b'*' => self.pending = Some(self.with_equal(TokenType::STAR_EQUAL, TokenType::STAR)),
            b'=' => {
                self.pending = Some(self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL))
            }
            b'<' => {
                self.pending = Some(self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS))
            }
            b'>' => {
                self.pending = Some(self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER))
            }

            // `!` only exists as part of `!=`; negation is spelled `not`.
            b'!' => {
                if self.match_byte(b'=') {
                    self.pending = Some(TokenType::BANG_EQUAL);
                } else {
                    return Err(self.unexpected());
                }
            }

            // ── whitespace / newline ─────────────────────────────────────
            b' ' | b'\r' | b'\t' => {
                return Ok(()); // skip insignificants
            }

            b'\n' => {
                self.new_line(); // track for diagnostics

                return Ok(());
            }

            // ── comments (// … until newline) or slash operators ─────────
            b'/' => {
                if self.match_byte(b'/') {
                    // Fast‑forward to next newline using `memchr`.  The newline
                    // itself is left for the main loop so the line counter
                    // stays in one place.
                    if let Some(pos) = memchr(b'\n', &self.bytes()[self.curr..]) {
                        self.curr += pos;
                    } else {
                        self.curr = self.len();
                    }

                    return Ok(());
                }

                self.pending = Some(self.with_equal(TokenType::SLASH_EQUAL, TokenType::SLASH));
            }

            // ── string literal " … " or ' … ' ─────────────────────────────
            b'"' | b'\'' => {
                return self.parse_string(b);
            }

            // ── number literal (digit‑leading) ───────────────────────────
            b'0'..=b'9' => {
                return self.parse_number();
            }

            // ── identifiers / keywords (alpha or underscore‑leading) ─────
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_identifier();
            }

            // ── unexpected character ─────────────────────────────────────
            _ => {
                return Err(self.unexpected());
            }
        }

        Ok(())
    }

    /// Build the non‑fatal error for the character starting at `self.start`,
    /// stepping over all of its UTF‑8 bytes.
    fn unexpected(&mut self) -> SprigError {
        let character: char = self.src[self.start..].chars().next().unwrap_or('\u{FFFD}');
        self.curr = self.start + character.len_utf8();

        debug!("Skipping unexpected character {:?} at {}", character, self.token_pos);

        SprigError::UnexpectedCharacter {
            character,
            line: self.token_pos.line,
            column: self.token_pos.column,
        }
    }

    /// Parse a string literal closed by the same `delimiter` that opened it.
    ///
    /// * `self.start` still points to the opening delimiter.
    /// * When we return, `self.curr` points **past** the closing delimiter.
    fn parse_string(&mut self, delimiter: u8) -> Result<()> {
        while !self.is_at_end() && self.peek() != delimiter {
            if self.advance() == b'\n' {
                self.new_line(); // multi‑line strings are allowed
            }
        }

        if self.is_at_end() {
            let err = SprigError::lex(self.token_pos, "Unterminated string.");
            self.halt();
            return Err(err);
        }

        self.advance(); // consume closing delimiter

        // Slice excluding the surrounding delimiters; both are ASCII so the
        // bounds are char boundaries.
        let s: &str = &self.src[self.start + 1..self.curr - 1];

        self.pending = Some(TokenType::STRING(s.to_owned()));

        Ok(())
    }

    /// Parse a numeric literal (`123`, `3.14`).  Fractions are optional, but a
    /// dot must be followed by digits and may appear only once.
    fn parse_number(&mut self) -> Result<()> {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' {
            // A trailing dot (`7.`) is rejected rather than read as `7`;
            // there is no member access for it to introduce.
            if !self.peek_next().is_ascii_digit() {
                let err = SprigError::lex(self.token_pos, "Malformed number.");
                self.halt();
                return Err(err);
            }

            self.advance(); // consume "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }

            if self.peek() == b'.' {
                let err = SprigError::lex(self.token_pos, "Malformed number.");
                self.halt();
                return Err(err);
            }
        }

        let s: &str = &self.src[self.start..self.curr];
        let n: f64 = s.parse::<f64>().unwrap_or(0.0); // digits only, cannot fail
        self.pending = Some(TokenType::NUMBER(n));

        Ok(())
    }

    /// Parse an identifier and decide if it is a **keyword** or a generic
    /// `IDENTIFIER` token.
    fn parse_identifier(&mut self) {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let slice: &[u8] = &self.bytes()[self.start..self.curr];

        let tt: TokenType = KEYWORDS
            .get(slice)
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER);

        self.pending = Some(tt);
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        // Loop until we either emit a token, hit EOF, or see an error.
        while self.curr <= self.len() {
            // 1. EOF guard – emit exactly one EOF then terminate.
            if self.curr == self.len() {
                let column = self.curr - self.line_start + 1;
                self.curr += 1; // ensure fused semantics
                return Some(Ok(Token::new(TokenType::EOF, "", self.line, column)));
            }

            // 2. Reset per‑token state.
            self.start = self.curr;
            self.token_pos = Position::new(self.line, self.start - self.line_start + 1);
            self.pending = None;

            // 3. Attempt to scan a token.
            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            // 4. If a real token was recognised, build and return it.
            if let Some(tt) = self.pending.take() {
                let lex: &'a str = &self.src[self.start..self.curr];

                return Some(Ok(Token::new(
                    tt,
                    lex,
                    self.token_pos.line,
                    self.token_pos.column,
                )));
            }
            // Otherwise it was whitespace / comment → continue loop.
        }

        None // already yielded EOF (or halted)
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scan a whole source unit.  Unknown characters are reported as warnings and
/// skipped; the first fatal error aborts the scan.
pub fn scan<'a>(src: &'a str, reporter: &mut dyn Reporter) -> Result<Vec<Token<'a>>> {
    let mut tokens: Vec<Token<'a>> = Vec::new();

    for item in Scanner::new(src) {
        match item {
            Ok(token) => tokens.push(token),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                if let Some(pos) = e.position() {
                    reporter.report(Diagnostic::warning(pos, e.message()));
                }
            }
        }
    }

    info!("Scanned {} tokens", tokens.len());

    Ok(tokens)
}
