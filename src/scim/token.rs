//! SCIM Filter Tokenizer
//!
//! Splits raw filter text into a flat token stream for the parser. The
//! tokenizer is a pure function over its input: it never looks at mapping
//! tables and stops at the first character it cannot classify.
//!
//! Keywords (`eq`, `and`, `pr`, `true`, ...) are recognized case-insensitively
//! unless [`FilterOptions::keywords_case_sensitive`] is set, in which case only
//! the lowercase spellings are keywords and anything else lexes as a name.

use std::fmt;

use super::filter::{CompareOp, FilterOptions, FilterSyntaxError};

/// Lexical category of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Attribute or sub-attribute name
    Name,
    /// `:` between an attribute and its sub-attribute
    Colon,
    /// `.` between an attribute and its sub-attribute (SCIM dotted form)
    Dot,
    LParen,
    RParen,
    /// One of the nine comparison keywords
    CompareOp(CompareOp),
    /// `pr`
    Present,
    And,
    Or,
    Not,
    /// Quoted string literal with escapes already decoded
    String(String),
    /// Numeric literal, kept exactly as written
    Number(String),
    Bool(bool),
    Null,
    /// End of input. Always the last token of a stream.
    Eof,
}

/// A single lexical unit and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Source text exactly as written (empty for [`TokenKind::Eof`])
    pub text: &'a str,
    pub position: usize,
}

impl Token<'_> {
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_eof() {
            write!(f, "end of input")
        } else {
            write!(f, "'{}'", self.text)
        }
    }
}

/// Split `input` into tokens, terminated by a single [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns a [`FilterSyntaxError`] if the input exceeds
/// [`FilterOptions::max_length`], contains a character that starts no token,
/// or has an unterminated string, bad escape, or malformed number.
pub fn tokenize<'a>(
    input: &'a str,
    options: &FilterOptions,
) -> Result<Vec<Token<'a>>, FilterSyntaxError> {
    if input.len() > options.max_length {
        return Err(FilterSyntaxError::new(
            format!(
                "Filter exceeds maximum length ({} bytes, max {})",
                input.len(),
                options.max_length
            ),
            0,
        ));
    }

    let mut lexer = Lexer {
        input,
        position: 0,
        keywords_case_sensitive: options.keywords_case_sensitive,
    };
    let mut tokens = Vec::new();

    loop {
        lexer.skip_whitespace();
        let Some(c) = lexer.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: "",
                position: input.len(),
            });
            return Ok(tokens);
        };

        let start = lexer.position;
        let kind = match c {
            '(' => lexer.single(TokenKind::LParen),
            ')' => lexer.single(TokenKind::RParen),
            ':' => lexer.single(TokenKind::Colon),
            '.' => lexer.single(TokenKind::Dot),
            '"' => lexer.string()?,
            c if c.is_ascii_digit() => lexer.number()?,
            '-' | '+' if lexer.peek_second().is_some_and(|n| n.is_ascii_digit()) => {
                lexer.number()?
            }
            c if c.is_ascii_alphabetic() => lexer.word(),
            other => {
                return Err(FilterSyntaxError::unexpected(
                    format!("Unexpected character '{other}'"),
                    start,
                    other.to_string(),
                ));
            }
        };

        tokens.push(Token {
            kind,
            text: &input[start..lexer.position],
            position: start,
        });
    }
}

struct Lexer<'a> {
    input: &'a str,
    position: usize,
    keywords_case_sensitive: bool,
}

impl Lexer<'_> {
    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    // [A-Za-z][A-Za-z0-9_-]*
    fn word(&mut self) -> TokenKind {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            self.advance();
        }
        let word = &self.input[start..self.position];

        let folded;
        let candidate = if self.keywords_case_sensitive {
            word
        } else {
            folded = word.to_ascii_lowercase();
            folded.as_str()
        };

        match candidate {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "pr" => TokenKind::Present,
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "null" => TokenKind::Null,
            other => CompareOp::from_keyword(other).map_or(TokenKind::Name, TokenKind::CompareOp),
        }
    }

    fn string(&mut self) -> Result<TokenKind, FilterSyntaxError> {
        let start = self.position;
        self.advance(); // opening quote

        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(FilterSyntaxError::new("Unterminated string", start));
                }
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::String(value));
                }
                Some('\\') => {
                    let escape_at = self.position;
                    self.advance();
                    let decoded = match self.peek() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        _ => {
                            return Err(FilterSyntaxError::new(
                                "Invalid escape sequence",
                                escape_at,
                            ));
                        }
                    };
                    value.push(decoded);
                    self.advance();
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn number(&mut self) -> Result<TokenKind, FilterSyntaxError> {
        let start = self.position;

        if matches!(self.peek(), Some('-' | '+')) {
            self.advance();
        }
        self.digits();

        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.digits();
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('-' | '+')) {
                self.advance();
            }
            self.digits();
        }

        let text = &self.input[start..self.position];
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(TokenKind::Number(text.to_string())),
            Ok(_) => Err(FilterSyntaxError::unexpected(
                format!("Number out of range: '{text}'"),
                start,
                text,
            )),
            Err(_) => Err(FilterSyntaxError::unexpected(
                format!("Invalid number: '{text}'"),
                start,
                text,
            )),
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.position += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }
}
