//! SCIM Filter Parser
//!
//! Recursive-descent parser over the token stream produced by
//! [`tokenize`](super::token::tokenize).
//!
//! ## Grammar
//!
//! ```text
//! filter     = orExpr
//! orExpr     = andExpr { "or" andExpr }
//! andExpr    = unary { "and" unary }
//! unary      = "not" "(" filter ")" | primary
//! primary    = "(" filter ")" | attrExpr
//! attrExpr   = attrPath "pr" | attrPath compareOp literal
//! attrPath   = NAME [ (":" | ".") NAME ]
//! compareOp  = "eq" | "ne" | "co" | "sw" | "ew" | "gt" | "ge" | "lt" | "le"
//! literal    = STRING | NUMBER | "true" | "false" | "null"
//! ```
//!
//! `or` binds loosest, then `and`, then `not` and parenthesized groups.
//!
//! ## Examples
//!
//! ```text
//! userName eq "bjensen"
//! name:familyName co "jen"
//! userName eq "bjensen" and active eq true
//! not (emails pr or title sw "Dr")
//! ```
//!
//! ## Errors
//!
//! There is no recovery. The first violation is handed to the caller's
//! [`ErrorSink`] and parsing stops; no partial tree is produced.
//!
//! ## Security Limits
//!
//! - Maximum filter length: 4096 bytes (checked by the tokenizer)
//! - Maximum nesting depth: 32 levels

use std::fmt;

use serde::{Deserialize, Serialize};

use super::token::{Token, TokenKind, tokenize};

/// Default maximum length of a filter expression (bytes).
pub const MAX_FILTER_LENGTH: usize = 4096;

/// Default maximum nesting depth of `not (...)` and `( ... )` groups.
pub const MAX_FILTER_DEPTH: usize = 32;

/// Knobs for the tokenizer and parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Only lowercase keywords are recognized when set.
    pub keywords_case_sensitive: bool,
    pub max_length: usize,
    pub max_depth: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            keywords_case_sensitive: false,
            max_length: MAX_FILTER_LENGTH,
            max_depth: MAX_FILTER_DEPTH,
        }
    }
}

/// A parsed SCIM filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Attribute comparison (e.g., `userName eq "john"`)
    Compare {
        attr: AttrPath,
        op: CompareOp,
        value: FilterValue,
    },
    /// Attribute presence check (e.g., `title pr`)
    Present { attr: AttrPath },
    /// `and`/`or` over two or more children, or `not` over exactly one.
    /// Children keep their source order.
    Logical {
        op: LogicalOp,
        children: Vec<Filter>,
    },
    /// Explicit parentheses from the source text
    Group(Box<Filter>),
}

impl Filter {
    /// Combine `children` with `op`, collapsing a single child to itself.
    fn combine(op: LogicalOp, mut children: Vec<Filter>) -> Filter {
        if children.len() == 1
            && let Some(only) = children.pop()
        {
            return only;
        }
        Filter::Logical { op, children }
    }

    fn not(inner: Filter) -> Filter {
        Filter::Logical {
            op: LogicalOp::Not,
            children: vec![inner],
        }
    }

    /// Visit every attribute path in the tree, left to right.
    pub fn attr_paths(&self) -> Vec<&AttrPath> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a AttrPath>) {
        match self {
            Filter::Compare { attr, .. } | Filter::Present { attr } => out.push(attr),
            Filter::Logical { children, .. } => {
                for child in children {
                    child.collect_paths(out);
                }
            }
            Filter::Group(inner) => inner.collect_paths(out),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { attr, op, value } => write!(f, "{attr} {op} {value}"),
            Filter::Present { attr } => write!(f, "{attr} pr"),
            Filter::Group(inner) => write!(f, "({inner})"),
            Filter::Logical {
                op: LogicalOp::Not,
                children,
            } => {
                write!(f, "not (")?;
                for child in children {
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
            Filter::Logical { op, children } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    // An ungrouped `or` under `and` only arises from hand-built
                    // trees; parenthesize it so the text re-parses the same way.
                    let needs_parens = *op == LogicalOp::And
                        && matches!(
                            child,
                            Filter::Logical {
                                op: LogicalOp::Or,
                                ..
                            }
                        );
                    if needs_parens {
                        write!(f, "({child})")?;
                    } else {
                        write!(f, "{child}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Boolean connective of a [`Filter::Logical`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalOp::And => "and",
            LogicalOp::Or => "or",
            LogicalOp::Not => "not",
        };
        write!(f, "{s}")
    }
}

/// An attribute path, optionally qualified with a sub-attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrPath {
    /// Main attribute name (e.g., "userName", "name")
    pub attr: String,
    /// Sub-attribute (e.g., "familyName" in `name:familyName` or `name.familyName`)
    pub sub_attr: Option<String>,
}

impl AttrPath {
    /// Create a simple attribute path
    pub fn simple(attr: impl Into<String>) -> Self {
        Self {
            attr: attr.into(),
            sub_attr: None,
        }
    }

    /// Create a qualified attribute path (e.g., "name:familyName")
    pub fn nested(attr: impl Into<String>, sub_attr: impl Into<String>) -> Self {
        Self {
            attr: attr.into(),
            sub_attr: Some(sub_attr.into()),
        }
    }

    /// Parse a bare logical name such as `displayName`, `name.familyName`
    /// or `name:familyName`. Used for `sortBy`, which is not a filter.
    pub fn from_logical(name: &str) -> Self {
        match name.split_once([':', '.']) {
            Some((attr, sub)) => Self::nested(attr, sub),
            None => Self::simple(name),
        }
    }

    /// The key used by mapping tables: `attr` or `attr.sub`.
    pub fn logical_name(&self) -> String {
        match &self.sub_attr {
            Some(sub) => format!("{}.{}", self.attr, sub),
            None => self.attr.clone(),
        }
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.attr)?;
        if let Some(sub) = &self.sub_attr {
            write!(f, ":{sub}")?;
        }
        Ok(())
    }
}

/// Comparison operators per RFC 7644.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Co => "co",
            CompareOp::Sw => "sw",
            CompareOp::Ew => "ew",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
        };
        write!(f, "{s}")
    }
}

impl CompareOp {
    /// Match an already case-folded keyword.
    pub(crate) fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "co" => Some(CompareOp::Co),
            "sw" => Some(CompareOp::Sw),
            "ew" => Some(CompareOp::Ew),
            "gt" => Some(CompareOp::Gt),
            "ge" => Some(CompareOp::Ge),
            "lt" => Some(CompareOp::Lt),
            "le" => Some(CompareOp::Le),
            _ => None,
        }
    }

    /// Substring operators (`co`, `sw`, `ew`).
    pub fn is_substring(self) -> bool {
        matches!(self, CompareOp::Co | CompareOp::Sw | CompareOp::Ew)
    }

    /// Ordering operators (`gt`, `ge`, `lt`, `le`).
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le
        )
    }
}

/// Filter comparison values.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    String(String),
    Bool(bool),
    /// Numeric literal as written (`007`, `1e3`), validated as a finite number
    Number(String),
    Null,
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::String(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::Number(n) => write!(f, "{n}"),
            FilterValue::Null => write!(f, "null"),
        }
    }
}

/// Malformed filter text.
///
/// `found` is the offending token as written, or `None` when the parser ran
/// out of input.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSyntaxError {
    pub message: String,
    pub position: usize,
    pub found: Option<String>,
}

impl FilterSyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
            found: None,
        }
    }

    pub fn unexpected(
        message: impl Into<String>,
        position: usize,
        found: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            position,
            found: Some(found.into()),
        }
    }

    fn at(message: impl Into<String>, token: &Token<'_>) -> Self {
        Self {
            message: message.into(),
            position: token.position,
            found: (!token.is_eof()).then(|| token.text.to_string()),
        }
    }

    /// Whether the error was raised at end of input.
    pub fn at_end_of_input(&self) -> bool {
        self.found.is_none()
    }
}

impl fmt::Display for FilterSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            Some(found) => write!(
                f,
                "{} at position {} (found '{}')",
                self.message, self.position, found
            ),
            None => write!(f, "{} at position {}", self.message, self.position),
        }
    }
}

impl std::error::Error for FilterSyntaxError {}

// =============================================================================
// Error Sink
// =============================================================================

/// Receives syntax errors from a parse call.
///
/// The sink is passed into the parse explicitly so that concurrent parses
/// never share error state.
pub trait ErrorSink {
    fn syntax_error(&mut self, error: FilterSyntaxError);
}

/// Sink that keeps the first reported error.
#[derive(Debug, Default)]
pub struct FailFast {
    error: Option<FilterSyntaxError>,
}

impl FailFast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self) -> Option<&FilterSyntaxError> {
        self.error.as_ref()
    }

    /// Turn the parse outcome into a `Result`. A reported error always wins.
    pub fn into_result<T>(self, parsed: Option<T>) -> Result<T, FilterSyntaxError> {
        match (self.error, parsed) {
            (Some(err), _) => Err(err),
            (None, Some(value)) => Ok(value),
            (None, None) => Err(FilterSyntaxError::new("Filter could not be parsed", 0)),
        }
    }
}

impl ErrorSink for FailFast {
    fn syntax_error(&mut self, error: FilterSyntaxError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

// =============================================================================
// Entry Points
// =============================================================================

/// Parse a SCIM filter expression with the default options.
///
/// # Examples
///
/// ```
/// use scim_directory::scim::filter::parse_filter;
///
/// let filter = parse_filter("userName eq \"bjensen\"").unwrap();
/// let filter = parse_filter("active eq true and emails pr").unwrap();
/// ```
pub fn parse_filter(input: &str) -> Result<Filter, FilterSyntaxError> {
    parse_filter_with_options(input, &FilterOptions::default())
}

/// Parse a SCIM filter expression.
///
/// # Errors
///
/// Returns the first [`FilterSyntaxError`] from tokenizing or parsing.
pub fn parse_filter_with_options(
    input: &str,
    options: &FilterOptions,
) -> Result<Filter, FilterSyntaxError> {
    let mut sink = FailFast::new();
    let parsed = parse_into(input, options, &mut sink);
    sink.into_result(parsed)
}

/// Tokenize and parse `input`, reporting any failure to `sink`.
pub fn parse_into(
    input: &str,
    options: &FilterOptions,
    sink: &mut impl ErrorSink,
) -> Option<Filter> {
    match tokenize(input, options) {
        Ok(tokens) => parse_tokens(&tokens, options, sink),
        Err(err) => {
            sink.syntax_error(err);
            None
        }
    }
}

/// Parse a complete token stream (as produced by `tokenize`).
///
/// Returns `None` after reporting to `sink` if the stream is not exactly
/// one filter followed by end of input.
pub fn parse_tokens(
    tokens: &[Token<'_>],
    options: &FilterOptions,
    sink: &mut impl ErrorSink,
) -> Option<Filter> {
    let Some(eof) = tokens.last().filter(|t| t.is_eof()) else {
        sink.syntax_error(FilterSyntaxError::new(
            "Token stream is not terminated",
            tokens.last().map_or(0, |t| t.position),
        ));
        return None;
    };

    let mut parser = Parser {
        tokens,
        eof,
        index: 0,
        depth: 0,
        max_depth: options.max_depth,
    };

    let result = parser.parse_filter().and_then(|filter| {
        let next = parser.peek();
        if next.is_eof() {
            Ok(filter)
        } else {
            Err(FilterSyntaxError::at("Unexpected input after filter", next))
        }
    });

    match result {
        Ok(filter) => Some(filter),
        Err(err) => {
            sink.syntax_error(err);
            None
        }
    }
}

// =============================================================================
// Parser Implementation
// =============================================================================

struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    eof: &'t Token<'a>,
    index: usize,
    depth: usize,
    max_depth: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    /// Enter a nested scope (`not (...)` or `( ... )`).
    fn enter_scope(&mut self) -> Result<(), FilterSyntaxError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(FilterSyntaxError::at(
                format!(
                    "Filter exceeds maximum nesting depth ({})",
                    self.max_depth
                ),
                self.peek(),
            ));
        }
        Ok(())
    }

    fn exit_scope(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterSyntaxError> {
        self.parse_or_expr()
    }

    // orExpr = andExpr { "or" andExpr }
    fn parse_or_expr(&mut self) -> Result<Filter, FilterSyntaxError> {
        let mut children = vec![self.parse_and_expr()?];
        while self.eat(&TokenKind::Or) {
            children.push(self.parse_and_expr()?);
        }
        Ok(Filter::combine(LogicalOp::Or, children))
    }

    // andExpr = unary { "and" unary }
    fn parse_and_expr(&mut self) -> Result<Filter, FilterSyntaxError> {
        let mut children = vec![self.parse_unary()?];
        while self.eat(&TokenKind::And) {
            children.push(self.parse_unary()?);
        }
        Ok(Filter::combine(LogicalOp::And, children))
    }

    // unary = "not" "(" filter ")" | primary
    fn parse_unary(&mut self) -> Result<Filter, FilterSyntaxError> {
        if self.eat(&TokenKind::Not) {
            self.expect(&TokenKind::LParen, "Expected '(' after 'not'")?;
            let inner = self.parse_nested()?;
            self.expect(&TokenKind::RParen, "Expected ')' to close 'not' expression")?;
            return Ok(Filter::not(inner));
        }
        self.parse_primary()
    }

    // primary = "(" filter ")" | attrExpr
    fn parse_primary(&mut self) -> Result<Filter, FilterSyntaxError> {
        if self.eat(&TokenKind::LParen) {
            let inner = self.parse_nested()?;
            self.expect(&TokenKind::RParen, "Expected ')' to close grouped expression")?;
            return Ok(Filter::Group(Box::new(inner)));
        }
        self.parse_attr_expr()
    }

    fn parse_nested(&mut self) -> Result<Filter, FilterSyntaxError> {
        self.enter_scope()?;
        let inner = self.parse_filter()?;
        self.exit_scope();
        Ok(inner)
    }

    // attrExpr = attrPath "pr" | attrPath compareOp literal
    fn parse_attr_expr(&mut self) -> Result<Filter, FilterSyntaxError> {
        let attr = self.parse_attr_path()?;

        if self.eat(&TokenKind::Present) {
            return Ok(Filter::Present { attr });
        }

        let token = self.next();
        let TokenKind::CompareOp(op) = token.kind else {
            return Err(FilterSyntaxError::at(
                "Expected comparison operator or 'pr'",
                token,
            ));
        };

        let value = self.parse_literal()?;
        Ok(Filter::Compare { attr, op, value })
    }

    // attrPath = NAME [ (":" | ".") NAME ]
    fn parse_attr_path(&mut self) -> Result<AttrPath, FilterSyntaxError> {
        let attr = self.expect_name("Expected attribute name")?;

        let sub_attr = if self.eat(&TokenKind::Colon) || self.eat(&TokenKind::Dot) {
            Some(self.expect_name("Expected sub-attribute name")?)
        } else {
            None
        };

        Ok(AttrPath { attr, sub_attr })
    }

    fn parse_literal(&mut self) -> Result<FilterValue, FilterSyntaxError> {
        let token = self.next();
        match &token.kind {
            TokenKind::String(s) => Ok(FilterValue::String(s.clone())),
            TokenKind::Number(n) => Ok(FilterValue::Number(n.clone())),
            TokenKind::Bool(b) => Ok(FilterValue::Bool(*b)),
            TokenKind::Null => Ok(FilterValue::Null),
            _ => Err(FilterSyntaxError::at(
                "Expected value (string, boolean, number, or null)",
                token,
            )),
        }
    }

    // Helper methods

    fn peek(&self) -> &'t Token<'a> {
        self.tokens.get(self.index).unwrap_or(self.eof)
    }

    fn next(&mut self) -> &'t Token<'a> {
        let token = self.peek();
        if !token.is_eof() {
            self.index += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().kind == *kind {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<(), FilterSyntaxError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(FilterSyntaxError::at(message, self.peek()))
        }
    }

    fn expect_name(&mut self, message: &str) -> Result<String, FilterSyntaxError> {
        let token = self.next();
        if token.kind == TokenKind::Name {
            Ok(token.text.to_string())
        } else {
            Err(FilterSyntaxError::at(message, token))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
