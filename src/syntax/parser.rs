//! Error-tolerant recursive-descent parser for JavaScript modules.
//!
//! The parser never stops at the first problem. Each syntax error is recorded
//! and parsing resumes: a missing punctuator is treated as inserted, an
//! unexpected token is skipped, and a statement that consumes nothing forces
//! the cursor forward. Only two conditions abandon the parse: the lexer
//! failing to tokenize the input, and nesting deeper than [`MAX_DEPTH`].
//!
//! No syntax tree is built. Expressions report just enough about their shape
//! ([`Expr`]) to check assignment targets.

use std::collections::HashSet;

use thiserror::Error;

use super::lexer::{self, LexError, Token, TokenKind};
use super::Diagnostic;

/// Maximum nesting of statements and expressions before the parse is abandoned.
pub const MAX_DEPTH: usize = 256;

const RESERVED: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "enum",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "new",
    "null",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "var",
    "void",
    "while",
    "with",
];

/// Keywords that can never begin an expression. When one shows up where an
/// expression was expected it most likely starts the next statement, so it is
/// left in place.
const NOT_EXPRESSION_START: &[&str] = &[
    "break",
    "case",
    "catch",
    "const",
    "continue",
    "debugger",
    "default",
    "do",
    "else",
    "enum",
    "export",
    "extends",
    "finally",
    "for",
    "if",
    "in",
    "instanceof",
    "return",
    "switch",
    "throw",
    "try",
    "var",
    "while",
    "with",
];

const ASSIGN_OPS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=",
    "||=", "??=",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxFault {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Maximum nesting depth of {limit} exceeded.")]
    TooDeep { limit: usize, offset: usize },
}

impl SyntaxFault {
    pub fn offset(&self) -> usize {
        match self {
            SyntaxFault::Lex(err) => err.offset(),
            SyntaxFault::TooDeep { offset, .. } => *offset,
        }
    }
}

/// Parse `source` as a module and return every recoverable syntax error in
/// source order, at most one per offset.
pub fn parse_module(source: &str) -> Result<Vec<Diagnostic>, SyntaxFault> {
    let lexed = lexer::tokenize(source)?;
    let mut parser = Parser::new(source, lexed.tokens);
    parser.parse_program();
    if let Some(fault) = parser.fault {
        return Err(fault);
    }

    let mut diagnostics = lexed.diagnostics;
    diagnostics.extend(parser.diagnostics);
    diagnostics.sort_by_key(|d| d.offset);
    diagnostics.dedup_by_key(|d| d.offset);
    Ok(diagnostics)
}

/// Shape of a parsed expression, as far as assignment is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expr {
    Ident,
    Member,
    /// Object or array literal, assignable as a destructuring pattern.
    Pattern,
    Call,
    Other,
    /// Placeholder after a syntax error; accepted anywhere to avoid cascades.
    Error,
}

impl Expr {
    fn simple_target(self) -> bool {
        matches!(self, Expr::Ident | Expr::Member | Expr::Error)
    }

    fn assign_target(self) -> bool {
        self.simple_target() || self == Expr::Pattern
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Var,
    Let,
    Const,
    /// Classes and imports.
    Lexical,
    Function,
    Param,
}

impl Binding {
    fn is_lexical(self) -> bool {
        matches!(self, Binding::Let | Binding::Const | Binding::Lexical)
    }
}

#[derive(Debug, Default)]
struct Scope {
    lexical: HashSet<String>,
    vars: HashSet<String>,
}

#[derive(Debug, Default)]
struct Frame {
    function: bool,
    is_async: bool,
    generator: bool,
    loops: usize,
    switches: usize,
    /// Enclosing labels and whether each labels a loop.
    labels: Vec<(String, bool)>,
}

impl Frame {
    fn module() -> Self {
        // top-level await is allowed in modules
        Self {
            is_async: true,
            ..Self::default()
        }
    }

    fn function(is_async: bool, generator: bool) -> Self {
        Self {
            function: true,
            is_async,
            generator,
            ..Self::default()
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    /// Token index of the last reported unexpected token; suppresses cascades.
    last_error_token: Option<usize>,
    depth: usize,
    fault: Option<SyntaxFault>,
    frames: Vec<Frame>,
    scopes: Vec<Scope>,
    /// Inside a `for` head, where `in` ends the initializer.
    no_in: bool,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            src,
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            last_error_token: None,
            depth: 0,
            fault: None,
            frames: vec![Frame::module()],
            scopes: vec![Scope::default()],
            no_in: false,
        }
    }

    // ------------------------------------------------------------------
    // cursor
    // ------------------------------------------------------------------

    fn cur(&self) -> Token {
        self.peek(0)
    }

    fn peek(&self, n: usize) -> Token {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens[(self.pos + n).min(last)]
    }

    fn text(&self, tok: Token) -> &'a str {
        &self.src[tok.start..tok.end]
    }

    fn token_is(&self, tok: Token, s: &str) -> bool {
        match tok.kind {
            TokenKind::Punct(p) => p == s,
            TokenKind::Ident => self.text(tok) == s,
            _ => false,
        }
    }

    fn at(&self, s: &str) -> bool {
        self.token_is(self.cur(), s)
    }

    fn peek_is(&self, n: usize, s: &str) -> bool {
        self.token_is(self.peek(n), s)
    }

    fn is_eof(&self) -> bool {
        self.cur().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.at(s) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) {
        if !self.eat(s) {
            self.unexpected_expected(s);
        }
    }

    fn prev_end(&self) -> usize {
        match self.pos {
            0 => 0,
            n => self.tokens[n - 1].end,
        }
    }

    fn is_identifier(&self, tok: Token) -> bool {
        tok.kind == TokenKind::Ident && !RESERVED.contains(&self.text(tok))
    }

    fn is_closer(&self, tok: Token) -> bool {
        match tok.kind {
            TokenKind::Eof | TokenKind::Template {
                continuation: true, ..
            } => true,
            TokenKind::Punct(p) => matches!(p, ")" | "]" | "}" | ";"),
            TokenKind::Ident => NOT_EXPRESSION_START.contains(&self.text(tok)),
            _ => false,
        }
    }

    fn can_start_expression(&self) -> bool {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Ident => !NOT_EXPRESSION_START.contains(&self.text(tok)),
            TokenKind::Number
            | TokenKind::String
            | TokenKind::Regex
            | TokenKind::PrivateName
            | TokenKind::Template {
                continuation: false,
                ..
            } => true,
            TokenKind::Punct(p) => matches!(
                p,
                "(" | "[" | "{" | "!" | "~" | "+" | "-" | "++" | "--" | "..."
            ),
            _ => false,
        }
    }

    fn can_start_property(&self) -> bool {
        matches!(
            self.cur().kind,
            TokenKind::Ident
                | TokenKind::String
                | TokenKind::Number
                | TokenKind::PrivateName
                | TokenKind::Punct("[" | "..." | "*")
        )
    }

    fn can_start_binding(&self) -> bool {
        matches!(
            self.cur().kind,
            TokenKind::Ident | TokenKind::Punct("[" | "{" | "...")
        )
    }

    // ------------------------------------------------------------------
    // diagnostics
    // ------------------------------------------------------------------

    fn report(&mut self, offset: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            offset,
            message: message.into(),
        });
    }

    /// Report at most one cascading error per token position.
    fn report_here(&mut self, offset: usize, message: impl Into<String>) {
        if self.last_error_token == Some(self.pos) {
            return;
        }
        self.last_error_token = Some(self.pos);
        self.report(offset, message);
    }

    fn unexpected(&mut self) {
        let tok = self.cur();
        let message = match tok.kind {
            TokenKind::Ident if RESERVED.contains(&self.text(tok)) => {
                format!("Unexpected keyword '{}'.", self.text(tok))
            }
            _ => "Unexpected token".to_string(),
        };
        self.report_here(tok.start, message);
    }

    fn unexpected_expected(&mut self, expected: &str) {
        let start = self.cur().start;
        self.report_here(start, format!("Unexpected token, expected \"{}\"", expected));
    }

    // ------------------------------------------------------------------
    // context
    // ------------------------------------------------------------------

    fn enter(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            if self.fault.is_none() {
                self.fault = Some(SyntaxFault::TooDeep {
                    limit: MAX_DEPTH,
                    offset: self.cur().start,
                });
            }
            // jump to the end so every loop unwinds
            self.pos = self.tokens.len().saturating_sub(1);
            return false;
        }
        self.depth += 1;
        true
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    fn declare(&mut self, tok: Token, kind: Binding) {
        let name = self.text(tok);
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        let clash = if kind.is_lexical() {
            scope.lexical.contains(name) || scope.vars.contains(name)
        } else if kind == Binding::Param {
            false
        } else {
            scope.lexical.contains(name)
        };
        if kind.is_lexical() {
            scope.lexical.insert(name.to_string());
        } else {
            scope.vars.insert(name.to_string());
        }
        if clash {
            self.report(
                tok.start,
                format!("Identifier '{}' has already been declared.", name),
            );
        }
    }

    fn check_await(&mut self, offset: usize) {
        if self.frame().is_some_and(|f| !f.is_async) {
            self.report(
                offset,
                "'await' is only allowed within async functions and at the top levels of modules.",
            );
        }
    }

    fn check_module_level(&mut self, offset: usize) {
        if self.frames.len() > 1 || self.scopes.len() > 1 {
            self.report(
                offset,
                "'import' and 'export' may only appear at the top level.",
            );
        }
    }

    fn with_function<F>(&mut self, frame: Frame, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.frames.push(frame);
        self.scopes.push(Scope::default());
        let no_in = std::mem::replace(&mut self.no_in, false);
        body(self);
        self.no_in = no_in;
        self.scopes.pop();
        self.frames.pop();
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    fn parse_program(&mut self) {
        self.parse_statements_until(None);
    }

    fn parse_statements_until(&mut self, closer: Option<&str>) {
        while !self.is_eof() && !closer.is_some_and(|c| self.at(c)) {
            let before = self.pos;
            self.parse_statement();
            if self.pos == before {
                self.unexpected();
                self.advance();
            }
        }
    }

    fn parse_statement(&mut self) {
        if !self.enter() {
            return;
        }
        self.parse_statement_inner();
        self.leave();
    }

    fn parse_statement_inner(&mut self) {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Punct("{") => self.parse_block(true),
            TokenKind::Punct(";") => self.advance(),
            TokenKind::Ident => match self.text(tok) {
                "var" => self.parse_var_statement(Binding::Var),
                "const" => self.parse_var_statement(Binding::Const),
                "let" if self.let_starts_declaration() => self.parse_var_statement(Binding::Let),
                "function" => self.parse_function(false, true, true),
                "async" if self.peek_is(1, "function") && !self.peek(1).newline_before => {
                    self.advance();
                    self.parse_function(true, true, true);
                }
                "class" => self.parse_class(true, true),
                "if" => self.parse_if(),
                "for" => self.parse_for(),
                "while" => self.parse_while(),
                "do" => self.parse_do_while(),
                "return" => self.parse_return(),
                "break" | "continue" => self.parse_jump(),
                "throw" => self.parse_throw(),
                "try" => self.parse_try(),
                "switch" => self.parse_switch(),
                "debugger" => {
                    self.advance();
                    self.semicolon();
                }
                "with" => {
                    self.report(tok.start, "'with' in strict mode.");
                    self.advance();
                    self.parse_paren_condition();
                    self.parse_statement();
                }
                "import" if !self.peek_is(1, "(") && !self.peek_is(1, ".") => self.parse_import(),
                "export" => self.parse_export(),
                _ if self.is_identifier(tok) && self.peek_is(1, ":") => self.parse_labeled(),
                _ => self.parse_expression_statement(),
            },
            _ => self.parse_expression_statement(),
        }
    }

    fn let_starts_declaration(&self) -> bool {
        let next = self.peek(1);
        next.kind == TokenKind::Ident || self.token_is(next, "[") || self.token_is(next, "{")
    }

    fn semicolon(&mut self) {
        if self.eat(";") || self.at("}") || self.is_eof() || self.cur().newline_before {
            return;
        }
        let offset = self.prev_end();
        self.report_here(offset, "Missing semicolon.");
    }

    fn parse_expression_statement(&mut self) {
        self.parse_expression();
        self.semicolon();
    }

    fn parse_block(&mut self, new_scope: bool) {
        if !self.eat("{") {
            self.unexpected_expected("{");
            return;
        }
        if new_scope {
            self.scopes.push(Scope::default());
        }
        self.parse_statements_until(Some("}"));
        self.expect("}");
        if new_scope {
            self.scopes.pop();
        }
    }

    fn parse_var_statement(&mut self, kind: Binding) {
        self.advance();
        self.parse_declarations(kind, false);
        self.semicolon();
    }

    /// Declarator list after `var`/`let`/`const`. Returns how many were parsed.
    fn parse_declarations(&mut self, kind: Binding, in_for_head: bool) -> usize {
        let mut count = 0;
        loop {
            let is_pattern = self.at("[") || self.at("{");
            self.parse_binding_target(kind);
            count += 1;

            if self.eat("=") {
                self.parse_assignment();
            } else if !(in_for_head && (self.at("in") || self.at("of"))) {
                let offset = self.prev_end();
                if kind == Binding::Const {
                    self.report_here(offset, "Missing initializer in const declaration.");
                } else if is_pattern {
                    self.report_here(offset, "Missing initializer in destructuring declaration.");
                }
            }

            if !self.eat(",") {
                return count;
            }
        }
    }

    fn parse_binding_identifier(&mut self, kind: Binding) {
        let tok = self.cur();
        if self.is_identifier(tok) {
            self.declare(tok, kind);
            self.advance();
        } else {
            self.unexpected();
            // a keyword in binding position is still consumed so list loops progress
            if tok.kind == TokenKind::Ident {
                self.advance();
            }
        }
    }

    fn parse_binding_target(&mut self, kind: Binding) {
        if !self.enter() {
            return;
        }
        if self.at("[") {
            self.parse_array_pattern(kind);
        } else if self.at("{") {
            self.parse_object_pattern(kind);
        } else {
            self.parse_binding_identifier(kind);
        }
        self.leave();
    }

    fn parse_binding_element(&mut self, kind: Binding) {
        self.parse_binding_target(kind);
        if self.eat("=") {
            self.parse_assignment();
        }
    }

    fn parse_array_pattern(&mut self, kind: Binding) {
        self.advance();
        loop {
            if self.at("]") || self.is_eof() {
                break;
            }
            if self.eat(",") {
                continue;
            }
            if self.eat("...") {
                self.parse_binding_target(kind);
            } else {
                self.parse_binding_element(kind);
            }
            if self.at("]") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !self.can_start_binding() {
                    break;
                }
            }
        }
        self.expect("]");
    }

    fn parse_object_pattern(&mut self, kind: Binding) {
        self.advance();
        loop {
            if self.at("}") || self.is_eof() {
                break;
            }
            if self.eat("...") {
                self.parse_binding_target(kind);
            } else {
                let key = self.parse_property_key();
                if self.eat(":") {
                    self.parse_binding_element(kind);
                } else {
                    match key {
                        Some(tok) if self.is_identifier(tok) => self.declare(tok, kind),
                        _ => self.unexpected_expected(":"),
                    }
                    if self.eat("=") {
                        self.parse_assignment();
                    }
                }
            }
            if self.at("}") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !self.can_start_property() {
                    break;
                }
            }
        }
        self.expect("}");
    }

    /// Parse an object or class property key. Returns the token when the key
    /// is a plain identifier name.
    fn parse_property_key(&mut self) -> Option<Token> {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Ident => {
                self.advance();
                Some(tok)
            }
            TokenKind::String | TokenKind::Number | TokenKind::PrivateName => {
                self.advance();
                None
            }
            TokenKind::Punct("[") => {
                self.advance();
                let no_in = std::mem::replace(&mut self.no_in, false);
                self.parse_assignment();
                self.no_in = no_in;
                self.expect("]");
                None
            }
            _ => {
                self.unexpected();
                None
            }
        }
    }

    /// `function` keyword at the cursor.
    fn parse_function(&mut self, is_async: bool, declaration: bool, name_required: bool) {
        self.advance();
        let generator = self.eat("*");
        let tok = self.cur();
        if self.is_identifier(tok) {
            if declaration {
                self.declare(tok, Binding::Function);
            }
            self.advance();
        } else if name_required {
            self.unexpected();
        }
        self.parse_function_rest(is_async, generator);
    }

    fn parse_function_rest(&mut self, is_async: bool, generator: bool) {
        self.with_function(Frame::function(is_async, generator), |p| {
            p.parse_params();
            p.parse_block(false);
        });
    }

    fn parse_params(&mut self) {
        if !self.eat("(") {
            self.unexpected_expected("(");
            return;
        }
        loop {
            if self.at(")") || self.is_eof() {
                break;
            }
            if self.eat("...") {
                self.parse_binding_target(Binding::Param);
            } else {
                self.parse_binding_element(Binding::Param);
            }
            if self.at(")") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !self.can_start_binding() {
                    break;
                }
            }
        }
        self.expect(")");
    }

    /// `class` keyword at the cursor.
    fn parse_class(&mut self, declaration: bool, name_required: bool) {
        self.advance();
        let tok = self.cur();
        if self.is_identifier(tok) {
            if declaration {
                self.declare(tok, Binding::Lexical);
            }
            self.advance();
        } else if name_required {
            self.unexpected();
        }
        if self.eat("extends") {
            self.parse_lhs();
        }
        self.parse_class_body();
    }

    fn parse_class_body(&mut self) {
        if !self.eat("{") {
            self.unexpected_expected("{");
            return;
        }
        while !self.is_eof() && !self.at("}") {
            let before = self.pos;
            self.parse_class_member();
            if self.pos == before {
                self.unexpected();
                self.advance();
            }
        }
        self.expect("}");
    }

    /// Whether the token `n` ahead ends a member name, meaning a modifier
    /// word (`static`, `get`, `async`) at the cursor is itself the name.
    fn member_name_ends(&self, n: usize) -> bool {
        let tok = self.peek(n);
        tok.kind == TokenKind::Eof
            || ["(", "=", ";", "}", ":", ","]
                .iter()
                .any(|p| self.token_is(tok, p))
    }

    fn parse_class_member(&mut self) {
        if self.eat(";") {
            return;
        }
        if self.at("static") && self.peek_is(1, "{") {
            self.advance();
            self.with_function(Frame::function(false, false), |p| p.parse_block(false));
            return;
        }
        if self.at("static") && !self.member_name_ends(1) {
            self.advance();
        }
        let (is_async, generator, accessor) = self.parse_method_modifiers();

        self.parse_property_key();
        if self.at("(") {
            self.parse_function_rest(is_async, generator);
            return;
        }
        if is_async || generator || accessor {
            self.unexpected_expected("(");
            return;
        }
        if self.eat("=") {
            self.with_function(Frame::function(false, false), |p| {
                p.parse_assignment();
            });
        }
        self.semicolon();
    }

    /// `async`, `*`, `get`/`set` before a method name.
    fn parse_method_modifiers(&mut self) -> (bool, bool, bool) {
        let mut is_async = false;
        if self.at("async") && !self.member_name_ends(1) && !self.peek(1).newline_before {
            self.advance();
            is_async = true;
        }
        let generator = self.eat("*");
        let mut accessor = false;
        if (self.at("get") || self.at("set")) && !self.member_name_ends(1) {
            self.advance();
            accessor = true;
        }
        (is_async, generator, accessor)
    }

    fn parse_paren_condition(&mut self) {
        let no_in = std::mem::replace(&mut self.no_in, false);
        if self.eat("(") {
            self.parse_expression();
            self.expect(")");
        } else {
            self.unexpected_expected("(");
            self.parse_expression();
        }
        self.no_in = no_in;
    }

    fn parse_if(&mut self) {
        self.advance();
        self.parse_paren_condition();
        self.parse_statement();
        if self.eat("else") {
            self.parse_statement();
        }
    }

    fn parse_loop_body(&mut self) {
        if let Some(frame) = self.frame_mut() {
            frame.loops += 1;
        }
        self.parse_statement();
        if let Some(frame) = self.frame_mut() {
            frame.loops -= 1;
        }
    }

    fn parse_while(&mut self) {
        self.advance();
        self.parse_paren_condition();
        self.parse_loop_body();
    }

    fn parse_do_while(&mut self) {
        self.advance();
        self.parse_loop_body();
        self.expect("while");
        self.parse_paren_condition();
        self.eat(";");
    }

    fn parse_for(&mut self) {
        self.advance();
        if self.at("await") {
            let offset = self.cur().start;
            self.check_await(offset);
            self.advance();
        }
        self.expect("(");
        self.scopes.push(Scope::default());

        let no_in = std::mem::replace(&mut self.no_in, true);
        let mut declarations = None;
        let mut init = None;
        if self.at(";") {
        } else if self.at("var") || self.at("const") || (self.at("let") && self.let_starts_declaration())
        {
            let kind = match self.text(self.cur()) {
                "var" => Binding::Var,
                "const" => Binding::Const,
                _ => Binding::Let,
            };
            self.advance();
            declarations = Some(self.parse_declarations(kind, true));
        } else {
            let start = self.cur().start;
            init = Some((self.parse_expression(), start));
        }
        self.no_in = no_in;

        if self.at("of") || self.at("in") {
            let of = self.at("of");
            let statement = if of { "for-of" } else { "for-in" };
            if declarations.is_some_and(|n| n > 1) {
                let offset = self.cur().start;
                self.report(
                    offset,
                    format!("Must have a single binding in {} statement.", statement),
                );
            }
            if let Some((expr, start)) = init {
                if !expr.assign_target() {
                    self.report(
                        start,
                        format!("Invalid left-hand side in {} statement.", statement),
                    );
                }
            }
            self.advance();
            if of {
                self.parse_assignment();
            } else {
                self.parse_expression();
            }
            self.expect(")");
        } else {
            self.expect(";");
            if !self.at(";") {
                self.parse_expression();
            }
            self.expect(";");
            if !self.at(")") {
                self.parse_expression();
            }
            self.expect(")");
        }

        self.parse_loop_body();
        self.scopes.pop();
    }

    fn parse_return(&mut self) {
        let tok = self.cur();
        self.advance();
        if !self.frame().is_some_and(|f| f.function) {
            self.report(tok.start, "'return' outside of function.");
        }
        let next = self.cur();
        if !self.at(";") && !self.at("}") && !self.is_eof() && !next.newline_before {
            self.parse_expression();
        }
        self.semicolon();
    }

    fn parse_jump(&mut self) {
        let tok = self.cur();
        let is_break = self.text(tok) == "break";
        self.advance();

        let label_tok = self.cur();
        let label = if self.is_identifier(label_tok) && !label_tok.newline_before {
            self.advance();
            Some(self.text(label_tok))
        } else {
            None
        };

        let valid = self.frame().is_some_and(|frame| match label {
            Some(name) => frame
                .labels
                .iter()
                .any(|(l, is_loop)| l == name && (is_break || *is_loop)),
            None if is_break => frame.loops > 0 || frame.switches > 0,
            None => frame.loops > 0,
        });
        if !valid {
            let message = if is_break {
                "Unsyntactic break."
            } else {
                "Unsyntactic continue."
            };
            self.report(tok.start, message);
        }
        self.semicolon();
    }

    fn parse_throw(&mut self) {
        self.advance();
        if self.cur().newline_before {
            let offset = self.prev_end();
            self.report(offset, "Illegal newline after throw.");
        }
        self.parse_expression();
        self.semicolon();
    }

    fn parse_try(&mut self) {
        let tok = self.cur();
        self.advance();
        self.parse_block(true);

        let mut handled = false;
        if self.eat("catch") {
            handled = true;
            self.scopes.push(Scope::default());
            if self.eat("(") {
                self.parse_binding_target(Binding::Param);
                self.expect(")");
            }
            self.parse_block(false);
            self.scopes.pop();
        }
        if self.eat("finally") {
            handled = true;
            self.parse_block(true);
        }
        if !handled {
            self.report(tok.start, "Missing catch or finally clause.");
        }
    }

    fn parse_switch(&mut self) {
        self.advance();
        self.parse_paren_condition();
        if !self.eat("{") {
            self.unexpected_expected("{");
            return;
        }
        self.scopes.push(Scope::default());
        if let Some(frame) = self.frame_mut() {
            frame.switches += 1;
        }

        while !self.is_eof() && !self.at("}") {
            if self.eat("case") {
                self.parse_expression();
                self.expect(":");
            } else if self.eat("default") {
                self.expect(":");
            } else {
                self.unexpected();
            }
            while !self.is_eof() && !self.at("case") && !self.at("default") && !self.at("}") {
                let before = self.pos;
                self.parse_statement();
                if self.pos == before {
                    self.unexpected();
                    self.advance();
                }
            }
        }
        self.expect("}");

        if let Some(frame) = self.frame_mut() {
            frame.switches -= 1;
        }
        self.scopes.pop();
    }

    fn parse_labeled(&mut self) {
        let name = self.text(self.cur()).to_string();
        self.advance();
        self.advance();
        let is_loop = self.at("for") || self.at("while") || self.at("do");
        if let Some(frame) = self.frame_mut() {
            frame.labels.push((name, is_loop));
        }
        self.parse_statement();
        if let Some(frame) = self.frame_mut() {
            frame.labels.pop();
        }
    }

    fn parse_module_specifiers(&mut self, declare: bool) {
        // `{` already consumed
        loop {
            if self.at("}") || self.is_eof() {
                break;
            }
            let name = self.cur();
            if matches!(name.kind, TokenKind::Ident | TokenKind::String) {
                self.advance();
            } else {
                self.unexpected();
                break;
            }
            if self.eat("as") {
                if declare {
                    self.parse_binding_identifier(Binding::Lexical);
                } else if matches!(self.cur().kind, TokenKind::Ident | TokenKind::String) {
                    self.advance();
                } else {
                    self.unexpected();
                }
            } else if declare {
                if self.is_identifier(name) {
                    self.declare(name, Binding::Lexical);
                } else {
                    self.unexpected_expected("as");
                }
            }
            if self.at("}") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !matches!(self.cur().kind, TokenKind::Ident | TokenKind::String) {
                    break;
                }
            }
        }
        self.expect("}");
    }

    fn parse_module_source(&mut self) {
        if self.cur().kind == TokenKind::String {
            self.advance();
        } else {
            self.unexpected();
        }
        // import attributes: `with { type: "json" }`
        if (self.at("with") || self.at("assert")) && self.peek_is(1, "{") {
            self.advance();
            self.parse_object_literal();
        }
    }

    fn parse_import(&mut self) {
        let tok = self.cur();
        self.advance();
        self.check_module_level(tok.start);

        if self.cur().kind == TokenKind::String {
            self.parse_module_source();
            self.semicolon();
            return;
        }

        let mut needs_more = true;
        if self.cur().kind == TokenKind::Ident && !self.at("from") {
            self.parse_binding_identifier(Binding::Lexical);
            needs_more = self.eat(",");
        }
        if needs_more {
            if self.eat("*") {
                self.expect("as");
                self.parse_binding_identifier(Binding::Lexical);
            } else if self.eat("{") {
                self.parse_module_specifiers(true);
            } else {
                self.unexpected();
            }
        }
        self.expect("from");
        self.parse_module_source();
        self.semicolon();
    }

    fn parse_export(&mut self) {
        let tok = self.cur();
        self.advance();
        self.check_module_level(tok.start);

        if self.eat("default") {
            if self.at("function") {
                self.parse_function(false, true, false);
            } else if self.at("async") && self.peek_is(1, "function") {
                self.advance();
                self.parse_function(true, true, false);
            } else if self.at("class") {
                self.parse_class(true, false);
            } else {
                self.parse_assignment();
                self.semicolon();
            }
            return;
        }

        if self.at("var") {
            self.parse_var_statement(Binding::Var);
        } else if self.at("let") {
            self.parse_var_statement(Binding::Let);
        } else if self.at("const") {
            self.parse_var_statement(Binding::Const);
        } else if self.at("function") {
            self.parse_function(false, true, true);
        } else if self.at("async") && self.peek_is(1, "function") {
            self.advance();
            self.parse_function(true, true, true);
        } else if self.at("class") {
            self.parse_class(true, true);
        } else if self.eat("*") {
            if self.eat("as") {
                if matches!(self.cur().kind, TokenKind::Ident | TokenKind::String) {
                    self.advance();
                } else {
                    self.unexpected();
                }
            }
            self.expect("from");
            self.parse_module_source();
            self.semicolon();
        } else if self.eat("{") {
            self.parse_module_specifiers(false);
            if self.eat("from") {
                self.parse_module_source();
            }
            self.semicolon();
        } else {
            self.unexpected();
        }
    }

    // ------------------------------------------------------------------
    // expressions
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Expr {
        let first = self.parse_assignment();
        if !self.at(",") {
            return first;
        }
        while self.eat(",") {
            self.parse_assignment();
        }
        Expr::Other
    }

    fn parse_assignment(&mut self) -> Expr {
        if !self.enter() {
            return Expr::Error;
        }
        let expr = self.parse_assignment_inner();
        self.leave();
        expr
    }

    fn parse_assignment_inner(&mut self) -> Expr {
        if self.at("yield") && self.frame().is_some_and(|f| f.generator) {
            self.advance();
            if !self.cur().newline_before {
                self.eat("*");
                if self.can_start_expression() {
                    self.parse_assignment();
                }
            }
            return Expr::Other;
        }

        let start = self.cur().start;
        let left = self.parse_conditional();
        let op = match self.cur().kind {
            TokenKind::Punct(p) if ASSIGN_OPS.contains(&p) => p,
            _ => return left,
        };

        let valid = if op == "=" {
            left.assign_target()
        } else {
            left.simple_target()
        };
        if !valid {
            self.report(start, "Invalid left-hand side in assignment expression.");
        }
        self.advance();
        self.parse_assignment();
        Expr::Other
    }

    fn parse_conditional(&mut self) -> Expr {
        let test = self.parse_binary(1);
        if !self.eat("?") {
            return test;
        }
        let no_in = std::mem::replace(&mut self.no_in, false);
        self.parse_assignment();
        self.no_in = no_in;
        self.expect(":");
        self.parse_assignment();
        Expr::Other
    }

    fn binary_precedence(&self) -> Option<u8> {
        let tok = self.cur();
        let prec = match tok.kind {
            TokenKind::Punct(p) => match p {
                "??" | "||" => 1,
                "&&" => 2,
                "|" => 3,
                "^" => 4,
                "&" => 5,
                "==" | "!=" | "===" | "!==" => 6,
                "<" | ">" | "<=" | ">=" => 7,
                "<<" | ">>" | ">>>" => 8,
                "+" | "-" => 9,
                "*" | "/" | "%" => 10,
                "**" => 11,
                _ => return None,
            },
            TokenKind::Ident => match self.text(tok) {
                "instanceof" => 7,
                "in" if !self.no_in => 7,
                _ => return None,
            },
            _ => return None,
        };
        Some(prec)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Expr {
        let mut left = self.parse_unary();
        while let Some(prec) = self.binary_precedence() {
            if prec < min_prec {
                break;
            }
            let right_assoc = self.at("**");
            self.advance();
            // `**` chains recurse once per operand
            if !self.enter() {
                return Expr::Error;
            }
            self.parse_binary(if right_assoc { prec } else { prec + 1 });
            self.leave();
            left = Expr::Other;
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        if !self.enter() {
            return Expr::Error;
        }
        let tok = self.cur();
        let expr = match tok.kind {
            TokenKind::Punct("!" | "~" | "+" | "-") => {
                self.advance();
                self.parse_unary();
                Expr::Other
            }
            TokenKind::Punct("++" | "--") => {
                self.advance();
                let start = self.cur().start;
                if !self.parse_unary().simple_target() {
                    self.report(start, "Invalid left-hand side in prefix operation.");
                }
                Expr::Other
            }
            TokenKind::Ident if matches!(self.text(tok), "typeof" | "void" | "delete") => {
                self.advance();
                self.parse_unary();
                Expr::Other
            }
            TokenKind::Ident if self.text(tok) == "await" => {
                self.check_await(tok.start);
                self.advance();
                self.parse_unary();
                Expr::Other
            }
            _ => self.parse_postfix(),
        };
        self.leave();
        expr
    }

    fn parse_postfix(&mut self) -> Expr {
        let start = self.cur().start;
        let expr = self.parse_lhs();
        if (self.at("++") || self.at("--")) && !self.cur().newline_before {
            if !expr.simple_target() {
                self.report(start, "Invalid left-hand side in postfix operation.");
            }
            self.advance();
            return Expr::Other;
        }
        expr
    }

    fn parse_lhs(&mut self) -> Expr {
        let expr = if self.at("new") {
            self.parse_new()
        } else {
            self.parse_primary()
        };
        self.parse_call_tail(expr, true)
    }

    fn parse_new(&mut self) -> Expr {
        if !self.enter() {
            return Expr::Error;
        }
        self.advance();
        if self.eat(".") {
            // new.target
            self.parse_member_name();
        } else {
            let callee = if self.at("new") {
                self.parse_new()
            } else {
                self.parse_primary()
            };
            self.parse_call_tail(callee, false);
            if self.at("(") {
                self.parse_arguments();
            }
        }
        self.leave();
        Expr::Other
    }

    fn parse_member_name(&mut self) {
        match self.cur().kind {
            TokenKind::Ident | TokenKind::PrivateName => self.advance(),
            _ => self.unexpected(),
        }
    }

    fn parse_call_tail(&mut self, mut expr: Expr, allow_call: bool) -> Expr {
        loop {
            match self.cur().kind {
                TokenKind::Punct(".") => {
                    self.advance();
                    self.parse_member_name();
                    expr = Expr::Member;
                }
                TokenKind::Punct("?.") if allow_call => {
                    self.advance();
                    if self.at("(") {
                        self.parse_arguments();
                    } else if self.eat("[") {
                        self.parse_bracketed_expression();
                    } else {
                        self.parse_member_name();
                    }
                    // optional chains are never assignable
                    expr = Expr::Other;
                }
                TokenKind::Punct("[") => {
                    self.advance();
                    self.parse_bracketed_expression();
                    expr = Expr::Member;
                }
                TokenKind::Punct("(") if allow_call => {
                    self.parse_arguments();
                    expr = Expr::Call;
                }
                TokenKind::Template {
                    continuation: false,
                    ..
                } => {
                    self.parse_template();
                    expr = Expr::Other;
                }
                _ => return expr,
            }
        }
    }

    /// Expression after an already consumed `[`, through the closing `]`.
    fn parse_bracketed_expression(&mut self) {
        let no_in = std::mem::replace(&mut self.no_in, false);
        self.parse_expression();
        self.no_in = no_in;
        self.expect("]");
    }

    fn parse_arguments(&mut self) {
        self.advance();
        let no_in = std::mem::replace(&mut self.no_in, false);
        loop {
            if self.at(")") || self.is_eof() {
                break;
            }
            self.eat("...");
            self.parse_assignment();
            if self.at(")") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !self.can_start_expression() {
                    break;
                }
            }
        }
        self.expect(")");
        self.no_in = no_in;
    }

    fn parse_primary(&mut self) -> Expr {
        if !self.enter() {
            return Expr::Error;
        }
        let expr = self.parse_primary_inner();
        self.leave();
        expr
    }

    fn parse_primary_inner(&mut self) -> Expr {
        let tok = self.cur();
        match tok.kind {
            TokenKind::Number | TokenKind::String | TokenKind::Regex | TokenKind::PrivateName => {
                self.advance();
                Expr::Other
            }
            TokenKind::Template {
                continuation: false,
                ..
            } => {
                self.parse_template();
                Expr::Other
            }
            TokenKind::Punct("(") => self.parse_paren(),
            TokenKind::Punct("[") => self.parse_array_literal(),
            TokenKind::Punct("{") => self.parse_object_literal(),
            TokenKind::Ident => self.parse_word(tok),
            _ => {
                self.unexpected();
                if !self.is_closer(tok) {
                    self.advance();
                }
                Expr::Error
            }
        }
    }

    fn parse_word(&mut self, tok: Token) -> Expr {
        let next = self.peek(1);
        match self.text(tok) {
            "function" => {
                self.parse_function(false, false, false);
                Expr::Other
            }
            "async" if self.token_is(next, "function") && !next.newline_before => {
                self.advance();
                self.parse_function(true, false, false);
                Expr::Other
            }
            "async"
                if self.is_identifier(next) && !next.newline_before && self.peek_is(2, "=>") =>
            {
                self.advance();
                self.advance();
                self.parse_arrow_body(true);
                Expr::Other
            }
            "async" if self.token_is(next, "(") && !next.newline_before => {
                self.advance();
                self.parse_arguments();
                if self.at("=>") && !self.cur().newline_before {
                    self.parse_arrow_body(true);
                    Expr::Other
                } else {
                    Expr::Call
                }
            }
            "class" => {
                self.parse_class(false, false);
                Expr::Other
            }
            "this" | "null" | "true" | "false" | "super" => {
                self.advance();
                Expr::Other
            }
            "import" => {
                self.advance();
                if self.eat(".") {
                    self.parse_member_name();
                } else if self.at("(") {
                    self.parse_arguments();
                } else {
                    self.unexpected();
                }
                Expr::Other
            }
            word if RESERVED.contains(&word) => {
                self.unexpected();
                if !self.is_closer(tok) {
                    self.advance();
                }
                Expr::Error
            }
            _ => {
                self.advance();
                if self.at("=>") && !self.cur().newline_before {
                    self.parse_arrow_body(false);
                    Expr::Other
                } else {
                    Expr::Ident
                }
            }
        }
    }

    /// `=>` at the cursor; parameters were already parsed as an expression.
    fn parse_arrow_body(&mut self, is_async: bool) {
        self.advance();
        self.with_function(Frame::function(is_async, false), |p| {
            if p.at("{") {
                p.parse_block(false);
            } else {
                p.parse_assignment();
            }
        });
    }

    fn parse_paren(&mut self) -> Expr {
        self.advance();
        let no_in = std::mem::replace(&mut self.no_in, false);
        let mut items = 0;
        let mut single = Expr::Other;
        let mut spread = false;
        loop {
            if self.at(")") || self.is_eof() {
                break;
            }
            if self.eat("...") {
                self.parse_assignment();
                spread = true;
            } else {
                single = self.parse_assignment();
            }
            items += 1;
            if self.at(")") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !self.can_start_expression() {
                    break;
                }
            }
        }
        let close = self.cur();
        self.expect(")");
        self.no_in = no_in;

        if self.at("=>") && !self.cur().newline_before {
            self.parse_arrow_body(false);
            return Expr::Other;
        }
        if items == 0 {
            // `()` is only valid as an arrow parameter list
            self.report(close.start, "Unexpected token");
            return Expr::Error;
        }
        match single {
            Expr::Ident | Expr::Member if items == 1 && !spread => single,
            _ => Expr::Other,
        }
    }

    fn parse_array_literal(&mut self) -> Expr {
        self.advance();
        let no_in = std::mem::replace(&mut self.no_in, false);
        loop {
            if self.at("]") || self.is_eof() {
                break;
            }
            if self.eat(",") {
                continue;
            }
            self.eat("...");
            self.parse_assignment();
            if self.at("]") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !self.can_start_expression() {
                    break;
                }
            }
        }
        self.expect("]");
        self.no_in = no_in;
        Expr::Pattern
    }

    /// Whether the token `n` ahead ends a property name in an object literal.
    fn property_name_ends(&self, n: usize) -> bool {
        let tok = self.peek(n);
        tok.kind == TokenKind::Eof
            || ["(", ":", ",", "}", "="]
                .iter()
                .any(|p| self.token_is(tok, p))
    }

    fn parse_object_literal(&mut self) -> Expr {
        self.advance();
        let no_in = std::mem::replace(&mut self.no_in, false);
        loop {
            if self.at("}") || self.is_eof() {
                break;
            }
            self.parse_object_member();
            if self.at("}") {
                break;
            }
            if !self.eat(",") {
                self.unexpected_expected(",");
                if !self.can_start_property() {
                    break;
                }
            }
        }
        self.expect("}");
        self.no_in = no_in;
        Expr::Pattern
    }

    fn parse_object_member(&mut self) {
        if self.eat("...") {
            self.parse_assignment();
            return;
        }

        let mut is_async = false;
        if self.at("async") && !self.property_name_ends(1) && !self.peek(1).newline_before {
            self.advance();
            is_async = true;
        }
        let generator = self.eat("*");
        let mut accessor = false;
        if (self.at("get") || self.at("set")) && !self.property_name_ends(1) {
            self.advance();
            accessor = true;
        }

        let key = self.parse_property_key();
        if self.at("(") {
            self.parse_function_rest(is_async, generator);
            return;
        }
        if is_async || generator || accessor {
            self.unexpected_expected("(");
            return;
        }
        if self.eat(":") {
            self.parse_assignment();
            return;
        }
        match key {
            Some(tok) if self.is_identifier(tok) => {
                // shorthand, with a default only valid once reinterpreted as a pattern
                if self.eat("=") {
                    self.parse_assignment();
                }
            }
            Some(_) => self.unexpected_expected(":"),
            None => {}
        }
    }

    /// A template literal starting at the cursor, through its tail chunk.
    fn parse_template(&mut self) {
        let head = self.cur();
        self.advance();
        if matches!(head.kind, TokenKind::Template { tail: true, .. }) {
            return;
        }
        loop {
            self.parse_expression();
            match self.cur().kind {
                TokenKind::Template {
                    continuation: true,
                    tail,
                } => {
                    self.advance();
                    if tail {
                        return;
                    }
                }
                _ => {
                    self.unexpected();
                    while !self.is_eof()
                        && !matches!(
                            self.cur().kind,
                            TokenKind::Template {
                                continuation: true,
                                ..
                            }
                        )
                    {
                        self.advance();
                    }
                    if self.is_eof() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(src: &str) -> Vec<String> {
        parse_module(src)
            .unwrap()
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    fn offsets(src: &str) -> Vec<usize> {
        parse_module(src)
            .unwrap()
            .into_iter()
            .map(|d| d.offset)
            .collect()
    }

    const HARDHAT_TEST: &str = r#"
const { expect } = require("chai");
const { ethers } = require("hardhat");
const { loadFixture } = require("@nomicfoundation/hardhat-network-helpers");

describe("MyContract", function () {
  async function deployFixture() {
    const [owner, addr1, ...rest] = await ethers.getSigners();
    const MyContract = await ethers.getContractFactory("MyContract");
    const contract = await MyContract.deploy();
    await contract.waitForDeployment?.();
    return { contract, owner, addr1, rest };
  }

  it("should set the right owner", async function () {
    const { contract, owner } = await loadFixture(deployFixture);
    expect(await contract.owner()).to.equal(owner.address);
  });

  it("reverts for non-owners", async () => {
    const { contract, addr1 } = await loadFixture(deployFixture);
    await expect(contract.connect(addr1).withdraw()).to.be.revertedWith("Not owner");
    const values = [1, 2, 3].map((v) => v * 2).filter(v => v > 2);
    let total = 0n;
    for (let i = 0; i < values.length; i++) { total += BigInt(values[i]); }
    for (const v of values) { console.log(`value ${v} at ${Date.now()}`); }
    const re = /ab+c/i;
    let x = owner ? addr1 : rest ?? null;
    outer: while (true) { break outer; }
    switch (values.length) { case 1: break; default: x = null; }
    try { await contract.fail(); } catch ({ message }) { expect(message).to.include("revert"); }
  });
});

class Helper extends Object {
  static #count = 0;
  value = 1;
  get count() { return Helper.#count; }
  async *items() { yield* [this.value]; }
  static { Helper.#count++; }
}

export default Helper;
export { Helper as H };
"#;

    #[test]
    fn test_typical_test_file_is_clean() {
        assert_eq!(messages(HARDHAT_TEST), Vec::<String>::new());
    }

    #[test]
    fn test_imports_and_exports() {
        let src = r#"
import fs from "fs";
import * as path from "path";
import { a, b as c } from "./m.js";
import "./side-effect.js";
export const answer = 42;
export * from "./other.js";
export async function run() { await import("./lazy.js"); }
"#;
        assert_eq!(messages(src), Vec::<String>::new());
    }

    #[test]
    fn test_asi_accepts_newlines() {
        assert_eq!(messages("let a = 1\nlet b = a\nb++\n"), Vec::<String>::new());
    }

    #[test]
    fn test_missing_semicolon() {
        assert_eq!(messages("let x = 1 2;"), vec!["Missing semicolon."]);
        assert_eq!(offsets("let x = 1 2;"), vec![9]);
    }

    #[test]
    fn test_missing_comma_in_arguments() {
        assert_eq!(
            messages("foo(a b);"),
            vec!["Unexpected token, expected \",\""]
        );
    }

    #[test]
    fn test_missing_paren_recovers_into_body() {
        assert_eq!(
            messages("if (x { y(); }\nz();"),
            vec!["Unexpected token, expected \")\""]
        );
    }

    #[test]
    fn test_collects_multiple_errors() {
        let src = "let x = 1 2;\nfoo(a b);\n1 = 2;\n";
        assert_eq!(
            messages(src),
            vec![
                "Missing semicolon.",
                "Unexpected token, expected \",\"",
                "Invalid left-hand side in assignment expression.",
            ]
        );
    }

    #[test]
    fn test_context_errors() {
        assert_eq!(messages("return 1;"), vec!["'return' outside of function."]);
        assert_eq!(messages("break;"), vec!["Unsyntactic break."]);
        assert_eq!(
            messages("while (a) { continue missing; }"),
            vec!["Unsyntactic continue."]
        );
        assert_eq!(
            messages("function f() { await g(); }"),
            vec!["'await' is only allowed within async functions and at the top levels of modules."]
        );
        assert_eq!(messages("await g();"), Vec::<String>::new());
        assert_eq!(
            messages("async function f() { [1].map(x => await x); }"),
            vec!["'await' is only allowed within async functions and at the top levels of modules."]
        );
    }

    #[test]
    fn test_redeclaration() {
        assert_eq!(
            messages("let a = 1;\nlet a = 2;"),
            vec!["Identifier 'a' has already been declared."]
        );
        assert_eq!(messages("var a; var a;"), Vec::<String>::new());
        assert_eq!(messages("let a; { let a; }"), Vec::<String>::new());
        assert_eq!(
            messages("function f(a) { let a; }"),
            vec!["Identifier 'a' has already been declared."]
        );
    }

    #[test]
    fn test_const_without_initializer() {
        assert_eq!(
            messages("const a;"),
            vec!["Missing initializer in const declaration."]
        );
        assert_eq!(messages("for (const a of b) {}"), Vec::<String>::new());
    }

    #[test]
    fn test_invalid_update_targets() {
        assert_eq!(
            messages("f()++;"),
            vec!["Invalid left-hand side in postfix operation."]
        );
        assert_eq!(
            messages("++1;"),
            vec!["Invalid left-hand side in prefix operation."]
        );
        assert_eq!(
            messages("for (f() of xs) {}"),
            vec!["Invalid left-hand side in for-of statement."]
        );
    }

    #[test]
    fn test_unbalanced_closers() {
        let msgs = messages("foo();\n}\nbar();");
        assert_eq!(msgs, vec!["Unexpected token"]);
        let msgs = messages("describe('x', function () {\n  it('y', () => {});\n");
        assert!(!msgs.is_empty());
        assert!(msgs.iter().all(|m| m.starts_with("Unexpected token")));
    }

    #[test]
    fn test_keyword_in_expression() {
        assert_eq!(
            messages("let a = \nif (b) {}"),
            vec!["Unexpected keyword 'if'."]
        );
    }

    #[test]
    fn test_try_without_handler() {
        assert_eq!(
            messages("try { a(); }\nb();"),
            vec!["Missing catch or finally clause."]
        );
    }

    #[test]
    fn test_regex_after_statement_heads_and_blocks() {
        assert!(messages("if (x) /re/.test(y);").is_empty());
        assert!(messages("while (x) /re/.test(y);").is_empty());
        assert!(messages("for (;;) /a/.exec(b);").is_empty());
        assert!(messages("function f(){}\n/re/.test(x);").is_empty());
        assert!(messages("{}\n/re/.test(x);").is_empty());
    }

    #[test]
    fn test_long_exponent_chain_is_fatal() {
        let src = format!("x = a{};", " ** a".repeat(200_000));
        assert!(matches!(
            parse_module(&src),
            Err(SyntaxFault::TooDeep { limit: MAX_DEPTH, .. })
        ));
    }

    #[test]
    fn test_short_exponent_chain_is_clean() {
        assert!(messages("x = 2 ** 3 ** 2 + a * b ** -c;").is_empty());
    }

    #[test]
    fn test_deep_nesting_is_fatal() {
        let src = format!("{}1{}", "(".repeat(400), ")".repeat(400));
        assert!(matches!(
            parse_module(&src),
            Err(SyntaxFault::TooDeep { limit: MAX_DEPTH, .. })
        ));
    }

    #[test]
    fn test_lexer_failure_is_fatal() {
        let err = parse_module("let s = 'open\n").unwrap_err();
        assert_eq!(err.to_string(), "Unterminated string constant.");
        assert_eq!(err.offset(), 8);
    }

    #[test]
    fn test_template_substitution_errors_recover() {
        let msgs = messages("const s = `a ${b c} d`;\nok();");
        assert_eq!(msgs, vec!["Unexpected token"]);
    }
}
