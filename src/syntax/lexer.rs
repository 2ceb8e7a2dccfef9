//! JavaScript tokenizer.
//!
//! Produces the whole token stream up front. Problems the parser can work
//! around (stray characters, identifiers glued to numbers) become
//! [`Diagnostic`]s; problems that leave the rest of the input untokenizable
//! (an unterminated string, template, comment or regular expression) abort
//! with a [`LexError`].

use thiserror::Error;

use super::{Diagnostic, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifiers and keywords alike; the parser looks at the text.
    Ident,
    /// `#name` inside class bodies.
    PrivateName,
    Number,
    String,
    Regex,
    /// One chunk of a template literal. `continuation` chunks start at the `}`
    /// closing a substitution; `tail` chunks end at the closing backtick.
    Template { continuation: bool, tail: bool },
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// A line terminator sits between this token and the previous one.
    pub newline_before: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unterminated string constant.")]
    UnterminatedString { offset: usize },
    #[error("Unterminated template.")]
    UnterminatedTemplate { offset: usize },
    #[error("Unterminated comment.")]
    UnterminatedComment { offset: usize },
    #[error("Unterminated regular expression.")]
    UnterminatedRegExp { offset: usize },
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            LexError::UnterminatedString { offset }
            | LexError::UnterminatedTemplate { offset }
            | LexError::UnterminatedComment { offset }
            | LexError::UnterminatedRegExp { offset } => *offset,
        }
    }
}

/// Longest punctuators first so the first prefix match is the right one.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@",
];

/// Keywords after which a `/` starts a regular expression rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
    "extends",
];

pub fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub fn is_id_start(c: char) -> bool {
    c.is_alphabetic() || c == '$' || c == '_'
}

pub fn is_id_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '$' || c == '_' || c == '\u{200c}' || c == '\u{200d}'
}

/// Byte offsets of line starts, for turning offsets into line/column pairs.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        let mut chars = source.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            match c {
                '\r' if matches!(chars.peek(), Some((_, '\n'))) => {}
                c if is_line_terminator(c) => starts.push(i + c.len_utf8()),
                _ => {}
            }
        }
        Self { starts }
    }

    /// 1-based line, 0-based column counted in characters.
    pub fn locate(&self, source: &str, offset: usize) -> Location {
        let offset = offset.min(source.len());
        let line = self.starts.partition_point(|start| *start <= offset);
        let line_start = self.starts[line - 1];
        let column = source
            .get(line_start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        Location { line, column }
    }
}

/// What an open `(` or `{` belongs to. Decides whether a `/` after the
/// matching close starts a regular expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    /// Head of `if`, `while`, `for`, `with`, `switch` or `catch`.
    StatementHead,
    /// Parameter list of a function declaration.
    DeclarationParams,
    /// Block statement, statement body or declaration body.
    Block,
    Other,
}

impl Opener {
    fn starts_statement(self) -> bool {
        matches!(self, Opener::StatementHead | Opener::Block)
    }
}

pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn tokenize(source: &str) -> Result<Lexed, LexError> {
    let mut lexer = Lexer::new(source);
    lexer.run()?;
    Ok(Lexed {
        tokens: lexer.tokens,
        diagnostics: lexer.diagnostics,
    })
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    /// Open-brace counts for each template substitution we are inside of.
    templates: Vec<usize>,
    newline_before: bool,
    openers: Vec<Opener>,
    last_closed: Opener,
    /// Set by `function` until its parameter list opens; true for declarations.
    pending_function: Option<bool>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
            templates: Vec::new(),
            newline_before: false,
            openers: Vec::new(),
            last_closed: Opener::Other,
            pending_function: None,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            start,
            end: self.pos,
            newline_before: self.newline_before,
        });
        self.newline_before = false;
    }

    fn run(&mut self) -> Result<(), LexError> {
        if self.src.starts_with("#!") {
            self.skip_line();
        }

        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(c) = self.peek() else {
                self.push(TokenKind::Eof, start);
                return Ok(());
            };

            match c {
                '"' | '\'' => self.read_string(c)?,
                '`' => {
                    self.bump();
                    self.read_template(start, false)?;
                }
                '}' if self.templates.last() == Some(&0) => {
                    self.templates.pop();
                    self.bump();
                    self.read_template(start, true)?;
                }
                '0'..='9' => self.read_number(),
                '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
                '#' if self.peek_nth(1).is_some_and(is_id_start) => {
                    self.bump();
                    self.read_word();
                    self.push(TokenKind::PrivateName, start);
                }
                c if is_id_start(c) || (c == '\\' && self.peek_nth(1) == Some('u')) => {
                    self.read_word();
                    if &self.src[start..self.pos] == "function" && !self.after_dot() {
                        self.pending_function = Some(self.function_is_declaration());
                    }
                    self.push(TokenKind::Ident, start);
                }
                '/' if self.regex_allowed() => self.read_regex()?,
                _ => self.read_punct(c),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.peek() {
            if is_line_terminator(c) {
                break;
            }
            self.bump();
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            if is_line_terminator(c) {
                self.newline_before = true;
                self.bump();
            } else if c.is_whitespace() || c == '\u{feff}' {
                self.bump();
            } else if self.src[self.pos..].starts_with("//") {
                self.skip_line();
            } else if self.src[self.pos..].starts_with("/*") {
                let start = self.pos;
                let Some(end) = self.src[self.pos + 2..].find("*/") else {
                    return Err(LexError::UnterminatedComment { offset: start });
                };
                let body = &self.src[self.pos + 2..self.pos + 2 + end];
                if body.chars().any(is_line_terminator) {
                    self.newline_before = true;
                }
                self.pos += 2 + end + 2;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn after_dot(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|t| matches!(t.kind, TokenKind::Punct("." | "?.")))
    }

    /// Text of the identifier `back` tokens from the end, unless it is a
    /// property name.
    fn word_at(&self, back: usize) -> Option<&'a str> {
        let idx = self.tokens.len().checked_sub(back + 1)?;
        let tok = self.tokens[idx];
        if tok.kind != TokenKind::Ident {
            return None;
        }
        let member = idx
            .checked_sub(1)
            .is_some_and(|i| matches!(self.tokens[i].kind, TokenKind::Punct("." | "?.")));
        let src = self.src;
        (!member).then(|| &src[tok.start..tok.end])
    }

    /// Whether a token placed after all but the last `back` tokens begins a
    /// statement. `newline` is that token's line-break flag, for ASI.
    fn starts_statement(&self, back: usize, newline: bool) -> bool {
        let Some(idx) = self.tokens.len().checked_sub(back + 1) else {
            return true;
        };
        match self.tokens[idx].kind {
            TokenKind::Punct(";") => true,
            TokenKind::Punct("{") => self.openers.last() == Some(&Opener::Block),
            TokenKind::Punct(")" | "}") => self.last_closed.starts_statement() || newline,
            TokenKind::Punct(_) | TokenKind::Template { tail: false, .. } => false,
            TokenKind::Ident => {
                matches!(
                    self.word_at(back),
                    Some("else" | "do" | "export" | "default")
                ) || newline
            }
            _ => newline,
        }
    }

    fn function_is_declaration(&self) -> bool {
        if self.word_at(0) == Some("async") {
            let newline = self.tokens.last().is_some_and(|t| t.newline_before);
            self.starts_statement(1, newline)
        } else {
            self.starts_statement(0, self.newline_before)
        }
    }

    fn paren_opener(&mut self) -> Opener {
        let declaration = self.pending_function.take();
        let head = matches!(
            self.word_at(0),
            Some("if" | "while" | "for" | "with" | "switch" | "catch")
        ) || (self.word_at(0) == Some("await") && self.word_at(1) == Some("for"));
        if head {
            Opener::StatementHead
        } else if declaration == Some(true) {
            Opener::DeclarationParams
        } else {
            Opener::Other
        }
    }

    fn brace_opener(&self) -> Opener {
        let block = match self.tokens.last().map(|t| t.kind) {
            Some(TokenKind::Punct(")")) => matches!(
                self.last_closed,
                Opener::StatementHead | Opener::DeclarationParams
            ),
            Some(TokenKind::Ident) => {
                matches!(
                    self.word_at(0),
                    Some("else" | "do" | "try" | "finally" | "catch")
                ) || self.starts_statement(0, self.newline_before)
            }
            _ => self.starts_statement(0, self.newline_before),
        };
        if block {
            Opener::Block
        } else {
            Opener::Other
        }
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        match prev.kind {
            TokenKind::Punct(")" | "}") => self.last_closed.starts_statement(),
            TokenKind::Punct(p) => p != "]",
            TokenKind::Ident => REGEX_PREFIX_KEYWORDS.contains(&&self.src[prev.start..prev.end]),
            TokenKind::Template { tail, .. } => !tail,
            _ => false,
        }
    }

    fn read_word(&mut self) {
        while let Some(c) = self.peek() {
            if is_id_continue(c) {
                self.bump();
            } else if c == '\\' && self.peek_nth(1) == Some('u') {
                // \uXXXX or \u{...} escape inside an identifier
                self.bump();
                self.bump();
                if self.peek() == Some('{') {
                    while let Some(c) = self.bump() {
                        if c == '}' {
                            break;
                        }
                    }
                } else {
                    for _ in 0..4 {
                        if self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                            self.bump();
                        }
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.pos;
        self.bump();
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedString { offset: start }),
                Some(c) if c == quote => break,
                Some('\\') => {
                    // escapes may also continue the string onto the next line
                    if self.bump().is_none() {
                        return Err(LexError::UnterminatedString { offset: start });
                    }
                }
                Some('\n') | Some('\r') => {
                    return Err(LexError::UnterminatedString { offset: start })
                }
                Some(_) => {}
            }
        }
        self.push(TokenKind::String, start);
        Ok(())
    }

    /// Scan a template chunk whose opening delimiter (backtick or `}`) is
    /// already consumed.
    fn read_template(&mut self, start: usize, continuation: bool) -> Result<(), LexError> {
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedTemplate { offset: start }),
                Some('`') => {
                    self.push(
                        TokenKind::Template {
                            continuation,
                            tail: true,
                        },
                        start,
                    );
                    return Ok(());
                }
                Some('\\') => {
                    if self.bump().is_none() {
                        return Err(LexError::UnterminatedTemplate { offset: start });
                    }
                }
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    self.templates.push(0);
                    self.push(
                        TokenKind::Template {
                            continuation,
                            tail: false,
                        },
                        start,
                    );
                    return Ok(());
                }
                Some(_) => {}
            }
        }
    }

    fn read_number(&mut self) {
        let start = self.pos;
        let radix_prefix = self.src[self.pos..]
            .get(..2)
            .map(|p| p.to_ascii_lowercase())
            .filter(|p| matches!(p.as_str(), "0x" | "0o" | "0b"));

        if radix_prefix.is_some() {
            self.pos += 2;
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_hexdigit() || c == '_')
            {
                self.bump();
            }
        } else {
            self.eat_digits();
            if self.peek() == Some('.') {
                self.bump();
                self.eat_digits();
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let sign = matches!(self.peek_nth(1), Some('+' | '-'));
                let digit_at = if sign { 2 } else { 1 };
                if self.peek_nth(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                    if sign {
                        self.bump();
                    }
                    self.eat_digits();
                }
            }
        }
        if self.peek() == Some('n') {
            self.bump();
        }
        self.push(TokenKind::Number, start);

        if self.peek().is_some_and(is_id_start) {
            self.diagnostics.push(Diagnostic {
                offset: self.pos,
                message: "Identifier directly after number.".to_string(),
            });
        }
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn read_regex(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                None => return Err(LexError::UnterminatedRegExp { offset: start }),
                Some(c) if is_line_terminator(c) => {
                    return Err(LexError::UnterminatedRegExp { offset: start })
                }
                Some('\\') => match self.bump() {
                    Some(c) if !is_line_terminator(c) => {}
                    _ => return Err(LexError::UnterminatedRegExp { offset: start }),
                },
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(is_id_continue) {
            self.bump();
        }
        self.push(TokenKind::Regex, start);
        Ok(())
    }

    fn read_punct(&mut self, c: char) {
        let start = self.pos;
        let rest = &self.src[self.pos..];
        let punct = PUNCTUATORS
            .iter()
            .copied()
            .find(|p| rest.starts_with(p))
            // `a?.5:b` is a conditional, not optional chaining
            .map(|p| {
                if p == "?." && rest[2..].starts_with(|c: char| c.is_ascii_digit()) {
                    "?"
                } else {
                    p
                }
            });

        match punct {
            Some(p) => {
                self.pos += p.len();
                match p {
                    "(" => {
                        let opener = self.paren_opener();
                        self.openers.push(opener);
                    }
                    "{" => {
                        if let Some(depth) = self.templates.last_mut() {
                            *depth += 1;
                        }
                        let opener = self.brace_opener();
                        self.openers.push(opener);
                    }
                    ")" => self.last_closed = self.openers.pop().unwrap_or(Opener::Other),
                    "}" => {
                        if let Some(depth) = self.templates.last_mut() {
                            *depth = depth.saturating_sub(1);
                        }
                        self.last_closed = self.openers.pop().unwrap_or(Opener::Other);
                    }
                    _ => {}
                }
                self.push(TokenKind::Punct(p), start);
            }
            None => {
                self.bump();
                self.diagnostics.push(Diagnostic {
                    offset: start,
                    message: format!("Unexpected character '{}'.", c),
                });
            }
        }
    }
}
