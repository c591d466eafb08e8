//! A small JavaScript tokenizer built on `logos`.
//!
//! It knows just enough of the grammar to tell code apart from comments and literals:
//! strings, template literals, regular expressions, numbers, identifiers and punctuators.
//! `/` is lexed as a punctuator and the driver loop decides from the previous significant
//! token whether it opens a regular expression. It never fails; malformed input yields
//! [`LexIssue`]s and the offending literal runs to the end of its line or the input.

use logos::Logos;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    LineComment,
    BlockComment,
    Str,
    Template,
    Regex,
    Ident,
    Number,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    /// 1-based line of the first character
    pub line: usize,
    /// 1-based column (in characters) of the first character
    pub column: usize,
}

impl Token<'_> {
    /// Comments and whitespace
    pub const fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    pub fn contains_newline(&self) -> bool {
        self.text.contains(['\n', '\r', '\u{2028}', '\u{2029}'])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    String,
    Comment,
    Template,
    Regex,
}

impl fmt::Display for Unterminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            Self::String => "string",
            Self::Comment => "comment",
            Self::Template => "template literal",
            Self::Regex => "regular expression",
        };
        f.write_str(what)
    }
}

/// A literal or comment that is not closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexIssue {
    pub what: Unterminated,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Default)]
pub struct Lexed<'s> {
    pub tokens: Vec<Token<'s>>,
    pub issues: Vec<LexIssue>,
}

/// Keywords after which a `/` starts a regular expression
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
];

/// Whether a delimited literal or comment found its closing delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closing {
    Closed,
    Open,
}

impl Closing {
    const fn issue(self, what: Unterminated) -> Option<Unterminated> {
        match self {
            Self::Closed => None,
            Self::Open => Some(what),
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"[\s\x{FEFF}]+")]
    Whitespace,

    #[regex(r"//[^\n\r\x{2028}\x{2029}]*")]
    LineComment,

    #[token("/*", lex_block_comment)]
    BlockComment(Closing),

    #[token("\"", |lex| lex_string(lex, '"'))]
    #[token("'", |lex| lex_string(lex, '\''))]
    Str(Closing),

    #[token("`", lex_template)]
    Template(Closing),

    #[regex(r"[0-9][0-9_]*(\.[0-9_]*)?([eE][+-]?[0-9_]+)?[a-zA-Z0-9_]*")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9_]+)?[a-zA-Z0-9_]*")]
    Number,

    #[regex(r"[\p{L}\p{Nl}_$\\][\p{L}\p{Nl}\p{Mn}\p{Mc}\p{Nd}\p{Pc}$\\\x{200C}\x{200D}]*")]
    Ident,

    // Division or the start of a regular expression, decided by the driver
    #[token("/")]
    #[token("/=")]
    Slash,

    #[token(">>>=")]
    #[token("...")]
    #[token("===")]
    #[token("!==")]
    #[token("**=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token(">>>")]
    #[token("&&=")]
    #[token("||=")]
    #[token("??=")]
    #[token("=>")]
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("&&")]
    #[token("||")]
    #[token("??")]
    #[token("?.")]
    #[token("++")]
    #[token("--")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("**")]
    #[token("<<")]
    #[token(">>")]
    #[token("{")]
    #[token("}")]
    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    #[token(";")]
    #[token(",")]
    #[token("<")]
    #[token(">")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("%")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("!")]
    #[token("~")]
    #[token("?")]
    #[token(":")]
    #[token("=")]
    #[token(".")]
    #[token("@")]
    #[token("#")]
    Punct,
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$' || c == '\\'
}

pub fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_alphanumeric() || c == '\u{200c}' || c == '\u{200d}'
}

/// Block comments run to the end of input when not closed
fn lex_block_comment(lex: &mut logos::Lexer<'_, RawToken>) -> Closing {
    let remainder = lex.remainder();
    if let Some(end) = remainder.find("*/") {
        lex.bump(end + 2);
        Closing::Closed
    } else {
        lex.bump(remainder.len());
        Closing::Open
    }
}

/// Strings stop before a line terminator; an escaped line break is a continuation
fn lex_string(lex: &mut logos::Lexer<'_, RawToken>, quote: char) -> Closing {
    let remainder = lex.remainder();
    let mut chars = remainder.char_indices();
    let (len, closing) = loop {
        match chars.next() {
            None => break (remainder.len(), Closing::Open),
            Some((i, c)) if is_line_terminator(c) => break (i, Closing::Open),
            Some((_, '\\')) => {
                if let Some((_, '\r')) = chars.next() {
                    if chars.clone().next().is_some_and(|(_, c)| c == '\n') {
                        chars.next();
                    }
                }
            }
            Some((i, c)) if c == quote => break (i + c.len_utf8(), Closing::Closed),
            Some(_) => {}
        }
    };
    lex.bump(len);
    closing
}

/// Template literals may span lines
fn lex_template(lex: &mut logos::Lexer<'_, RawToken>) -> Closing {
    let remainder = lex.remainder();
    let mut chars = remainder.char_indices();
    let (len, closing) = loop {
        match chars.next() {
            None => break (remainder.len(), Closing::Open),
            Some((_, '\\')) => {
                chars.next();
            }
            Some((i, '`')) => break (i + 1, Closing::Closed),
            Some(_) => {}
        }
    };
    lex.bump(len);
    closing
}

/// Extend the current `/` or `/=` token over a regular expression literal and its flags
fn lex_regex(lex: &mut logos::Lexer<'_, RawToken>) -> Closing {
    let span = lex.span();
    // The body starts right after the opening slash, inside the current token for `/=`
    let already_lexed = span.len() - 1;
    let (len, closing) = scan_regex_body(&lex.source()[span.start + 1..]);
    lex.bump(len.saturating_sub(already_lexed));
    closing
}

/// Byte length of a regex body, closing slash and flags included
fn scan_regex_body(body: &str) -> (usize, Closing) {
    let mut in_class = false;
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            c if is_line_terminator(c) => return (i, Closing::Open),
            '\\' => {
                if chars.clone().next().is_some_and(|(_, n)| !is_line_terminator(n)) {
                    chars.next();
                }
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                let flags = &body[i + 1..];
                let flags_len = flags
                    .find(|c: char| !is_ident_part(c))
                    .unwrap_or(flags.len());
                return (i + 1 + flags_len, Closing::Closed);
            }
            _ => {}
        }
    }
    (body.len(), Closing::Open)
}

/// 1-based line and column, advanced over the text of each token
#[derive(Debug, Clone, Copy)]
struct Position {
    line: usize,
    column: usize,
    after_cr: bool,
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            after_cr: false,
        }
    }
}

impl Position {
    fn advance(&mut self, text: &str) {
        for c in text.chars() {
            match c {
                // "\r\n" counts as one line break, taken at the '\r'
                '\n' if self.after_cr => {}
                c if is_line_terminator(c) => {
                    self.line += 1;
                    self.column = 1;
                }
                _ => self.column += 1,
            }
            self.after_cr = c == '\r';
        }
    }
}

/// Split JavaScript source into tokens, trivia included
pub fn tokenize(src: &str) -> Lexed<'_> {
    let mut lexed = Lexed::default();
    let mut lexer = RawToken::lexer(src);
    let mut position = Position::default();
    let mut last_end = 0;
    let mut regex_allowed = true;
    // The previous significant token is `.` or `?.`, so an identifier is a property name
    let mut after_member_access = false;

    while let Some(raw) = lexer.next() {
        position.advance(&src[last_end..lexer.span().start]);
        let (line, column) = (position.line, position.column);

        let (kind, unterminated) = match raw {
            Ok(RawToken::Whitespace) => (TokenKind::Whitespace, None),
            Ok(RawToken::LineComment) => (TokenKind::LineComment, None),
            Ok(RawToken::BlockComment(closing)) => {
                (TokenKind::BlockComment, closing.issue(Unterminated::Comment))
            }
            Ok(RawToken::Str(closing)) => (TokenKind::Str, closing.issue(Unterminated::String)),
            Ok(RawToken::Template(closing)) => {
                (TokenKind::Template, closing.issue(Unterminated::Template))
            }
            Ok(RawToken::Slash) if regex_allowed => {
                let closing = lex_regex(&mut lexer);
                (TokenKind::Regex, closing.issue(Unterminated::Regex))
            }
            Ok(RawToken::Number) => (TokenKind::Number, None),
            Ok(RawToken::Ident) => (TokenKind::Ident, None),
            Ok(RawToken::Slash | RawToken::Punct) => (TokenKind::Punct, None),
            Err(()) => {
                // Unrecognized input becomes a one-character punctuator
                let end = lexer.span().end;
                let boundary = (end..=src.len())
                    .find(|&i| src.is_char_boundary(i))
                    .unwrap_or(src.len());
                lexer.bump(boundary - end);
                (TokenKind::Punct, None)
            }
        };

        let span = lexer.span();
        let token = Token {
            kind,
            text: &src[span.clone()],
            line,
            column,
        };
        if let Some(what) = unterminated {
            lexed.issues.push(LexIssue { what, line, column });
        }
        if !token.is_trivia() {
            regex_allowed = allows_regex_after(&token, after_member_access);
            after_member_access = token.kind == TokenKind::Punct && matches!(token.text, "." | "?.");
        }

        position.advance(token.text);
        last_end = span.end;
        lexed.tokens.push(token);
    }

    lexed
}

fn allows_regex_after(token: &Token<'_>, after_member_access: bool) -> bool {
    match token.kind {
        TokenKind::Punct => !matches!(token.text, ")" | "]" | "}" | "++" | "--"),
        TokenKind::Ident => !after_member_access && REGEX_PREFIX_KEYWORDS.contains(&token.text),
        _ => false,
    }
}
