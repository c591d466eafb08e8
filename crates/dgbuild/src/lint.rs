use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::LintConfig;
use crate::js_lexer::{TokenKind, Unterminated, tokenize};

/// One static-analysis diagnostic, positions are 1-based
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LintFinding {
    pub line: usize,
    pub character: usize,
    pub reason: String,
}

impl LintFinding {
    fn new(line: usize, character: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            character,
            reason: reason.into(),
        }
    }
}

pub trait Linter {
    fn lint(&self, source: &str) -> Vec<LintFinding>;
}

static TRAILING_WHITESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t]+$").expect("Invalid regex pattern for trailing whitespace detection")
});

static INDENTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([ \t]*)(.?)").expect("Invalid regex pattern for indentation detection")
});

/// Rule-based linter over the token stream and source lines
#[derive(Debug, Clone, Default)]
pub struct TokenLinter {
    config: LintConfig,
}

impl TokenLinter {
    pub fn new(config: LintConfig) -> Self {
        Self { config }
    }

    fn lint_lines(&self, source: &str, findings: &mut Vec<LintFinding>) {
        for (index, line) in source.lines().enumerate() {
            let line_no = index + 1;

            if let Some(max) = self.config.max_line_length {
                if line.chars().count() > max {
                    findings.push(LintFinding::new(line_no, max + 1, "Line is too long."));
                }
            }

            if self.config.trailing_whitespace {
                if let Some(found) = TRAILING_WHITESPACE.find(line) {
                    let column = line[..found.start()].chars().count() + 1;
                    findings.push(LintFinding::new(line_no, column, "Trailing whitespace."));
                }
            }

            if self.config.mixed_indentation {
                if let Some(captures) = INDENTATION.captures(line) {
                    let indent = captures.get(1).map_or("", |m| m.as_str());
                    // Tab-indented block comment continuation lines (" * ...") are fine
                    let comment_line = captures.get(2).is_some_and(|m| m.as_str() == "*");
                    if indent.contains(' ') && indent.contains('\t') && !comment_line {
                        findings.push(LintFinding::new(line_no, 1, "Mixed spaces and tabs."));
                    }
                }
            }
        }
    }
}

impl Linter for TokenLinter {
    fn lint(&self, source: &str) -> Vec<LintFinding> {
        let mut findings = Vec::new();
        let lexed = tokenize(source);

        for issue in &lexed.issues {
            let reason = match issue.what {
                Unterminated::String => "Unclosed string.",
                Unterminated::Comment => "Unclosed comment.",
                Unterminated::Template => "Unclosed template literal.",
                Unterminated::Regex => "Unclosed regular expression.",
            };
            findings.push(LintFinding::new(issue.line, issue.column, reason));
        }

        for token in lexed.tokens.iter().filter(|t| !t.is_trivia()) {
            match (token.kind, token.text) {
                (TokenKind::Punct, op @ ("==" | "!=")) if self.config.eqeqeq => {
                    findings.push(LintFinding::new(
                        token.line,
                        token.column,
                        format!("Expected '{op}=' and instead saw '{op}'."),
                    ));
                }
                (TokenKind::Ident, "debugger") if self.config.no_debugger => {
                    findings.push(LintFinding::new(
                        token.line,
                        token.column,
                        "Forbidden 'debugger' statement.",
                    ));
                }
                _ => {}
            }
        }

        self.lint_lines(source, &mut findings);
        findings.sort();
        findings
    }
}
