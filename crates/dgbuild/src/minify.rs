use log::warn;

use crate::config::MinifyConfig;
use crate::js_lexer::{Token, TokenKind, is_ident_part, tokenize};

/// Output of a minifier run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Minified {
    pub code: String,
    pub warnings: Vec<String>,
}

/// Compresses JavaScript source
pub trait Minifier {
    fn minify(&self, source: &str) -> Minified;
}

/// Whitespace and comment stripping minifier.
///
/// Tokens are copied verbatim; only trivia between them is rewritten. A line break in the
/// source between two tokens stays a line break so automatic semicolon insertion sees the
/// same program.
#[derive(Debug, Clone, Default)]
pub struct TokenMinifier {
    keep_bang_comments: bool,
}

impl TokenMinifier {
    pub fn new(config: &MinifyConfig) -> Self {
        Self {
            keep_bang_comments: config.keep_bang_comments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gap {
    None,
    Space,
    Newline,
}

impl Gap {
    fn widen(self, token: &Token<'_>) -> Self {
        if self == Self::Newline || token.contains_newline() {
            Self::Newline
        } else {
            Self::Space
        }
    }
}

impl Minifier for TokenMinifier {
    fn minify(&self, source: &str) -> Minified {
        let lexed = tokenize(source);
        let mut code = String::with_capacity(source.len() / 2);
        let mut prev: Option<Token<'_>> = None;
        let mut gap = Gap::None;

        for token in &lexed.tokens {
            match token.kind {
                TokenKind::Whitespace | TokenKind::LineComment => {
                    gap = gap.widen(token);
                    continue;
                }
                TokenKind::BlockComment if !(self.keep_bang_comments && token.text.starts_with("/*!")) => {
                    gap = gap.widen(token);
                    continue;
                }
                _ => {}
            }

            if let Some(prev) = prev {
                match gap {
                    Gap::Newline => code.push('\n'),
                    Gap::Space if needs_space(&prev, token) => code.push(' '),
                    _ => {}
                }
            }
            code.push_str(token.text);
            gap = Gap::None;
            prev = Some(*token);
        }

        let warnings = lexed
            .issues
            .iter()
            .map(|issue| {
                format!(
                    "Unterminated {} at line {}, col {}; copied as is",
                    issue.what, issue.line, issue.column
                )
            })
            .collect();

        Minified { code, warnings }
    }
}

/// Whether dropping the whitespace between two tokens would change how they lex
fn needs_space(prev: &Token<'_>, next: &Token<'_>) -> bool {
    let (Some(last), Some(first)) = (prev.text.chars().last(), next.text.chars().next()) else {
        return false;
    };

    (is_ident_part(last) && is_ident_part(first))
        || (last == '+' && first == '+')
        || (last == '-' && first == '-')
        || (last == '/' && (first == '/' || first == '*'))
        || (prev.kind == TokenKind::Number && first == '.')
        || (prev.kind == TokenKind::Regex && is_ident_part(first))
}

/// Finalises an assembled bundle: pass-through in debug mode, otherwise minified and
/// prefixed with the copyright banner.
#[derive(Debug)]
pub struct Packager<'a, M: Minifier + ?Sized> {
    minifier: &'a M,
    copyrights: &'a str,
}

impl<'a, M: Minifier + ?Sized> Packager<'a, M> {
    pub fn new(minifier: &'a M, copyrights: &'a str) -> Self {
        Self {
            minifier,
            copyrights,
        }
    }

    pub fn package(&self, content: &str, debug: bool) -> String {
        if debug {
            return content.to_owned();
        }

        let minified = self.minifier.minify(content);
        for warning in &minified.warnings {
            warn!("Minifier: {warning}");
        }

        let mut packaged = String::with_capacity(self.copyrights.len() + minified.code.len());
        packaged.push_str(self.copyrights);
        packaged.push_str(&minified.code);
        packaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn minify(source: &str) -> String {
        TokenMinifier::default().minify(source).code
    }

    #[test]
    fn test_strips_comments_and_collapses_whitespace() {
        let source = "/* header */\nvar  a = 1 ,  b = 'x  y';   // trailing\nfunction f ( x ) {\n    return x + a ;\n}\n";
        assert_eq!(
            minify(source),
            "var a=1,b='x  y';\nfunction f(x){\nreturn x+a;\n}"
        );
    }

    #[test]
    fn test_keeps_separators_that_change_meaning() {
        assert_eq!(minify("a + +b; c - -d; e + ++f"), "a+ +b;c- -d;e+ ++f");
        assert_eq!(minify("1 .toString()"), "1 .toString()");
        assert_eq!(minify("typeof x"), "typeof x");
        assert_eq!(minify("x = a / /re/.source.length"), "x=a/ /re/.source.length");
    }

    #[test]
    fn test_regex_followed_by_keyword_keeps_space() {
        assert_eq!(
            minify("var ok = /abc/ instanceof RegExp;\nvar t = /x/ in o;"),
            "var ok=/abc/ instanceof RegExp;\nvar t=/x/ in o;"
        );
        assert_eq!(minify("s = /a/g .source"), "s=/a/g.source");
    }

    #[test]
    fn test_keyword_named_property_divides() {
        let minified = TokenMinifier::default().minify("var h = size.of / 2; /* note\n a */ var z = 1;");
        assert_eq!(minified.code, "var h=size.of/2;\nvar z=1;");
        assert!(minified.warnings.is_empty());
    }

    #[test]
    fn test_line_breaks_survive_for_asi() {
        assert_eq!(minify("a = b\n(c)"), "a=b\n(c)");
        assert_eq!(minify("return /* \n */ x"), "return\nx");
    }

    #[test]
    fn test_bang_comments_can_be_kept() {
        let config = MinifyConfig {
            keep_bang_comments: true,
        };
        let minified = TokenMinifier::new(&config).minify("/*! (c) 2GIS */\nvar a = 1; /* drop */");
        assert_eq!(minified.code, "/*! (c) 2GIS */\nvar a=1;");
    }

    #[test]
    fn test_unterminated_literal_is_a_warning() {
        let minified = TokenMinifier::default().minify("var a = 'oops;\nvar b = 2;");
        assert_eq!(minified.warnings.len(), 1);
        assert!(minified.warnings[0].contains("Unterminated string at line 1, col 9"));
        assert_eq!(minified.code, "var a='oops;\nvar b=2;");
    }

    struct CountingMinifier {
        calls: Cell<usize>,
    }

    impl Minifier for CountingMinifier {
        fn minify(&self, source: &str) -> Minified {
            self.calls.set(self.calls.get() + 1);
            Minified {
                code: source.to_uppercase(),
                warnings: vec!["noted".to_owned()],
            }
        }
    }

    #[test]
    fn test_packager_debug_is_pass_through() {
        let minifier = CountingMinifier { calls: Cell::new(0) };
        let packager = Packager::new(&minifier, "/* (c) */\n");

        assert_eq!(packager.package("var a;", true), "var a;");
        assert_eq!(minifier.calls.get(), 0);

        assert_eq!(packager.package("var a;", false), "/* (c) */\nVAR A;");
        assert_eq!(minifier.calls.get(), 1);
    }
}
