//! Lexer for grammar source files.

use crate::diagnostic::Diagnostic;

/// Kind of a token produced by the lexer.
///
/// Identifiers may contain dots (`byte.kDigit`); the parser splits them
/// into namespace components. String tokens keep their escapes, since
/// FST strings interpret them later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,

    Ident,
    IntLiteral,
    FstString,    // "..."
    QuotedString, // '...'
    Weight,       // <...>

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Colon,
    Dot,
    Equal,

    Pipe,     // |
    At,       // @
    Minus,    // -
    Star,     // *
    Plus,     // +
    Question, // ?

    Import,
    As,
    Func,
    Export,
    Return,
}

/// A single token. `text_start` and `text_end` are byte offsets into the
/// source; for strings and weights they exclude the delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub text_start: u32,
    pub text_end: u32,
}

impl Token {
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.text_start as usize..self.text_end as usize]
    }
}

#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lex a source string into tokens, always ending with `Eof`.
pub fn lex(source: &str) -> LexResult {
    let mut lexer = Lexer {
        chars: source.as_bytes(),
        source,
        index: 0,
        line: 1,
        diagnostics: Vec::new(),
    };
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    index: usize,
    line: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> LexResult {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }
            if ch == b'#' {
                while self.peek_char().is_some_and(|c| c != b'\n') {
                    self.consume_char();
                }
                continue;
            }

            let start = self.index as u32;
            let simple = match ch {
                b'(' => Some(TokenKind::LParen),
                b')' => Some(TokenKind::RParen),
                b'{' => Some(TokenKind::LBrace),
                b'}' => Some(TokenKind::RBrace),
                b'[' => Some(TokenKind::LBracket),
                b']' => Some(TokenKind::RBracket),
                b',' => Some(TokenKind::Comma),
                b';' => Some(TokenKind::Semi),
                b':' => Some(TokenKind::Colon),
                b'.' => Some(TokenKind::Dot),
                b'=' => Some(TokenKind::Equal),
                b'|' => Some(TokenKind::Pipe),
                b'@' => Some(TokenKind::At),
                b'-' => Some(TokenKind::Minus),
                b'*' => Some(TokenKind::Star),
                b'+' => Some(TokenKind::Plus),
                b'?' => Some(TokenKind::Question),
                _ => None,
            };
            let token = if let Some(kind) = simple {
                self.consume_char();
                self.simple_token(kind, start)
            } else {
                match ch {
                    b'"' => self.lex_delimited(TokenKind::FstString, b'"'),
                    b'\'' => self.lex_delimited(TokenKind::QuotedString, b'\''),
                    b'<' => self.lex_delimited(TokenKind::Weight, b'>'),
                    b'0'..=b'9' => self.lex_number(start),
                    _ if is_ident_start(ch) => self.lex_ident_or_keyword(start),
                    _ => {
                        self.consume_char();
                        self.unexpected_char(ch)
                    }
                }
            };

            if let Some(tok) = token {
                tokens.push(tok);
            }
        }

        let end = self.chars.len() as u32;
        tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            text_start: end,
            text_end: end,
        });

        LexResult {
            tokens,
            diagnostics: std::mem::take(&mut self.diagnostics),
        }
    }

    fn simple_token(&self, kind: TokenKind, start: u32) -> Option<Token> {
        Some(Token {
            kind,
            line: self.line,
            text_start: start,
            text_end: self.index as u32,
        })
    }

    fn unexpected_char(&mut self, ch: u8) -> Option<Token> {
        let diag = Diagnostic::error(format!("unexpected character '{}'", ch as char), self.line)
            .with_code("E0001");
        self.diagnostics.push(diag);
        None
    }

    /// Strings and weights. A backslash escapes the next byte, so the
    /// closing delimiter can appear inside.
    fn lex_delimited(&mut self, kind: TokenKind, close: u8) -> Option<Token> {
        let line = self.line;
        self.consume_char();
        let content_start = self.index;
        while let Some(ch) = self.peek_char() {
            if ch == close {
                let content_end = self.index;
                self.consume_char();
                return Some(Token {
                    kind,
                    line,
                    text_start: content_start as u32,
                    text_end: content_end as u32,
                });
            }
            self.consume_char();
            if ch == b'\\' && self.peek_char().is_some() {
                self.consume_char();
            }
        }

        let what = match kind {
            TokenKind::Weight => "unterminated weight",
            _ => "unterminated string literal",
        };
        self.diagnostics
            .push(Diagnostic::error(what, line).with_code("E0002"));
        None
    }

    fn lex_number(&mut self, start: u32) -> Option<Token> {
        while self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
            self.consume_char();
        }
        self.simple_token(TokenKind::IntLiteral, start)
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> Option<Token> {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.consume_char();
        }
        let text = &self.source[start as usize..self.index];
        let kind = match text {
            "import" => TokenKind::Import,
            "as" => TokenKind::As,
            "func" => TokenKind::Func,
            "export" => TokenKind::Export,
            "return" => TokenKind::Return,
            _ => TokenKind::Ident,
        };
        self.simple_token(kind, start)
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn consume_char(&mut self) {
        if let Some(&ch) = self.chars.get(self.index) {
            if ch == b'\n' {
                self.line += 1;
            }
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit() || ch == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_rule_with_operators() {
        assert_eq!(
            kinds("export r = \"a\" | b.c* <1.5>;"),
            vec![
                TokenKind::Export,
                TokenKind::Ident,
                TokenKind::Equal,
                TokenKind::FstString,
                TokenKind::Pipe,
                TokenKind::Ident,
                TokenKind::Star,
                TokenKind::Weight,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_contents_exclude_quotes_and_keep_escapes() {
        let source = "x = \"a\\\"b\";";
        let result = lex(source);
        let string = &result.tokens[2];
        assert_eq!(string.kind, TokenKind::FstString);
        assert_eq!(string.text(source), "a\\\"b");
    }

    #[test]
    fn tracks_lines_and_skips_comments() {
        let source = "# header\nimport 'b.grm' as b;\n\nx = 1;";
        let result = lex(source);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.tokens[0].line, 2);
        let x = result.tokens.iter().find(|t| t.text(source) == "x").expect("x token");
        assert_eq!(x.line, 4);
    }

    #[test]
    fn reports_unterminated_string() {
        let result = lex("x = \"abc;");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, Some("E0002"));
    }

    #[test]
    fn reports_unexpected_character() {
        let result = lex("x = $;");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].line, Some(1));
    }
}
