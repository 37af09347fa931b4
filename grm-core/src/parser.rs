use crate::ast::{
    Call, Collection, Expr, Function, Identifier, Import, Module, ParseMode, Return, Rule,
    Statement, StringKind, StringLiteral,
};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};

/// Parses one grammar file. Imports, functions and statements may be
/// interleaved in the source; the module keeps each kind in source order.
pub fn parse(source: &str) -> Result<Module, CoreError> {
    let result = lex(source);
    if let Some(diag) = result.diagnostics.first() {
        return Err(CoreError::LexError {
            line: diag.line.unwrap_or(0),
            message: diag.message.clone(),
        });
    }
    let mut parser = Parser {
        source,
        tokens: &result.tokens,
        position: 0,
    };
    parser.parse_module()
}

struct Parser<'src> {
    source: &'src str,
    tokens: &'src [Token],
    position: usize,
}

impl<'src> Parser<'src> {
    fn parse_module(&mut self) -> Result<Module, CoreError> {
        let mut module = Module::default();
        loop {
            match self.peek().kind {
                TokenKind::Eof => return Ok(module),
                TokenKind::Import => module.imports.push(self.parse_import()?),
                TokenKind::Func => module.functions.push(self.parse_function()?),
                TokenKind::Return => {
                    return Err(self.error("return statement outside of a function"));
                }
                _ => module.statements.push(self.parse_rule(true)?),
            }
        }
    }

    fn parse_import(&mut self) -> Result<Import, CoreError> {
        let line = self.expect(TokenKind::Import, "'import'")?.line;
        let path = self.expect(TokenKind::QuotedString, "quoted file name")?;
        let path = unescape(path.text(self.source));
        self.expect(TokenKind::As, "'as'")?;
        let alias = self.simple_name("import alias")?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Import { path, alias, line })
    }

    fn parse_function(&mut self) -> Result<Function, CoreError> {
        let line = self.expect(TokenKind::Func, "'func'")?.line;
        let name = self.simple_name("function name")?;
        self.expect(TokenKind::LBracket, "'['")?;
        let mut params = Vec::new();
        if self.peek().kind != TokenKind::RBracket {
            loop {
                params.push(self.simple_name("parameter name")?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "']'")?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.eat(TokenKind::RBrace) {
            match self.peek().kind {
                TokenKind::Eof => return Err(self.error("unterminated function body")),
                TokenKind::Return => {
                    let line = self.advance().line;
                    let expr = self.parse_expr()?;
                    self.expect(TokenKind::Semi, "';'")?;
                    body.push(Statement::Return(Return { expr, line }));
                }
                _ => body.push(self.parse_rule(false)?),
            }
        }
        Ok(Function {
            name,
            params,
            body,
            line,
        })
    }

    fn parse_rule(&mut self, top_level: bool) -> Result<Statement, CoreError> {
        let export = self.peek().kind == TokenKind::Export;
        if export {
            if !top_level {
                return Err(self.error("cannot export from inside a function"));
            }
            self.advance();
        }
        let line = self.peek().line;
        let name = self.simple_name("rule name")?;
        self.expect(TokenKind::Equal, "'='")?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::Semi, "';'")?;
        Ok(Statement::Rule(Rule {
            name,
            expr,
            export,
            line,
        }))
    }

    fn parse_expr(&mut self) -> Result<Expr, CoreError> {
        self.parse_binary(0)
    }

    /// Loosest to tightest: union, composition, difference.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, CoreError> {
        const LEVELS: [(TokenKind, &str); 3] = [
            (TokenKind::Pipe, "Union"),
            (TokenKind::At, "Compose"),
            (TokenKind::Minus, "Difference"),
        ];
        let Some(&(op, function)) = LEVELS.get(level) else {
            return self.parse_concat();
        };
        let mut left = self.parse_binary(level + 1)?;
        while self.peek().kind == op {
            let line = self.advance().line;
            let right = self.parse_binary(level + 1)?;
            left = Expr::call(function, vec![left, right], line);
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<Expr, CoreError> {
        let mut left = self.parse_cross()?;
        while starts_atom(self.peek().kind) {
            let line = self.peek().line;
            let right = self.parse_cross()?;
            left = Expr::call("Concat", vec![left, right], line);
        }
        Ok(left)
    }

    fn parse_cross(&mut self) -> Result<Expr, CoreError> {
        let left = self.parse_postfix()?;
        if self.peek().kind == TokenKind::Colon {
            let line = self.advance().line;
            let right = self.parse_postfix()?;
            return Ok(Expr::call("Rewrite", vec![left, right], line));
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, CoreError> {
        let mut expr = self.parse_atom()?;
        loop {
            let token = self.peek().clone();
            let closure = |expr, lower, upper| {
                let bound = |value| Expr::Integer {
                    value,
                    line: token.line,
                };
                Expr::call("Closure", vec![expr, bound(lower), bound(upper)], token.line)
            };
            expr = match token.kind {
                TokenKind::Star => {
                    self.advance();
                    closure(expr, 0, 0)
                }
                TokenKind::Plus => {
                    self.advance();
                    closure(expr, 1, 0)
                }
                TokenKind::Question => {
                    self.advance();
                    closure(expr, 0, 1)
                }
                TokenKind::LBrace => {
                    self.advance();
                    let lower = self.integer()?;
                    let upper = if self.eat(TokenKind::Comma) {
                        self.integer()?
                    } else {
                        lower
                    };
                    self.expect(TokenKind::RBrace, "'}'")?;
                    if upper < lower {
                        return Err(CoreError::ParseError {
                            line: token.line,
                            message: format!("invalid repetition range {{{lower},{upper}}}"),
                        });
                    }
                    closure(expr, lower, upper)
                }
                TokenKind::Weight => {
                    self.advance();
                    let weight = Expr::String(StringLiteral {
                        text: token.text(self.source).trim().to_string(),
                        kind: StringKind::Quoted,
                        line: token.line,
                    });
                    Expr::call("Weight", vec![expr, weight], token.line)
                }
                _ => return Ok(expr),
            };
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, CoreError> {
        let token = self.advance().clone();
        let line = token.line;
        match token.kind {
            TokenKind::FstString => {
                let mode = if self.eat(TokenKind::Dot) {
                    let name = self.expect(TokenKind::Ident, "parse mode after '.'")?;
                    match name.text(self.source) {
                        "byte" => ParseMode::Byte,
                        "utf8" => ParseMode::Utf8,
                        other => ParseMode::SymbolTable(self.identifier(other, name.line)?),
                    }
                } else {
                    ParseMode::Byte
                };
                Ok(Expr::String(StringLiteral {
                    text: token.text(self.source).to_string(),
                    kind: StringKind::Fst(mode),
                    line,
                }))
            }
            TokenKind::QuotedString => Ok(Expr::String(StringLiteral {
                text: unescape(token.text(self.source)),
                kind: StringKind::Quoted,
                line,
            })),
            TokenKind::IntLiteral => Ok(Expr::Integer {
                value: self.int_value(&token)?,
                line,
            }),
            TokenKind::Ident => {
                let function = self.identifier(token.text(self.source), line)?;
                if !self.eat(TokenKind::LBracket) {
                    return Ok(Expr::Identifier(function));
                }
                let mut items = Vec::new();
                if self.peek().kind != TokenKind::RBracket {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(Expr::Call(Call {
                    function,
                    args: Collection { items },
                    line,
                }))
            }
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(expr)
            }
            TokenKind::Eof => Err(CoreError::ParseError {
                line,
                message: "unexpected end of input".to_string(),
            }),
            _ => Err(CoreError::ParseError {
                line,
                message: format!("unexpected '{}'", token.text(self.source)),
            }),
        }
    }

    fn integer(&mut self) -> Result<i32, CoreError> {
        let token = self.expect(TokenKind::IntLiteral, "integer")?;
        self.int_value(token)
    }

    fn int_value(&self, token: &Token) -> Result<i32, CoreError> {
        token
            .text(self.source)
            .parse()
            .map_err(|_| CoreError::ParseError {
                line: token.line,
                message: format!("integer out of range: {}", token.text(self.source)),
            })
    }

    fn identifier(&self, text: &str, line: usize) -> Result<Identifier, CoreError> {
        let id = Identifier::new(text, line);
        if id.components.iter().any(String::is_empty) {
            return Err(CoreError::ParseError {
                line,
                message: format!("malformed identifier '{text}'"),
            });
        }
        Ok(id)
    }

    /// An identifier without namespace components.
    fn simple_name(&mut self, what: &str) -> Result<String, CoreError> {
        let token = self.expect(TokenKind::Ident, what)?;
        let text = token.text(self.source);
        if text.contains('.') {
            return Err(CoreError::ParseError {
                line: token.line,
                message: format!("{what} cannot contain '.': {text}"),
            });
        }
        Ok(text.to_string())
    }

    fn peek(&self) -> &'src Token {
        // The lexer always terminates the stream with Eof.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'src Token {
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<&'src Token, CoreError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, message: &str) -> CoreError {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", token.text(self.source)),
        };
        CoreError::ParseError {
            line: token.line,
            message: format!("{message}, found {found}"),
        }
    }
}

fn starts_atom(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::FstString
            | TokenKind::QuotedString
            | TokenKind::IntLiteral
            | TokenKind::Ident
            | TokenKind::LParen
    )
}

/// Resolves `\x` to `x` in plain strings.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
