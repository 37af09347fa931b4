//! Syntax tree of one grammar file.
//!
//! Each node owns its children and records the 1-based source line it
//! started on. The tree is built once by the parser and only read
//! afterwards; consumers inspect it by matching on the variants.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub alias: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Rule(Rule),
    Return(Return),
}

impl Statement {
    pub fn line(&self) -> usize {
        match self {
            Statement::Rule(rule) => rule.line,
            Statement::Return(ret) => ret.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub expr: Expr,
    pub export: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub expr: Expr,
    pub line: usize,
}

/// A possibly dotted name; every component but the last is an import
/// alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub components: Vec<String>,
    pub line: usize,
}

impl Identifier {
    pub fn new(name: &str, line: usize) -> Self {
        Identifier {
            components: name.split('.').map(str::to_string).collect(),
            line,
        }
    }

    pub fn name(&self) -> &str {
        self.components.last().map_or("", String::as_str)
    }

    pub fn namespaces(&self) -> &[String] {
        &self.components[..self.components.len().saturating_sub(1)]
    }

    pub fn is_namespaced(&self) -> bool {
        self.components.len() > 1
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("."))
    }
}

/// How the text of an FST string is split into labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMode {
    Byte,
    Utf8,
    SymbolTable(Identifier),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringKind {
    /// `'...'`, a plain string value.
    Quoted,
    /// `"..."`, compiled to an acceptor.
    Fst(ParseMode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub text: String,
    pub kind: StringKind,
    pub line: usize,
}

/// Ordered argument list of a call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Collection {
    pub items: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: Identifier,
    pub args: Collection,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(Identifier),
    String(StringLiteral),
    Integer { value: i32, line: usize },
    Call(Call),
}

impl Expr {
    pub fn line(&self) -> usize {
        match self {
            Expr::Identifier(id) => id.line,
            Expr::String(string) => string.line,
            Expr::Integer { line, .. } => *line,
            Expr::Call(call) => call.line,
        }
    }

    /// Call of a named function; operators in the surface syntax desugar
    /// to these.
    pub fn call(name: &str, args: Vec<Expr>, line: usize) -> Self {
        Expr::Call(Call {
            function: Identifier::new(name, line),
            args: Collection { items: args },
            line,
        })
    }

    pub fn is_call(&self, name: &str) -> bool {
        matches!(self, Expr::Call(call) if call.function.to_string() == name)
    }
}
