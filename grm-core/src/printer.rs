//! Indented rendering of a syntax tree, used by `--emit-ast-only`.

use std::fmt::Write;

use crate::ast::{Expr, Function, Import, Module, ParseMode, Statement, StringKind};

pub fn print_module(module: &Module, line_numbers: bool) -> String {
    let mut printer = Printer {
        out: String::new(),
        line_numbers,
    };
    printer.line(0, 0, "Module");
    for import in &module.imports {
        printer.import(import);
    }
    for function in &module.functions {
        printer.function(function);
    }
    for statement in &module.statements {
        printer.statement(statement, 1);
    }
    printer.out
}

struct Printer {
    out: String,
    line_numbers: bool,
}

impl Printer {
    fn line(&mut self, source_line: usize, depth: usize, text: &str) {
        if self.line_numbers {
            let _ = write!(self.out, "{source_line:>4}: ");
        }
        let _ = writeln!(self.out, "{}{}", "  ".repeat(depth), text);
    }

    fn import(&mut self, import: &Import) {
        let text = format!("Import '{}' as {}", import.path, import.alias);
        self.line(import.line, 1, &text);
    }

    fn function(&mut self, function: &Function) {
        let text = format!("Function {}[{}]", function.name, function.params.join(", "));
        self.line(function.line, 1, &text);
        for statement in &function.body {
            self.statement(statement, 2);
        }
    }

    fn statement(&mut self, statement: &Statement, depth: usize) {
        match statement {
            Statement::Rule(rule) => {
                let prefix = if rule.export { "Export " } else { "" };
                self.line(rule.line, depth, &format!("{prefix}Rule {}", rule.name));
                self.expr(&rule.expr, depth + 1);
            }
            Statement::Return(ret) => {
                self.line(ret.line, depth, "Return");
                self.expr(&ret.expr, depth + 1);
            }
        }
    }

    fn expr(&mut self, expr: &Expr, depth: usize) {
        match expr {
            Expr::Identifier(id) => self.line(id.line, depth, &format!("Identifier {id}")),
            Expr::Integer { value, line } => self.line(*line, depth, &format!("Integer {value}")),
            Expr::String(string) => {
                let text = match &string.kind {
                    StringKind::Quoted => format!("String '{}'", string.text),
                    StringKind::Fst(ParseMode::Byte) => format!("FstString \"{}\"", string.text),
                    StringKind::Fst(ParseMode::Utf8) => {
                        format!("FstString \"{}\".utf8", string.text)
                    }
                    StringKind::Fst(ParseMode::SymbolTable(table)) => {
                        format!("FstString \"{}\".{table}", string.text)
                    }
                };
                self.line(string.line, depth, &text);
            }
            Expr::Call(call) => {
                self.line(call.line, depth, &format!("Call {}", call.function));
                for arg in &call.args.items {
                    self.expr(arg, depth + 1);
                }
            }
        }
    }
}
