//! Tree-walking evaluation of grammar modules.
//!
//! Imports are evaluated first, each into a child namespace under its
//! alias. Function definitions are registered next so that sibling
//! functions can refer to each other, and the rules run last in source
//! order. A file reached twice through different imports is evaluated
//! once; later imports attach a skeleton sharing its globals.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use grm_fst::Fst;
use grm_fst::ops::optimize;
use tracing::{debug, info, warn};

use crate::ast::{self, Expr, Identifier, Import, ParseMode, Rule, Statement, StringKind};
use crate::compiler::{CompilerOptions, FailurePolicy, ImportSearch, read_source};
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::functions::{FunctionContext, Registry};
use crate::labels::LabelManager;
use crate::namespace::Namespace;
use crate::parser::parse;
use crate::value::{FstWeight, Value};

/// Grammars have no conditionals, so any recursion eventually hits this.
pub const MAX_CALL_DEPTH: usize = 128;

pub(crate) struct Evaluator<'a, W: FstWeight> {
    registry: &'a Registry<W>,
    labels: &'a LabelManager,
    options: &'a CompilerOptions,
    search: &'a ImportSearch,
    /// Files whose evaluation is in progress, outermost first.
    loading: Vec<PathBuf>,
    loaded: HashMap<PathBuf, Namespace>,
    exports: BTreeMap<String, Fst<W>>,
    diagnostics: Vec<Diagnostic>,
    call_depth: usize,
}

fn canonical(path: &Path) -> Result<PathBuf, CoreError> {
    path.canonicalize().map_err(|source| CoreError::SourceIo {
        path: path.to_path_buf(),
        source,
    })
}

fn semantic(line: usize, message: impl Into<String>) -> CoreError {
    CoreError::SemanticError {
        line,
        message: message.into(),
    }
}

impl<'a, W: FstWeight> Evaluator<'a, W> {
    pub(crate) fn new(
        registry: &'a Registry<W>,
        labels: &'a LabelManager,
        options: &'a CompilerOptions,
        search: &'a ImportSearch,
    ) -> Self {
        Evaluator {
            registry,
            labels,
            options,
            search,
            loading: Vec::new(),
            loaded: HashMap::new(),
            exports: BTreeMap::new(),
            diagnostics: Vec::new(),
            call_depth: 0,
        }
    }

    /// Evaluates the entry file and returns its namespace.
    pub(crate) fn evaluate_root(&mut self, path: &Path) -> Result<Namespace, CoreError> {
        let path = canonical(path)?;
        let mut root = Namespace::new();
        root.set_filename(path.display().to_string());
        root.set_top_level();
        self.evaluate_file(&path, &mut root)?;
        Ok(root)
    }

    pub(crate) fn finish(self) -> (BTreeMap<String, Fst<W>>, Vec<Diagnostic>) {
        (self.exports, self.diagnostics)
    }

    fn evaluate_file(&mut self, path: &Path, ns: &mut Namespace) -> Result<(), CoreError> {
        if self.loading.iter().any(|loading| loading == path) {
            return Err(CoreError::ImportCycle(path.to_path_buf()));
        }
        let source = read_source(path)?;
        let module = parse(&source).map_err(|err| err.in_file(path))?;
        debug!(file = %path.display(), depth = self.loading.len(), "evaluating module");
        self.loading.push(path.to_path_buf());
        let result = self.evaluate_module(&module, path, ns);
        self.loading.pop();
        result.map_err(|err| err.in_file(path))
    }

    fn evaluate_module(&mut self, module: &ast::Module, path: &Path, ns: &mut Namespace) -> Result<(), CoreError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        for import in &module.imports {
            self.import(import, dir, ns)?;
        }
        for function in &module.functions {
            if !ns.insert_global(&function.name, function.clone()) {
                return Err(semantic(
                    function.line,
                    format!("function '{}' is already defined", function.name),
                ));
            }
        }
        for statement in &module.statements {
            match statement {
                Statement::Rule(rule) => self.top_level_rule(rule, path, ns)?,
                Statement::Return(ret) => return Err(semantic(ret.line, "return statement outside of a function")),
            }
        }
        Ok(())
    }

    fn import(&mut self, import: &Import, dir: &Path, ns: &mut Namespace) -> Result<(), CoreError> {
        let found = self
            .search
            .find(&import.path, dir)
            .ok_or_else(|| CoreError::MissingImport {
                line: import.line,
                path: import.path.clone(),
            })?;
        let path = canonical(&found)?;
        if let Some(done) = self.loaded.get(&path) {
            debug!(file = %path.display(), alias = %import.alias, "reusing evaluated import");
            ns.adopt_child(&import.alias, done.clone_skeleton())?;
            return Ok(());
        }
        let child = ns.add_child(&path.display().to_string(), &import.alias)?;
        self.evaluate_file(&path, child)?;
        self.loaded.insert(path, child.clone_skeleton());
        Ok(())
    }

    fn top_level_rule(&mut self, rule: &Rule, file: &Path, ns: &mut Namespace) -> Result<(), CoreError> {
        match self.define_rule(rule, ns) {
            Err(err) if self.options.failure_policy == FailurePolicy::SkipFailedRules && !err.is_fatal() => {
                warn!(rule = %rule.name, error = %err, "skipping failed rule");
                self.diagnostics
                    .push(Diagnostic::warning(format!("skipped rule '{}': {err}", rule.name), err.line()).with_file(file));
                Ok(())
            }
            result => result,
        }
    }

    fn define_rule(&mut self, rule: &Rule, ns: &mut Namespace) -> Result<(), CoreError> {
        if ns.holds::<ast::Function>(&Identifier::new(&rule.name, rule.line)) {
            return Err(semantic(
                rule.line,
                format!("rule '{}' has the name of a function", rule.name),
            ));
        }
        if ns.defines(&rule.name) {
            return Err(semantic(rule.line, format!("rule '{}' is already defined", rule.name)));
        }
        let mut value = self.evaluate(&rule.expr, ns)?;
        if self.options.optimize_all {
            value = match W::into_fst(value) {
                Ok(fst) => Value::from(Fst::from(optimize(fst.vector()))),
                Err(other) => other,
            };
        }

        let wants_export = rule.export || (self.options.always_export && ns.local_depth() == 0);
        let export = if wants_export && ns.is_top_level() {
            match W::as_fst(&value) {
                Some(fst) => Some(fst.clone()),
                None if rule.export => {
                    return Err(semantic(
                        rule.line,
                        format!("cannot export '{}': it holds a {}", rule.name, value.kind_name()),
                    ));
                }
                None => None,
            }
        } else {
            None
        };

        info!(rule = %rule.name, kind = value.kind_name(), exported = export.is_some(), "evaluated rule");
        if !ns.insert(&rule.name, value) {
            return Err(semantic(rule.line, format!("rule '{}' is already defined", rule.name)));
        }
        if let Some(fst) = export {
            self.exports.insert(rule.name.clone(), fst);
        }
        Ok(())
    }

    fn evaluate(&mut self, expr: &Expr, ns: &mut Namespace) -> Result<Value, CoreError> {
        match expr {
            Expr::Identifier(id) => self.lookup(id, ns),
            Expr::Integer { value, .. } => Ok(Value::Int(*value)),
            Expr::String(literal) => {
                let text = Value::String(literal.text.clone());
                let args = match &literal.kind {
                    StringKind::Quoted => return Ok(text),
                    StringKind::Fst(ParseMode::Byte) => vec![Value::Int(0), text],
                    StringKind::Fst(ParseMode::Utf8) => vec![Value::Int(1), text],
                    StringKind::Fst(ParseMode::SymbolTable(table)) => {
                        vec![Value::Int(2), text, self.lookup(table, ns)?]
                    }
                };
                self.call_builtin("StringFst", args, literal.line)
            }
            Expr::Call(call) => {
                let args = call
                    .args
                    .items
                    .iter()
                    .map(|arg| self.evaluate(arg, ns))
                    .collect::<Result<Vec<_>, _>>()?;
                if ns.holds::<ast::Function>(&call.function) {
                    return self.call_user(&call.function, args, call.line, ns);
                }
                if call.function.is_namespaced() || !self.registry.contains(call.function.name()) {
                    return Err(semantic(call.line, format!("undefined function '{}'", call.function)));
                }
                self.call_builtin(call.function.name(), args, call.line)
            }
        }
    }

    fn lookup(&self, id: &Identifier, ns: &Namespace) -> Result<Value, CoreError> {
        if ns.holds::<ast::Function>(id) {
            return Err(semantic(id.line, format!("function '{id}' cannot be used as a value")));
        }
        ns.get::<Value>(id)
            .map(|value| value.copy())
            .ok_or_else(|| CoreError::UnresolvedIdentifier {
                line: id.line,
                name: id.to_string(),
            })
    }

    fn call_builtin(&self, name: &str, args: Vec<Value>, line: usize) -> Result<Value, CoreError> {
        let function = self
            .registry
            .get(name)
            .ok_or_else(|| semantic(line, format!("undefined function '{name}'")))?;
        let ctx = FunctionContext {
            labels: self.labels,
            input_dir: self.search.input_dir(),
        };
        function
            .execute(args, &ctx)
            .map_err(|source| CoreError::Function { line, source })
    }

    /// Runs a grammar-defined function in the namespace of the file that
    /// defined it. The local scope is popped on every exit path.
    fn call_user(&mut self, id: &Identifier, args: Vec<Value>, line: usize, ns: &mut Namespace) -> Result<Value, CoreError> {
        let unresolved = || CoreError::UnresolvedIdentifier {
            line,
            name: id.to_string(),
        };
        let function = ns.get::<ast::Function>(id).ok_or_else(unresolved)?;
        if args.len() != function.params.len() {
            return Err(semantic(
                line,
                format!(
                    "{}: Expected {} arguments but got {}",
                    function.name,
                    function.params.len(),
                    args.len()
                ),
            ));
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(semantic(
                line,
                format!("{}: call depth exceeds {MAX_CALL_DEPTH}", function.name),
            ));
        }
        let owner = ns.resolve_mut(id).ok_or_else(unresolved)?;

        owner.push_local();
        for (param, value) in function.params.iter().zip(args) {
            owner.insert(param, value);
        }
        self.call_depth += 1;
        let result = self.run_body(&function, owner);
        self.call_depth -= 1;
        owner.pop_local();
        result
    }

    fn run_body(&mut self, function: &ast::Function, ns: &mut Namespace) -> Result<Value, CoreError> {
        for statement in &function.body {
            match statement {
                Statement::Rule(rule) => self.define_rule(rule, ns)?,
                Statement::Return(ret) => return self.evaluate(&ret.expr, ns),
            }
        }
        Err(semantic(
            function.line,
            format!("function '{}' does not return a value", function.name),
        ))
    }
}
