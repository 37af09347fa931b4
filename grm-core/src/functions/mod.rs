//! Built-in functions callable from grammars.
//!
//! Every function receives its evaluated arguments by value. Automaton
//! arguments are owned copies, so "destructive" functions mutate them in
//! place while the delayed variants wrap them in a shared view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use grm_fst::{Fst, SymbolTable, VectorFst};

use crate::error::FunctionError;
use crate::labels::LabelManager;
use crate::value::{FstWeight, Value, ValueKind};

mod cdrewrite;
mod fst_ops;
mod io;
mod string_file;
mod string_fst;

pub use string_fst::{StringFstMode, compile_fst_string};

/// Services a function may use besides its arguments.
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext<'a> {
    pub labels: &'a LabelManager,
    pub input_dir: &'a Path,
}

impl FunctionContext<'_> {
    /// Relative file names are taken from the input directory.
    pub fn resolve_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.input_dir.join(path)
        }
    }
}

pub trait Function<W: FstWeight>: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, args: Vec<Value>, ctx: &FunctionContext<'_>) -> Result<Value, FunctionError>;
}

/// The functions available for one arc kind, keyed by name.
pub struct Registry<W: FstWeight> {
    functions: HashMap<&'static str, Box<dyn Function<W>>>,
}

impl<W: FstWeight> Default for Registry<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: FstWeight> Registry<W> {
    pub fn new() -> Self {
        Registry {
            functions: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        fst_ops::register(&mut registry);
        cdrewrite::register(&mut registry);
        string_fst::register(&mut registry);
        string_file::register(&mut registry);
        io::register(&mut registry);
        registry
    }

    /// Adds `function`, replacing any function of the same name.
    pub fn register(&mut self, function: impl Function<W> + 'static) {
        self.functions.insert(function.name(), Box::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Function<W>> {
        self.functions.get(name).map(|function| function.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Positional arguments of one call, checked as they are taken.
pub(crate) struct Args {
    name: &'static str,
    values: Vec<Option<Value>>,
}

impl Args {
    /// Fails unless the call has one of the `allowed` argument counts.
    pub(crate) fn new(name: &'static str, values: Vec<Value>, allowed: &[usize]) -> Result<Self, FunctionError> {
        if !allowed.contains(&values.len()) {
            let expected = match allowed {
                [lo, .., hi] if allowed.len() > 2 && hi - lo + 1 == allowed.len() => format!("{lo}-{hi}"),
                _ => allowed
                    .iter()
                    .map(usize::to_string)
                    .collect::<Vec<_>>()
                    .join(" or "),
            };
            return Err(FunctionError::Arity {
                name,
                expected,
                got: values.len(),
            });
        }
        Ok(Args {
            name,
            values: values.into_iter().map(Some).collect(),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn is<T: ValueKind>(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(Some(value)) if value.is::<T>())
    }

    pub(crate) fn take<T: ValueKind>(&mut self, index: usize) -> Result<T, FunctionError> {
        let name = self.name;
        let mismatch = |got| FunctionError::ArgumentType {
            name,
            expected: T::NAME,
            index: index + 1,
            got,
        };
        let Some(slot) = self.values.get_mut(index) else {
            return Err(mismatch("nothing"));
        };
        match slot.take().map(Value::take::<T>) {
            Some(Ok(inner)) => Ok(inner),
            Some(Err(value)) => {
                let got = value.kind_name();
                *slot = Some(value);
                Err(mismatch(got))
            }
            None => Err(mismatch("nothing")),
        }
    }

    pub(crate) fn fst<W: FstWeight>(&mut self, index: usize) -> Result<Fst<W>, FunctionError> {
        self.take::<Fst<W>>(index)
    }

    pub(crate) fn vector<W: FstWeight>(&mut self, index: usize) -> Result<VectorFst<W>, FunctionError> {
        Ok(self.fst::<W>(index)?.into_vector())
    }

    pub(crate) fn string(&mut self, index: usize) -> Result<String, FunctionError> {
        self.take::<String>(index)
    }

    pub(crate) fn int(&mut self, index: usize) -> Result<i32, FunctionError> {
        self.take::<i32>(index)
    }

    pub(crate) fn symbol_table(&mut self, index: usize) -> Result<SymbolTable, FunctionError> {
        self.take::<SymbolTable>(index)
    }
}

pub(crate) fn fst_value<W: FstWeight>(fst: VectorFst<W>) -> Value {
    Value::from(Fst::from(fst))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn registers_every_builtin() {
        let registry = Registry::<W>::with_builtins();
        for name in [
            "ArcSort",
            "CDRewrite",
            "Closure",
            "Compose",
            "Concat",
            "ConcatDelayed",
            "Connect",
            "Determinize",
            "Difference",
            "Expand",
            "Invert",
            "LenientlyCompose",
            "LoadFst",
            "LoadFstFromFar",
            "Minimize",
            "Optimize",
            "Project",
            "Reverse",
            "Rewrite",
            "RmEpsilon",
            "RmWeight",
            "ShortestPath",
            "StringFile",
            "StringFst",
            "SymbolTable",
            "Union",
            "UnionDelayed",
            "Weight",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(registry.get("Nope").is_none());
    }

    #[test]
    fn arity_errors_list_allowed_counts() {
        let err = call("Closure", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "Closure: Expected 1 or 3 arguments but got 0");
    }

    #[test]
    fn type_errors_name_the_argument() {
        let err = call("Union", vec![acceptor("a"), Value::Int(3)]).unwrap_err();
        assert_eq!(err.to_string(), "Union: Expected FST for argument 2, got int");
        assert!(matches!(
            err,
            FunctionError::ArgumentType { index: 2, got: "int", .. }
        ));
        let err = call("Concat", vec![Value::String("a".to_string()), acceptor("b")]).unwrap_err();
        assert_eq!(err.to_string(), "Concat: Expected FST for argument 1, got string");
    }

    #[test]
    fn relative_paths_use_input_dir() {
        let labels = LabelManager::new();
        let ctx = FunctionContext {
            labels: &labels,
            input_dir: Path::new("/grammars"),
        };
        assert_eq!(ctx.resolve_path("a.txt"), Path::new("/grammars/a.txt"));
        assert_eq!(ctx.resolve_path("/abs/a.txt"), Path::new("/abs/a.txt"));
    }
}
