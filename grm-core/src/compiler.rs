use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use grm_fst::{Fst, Log64Weight, LogWeight, SymbolTable, TropicalWeight};
use tracing::{debug, info};

use crate::archive::Archive;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::evaluator::Evaluator;
use crate::functions::Registry;
use crate::labels::LabelManager;
use crate::namespace::Namespace;
use crate::parser::parse;
use crate::printer::print_module;
use crate::stdlib::{LibraryIndex, default_stdlib_root};
use crate::value::{ArcKind, FstWeight};

/// What to do when a rule fails with a recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The first failure aborts the compilation.
    #[default]
    FailFast,
    /// The failing rule is reported as a warning and left undefined.
    SkipFailedRules,
}

#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub arc_kind: ArcKind,
    /// Base of relative data-file paths and the second place imports are
    /// searched. Defaults to the grammar's directory.
    pub input_dir: Option<PathBuf>,
    /// Library searched last. Defaults to the bundled `stdlib/` when it
    /// exists.
    pub library_root: Option<PathBuf>,
    pub failure_policy: FailurePolicy,
    /// Run `Optimize` on every automaton a rule produces.
    pub optimize_all: bool,
    /// Export every top-level rule holding an automaton.
    pub always_export: bool,
}

/// Result of compiling one root grammar.
#[derive(Debug)]
pub struct Compilation<W: FstWeight> {
    pub exports: BTreeMap<String, Fst<W>>,
    /// Generated labels used anywhere in the compilation.
    pub symbols: Option<SymbolTable>,
    pub diagnostics: Vec<Diagnostic>,
    /// Scope of the root grammar, for looking up non-exported rules.
    pub namespace: Namespace,
}

impl<W: FstWeight> Compilation<W> {
    pub fn into_archive(self) -> Archive<W> {
        Archive {
            fsts: self
                .exports
                .into_iter()
                .map(|(name, fst)| (name, fst.into_vector()))
                .collect(),
            generated: self.symbols,
        }
    }
}

/// Where imports are looked up: the importing file's directory, the
/// input directory, then the library.
#[derive(Debug)]
pub(crate) struct ImportSearch {
    input_dir: PathBuf,
    library: Option<LibraryIndex>,
}

impl ImportSearch {
    pub(crate) fn new(input_dir: PathBuf, library_root: Option<&Path>) -> Result<Self, CoreError> {
        let library = match library_root {
            Some(root) => Some(LibraryIndex::load(root)?),
            None => {
                let root = default_stdlib_root();
                root.is_dir().then(|| LibraryIndex::load(root)).transpose()?
            }
        };
        Ok(ImportSearch { input_dir, library })
    }

    pub(crate) fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub(crate) fn find(&self, import: &str, importing_dir: &Path) -> Option<PathBuf> {
        let candidates = [importing_dir.join(import), self.input_dir.join(import)];
        if let Some(found) = candidates.into_iter().find(|path| path.is_file()) {
            return Some(found);
        }
        self.library.as_ref().and_then(|library| library.find(import))
    }
}

pub(crate) fn read_source(path: &Path) -> Result<String, CoreError> {
    fs::read_to_string(path).map_err(|source| CoreError::SourceIo {
        path: path.to_path_buf(),
        source,
    })
}

fn grammar_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Compiles the grammar at `path` and everything it imports for the arc
/// kind `W`. Each call uses its own generated-label session.
pub fn compile_grammar<W: FstWeight>(path: &Path, options: &CompilerOptions) -> Result<Compilation<W>, CoreError> {
    let input_dir = options.input_dir.clone().unwrap_or_else(|| grammar_dir(path));
    let search = ImportSearch::new(input_dir, options.library_root.as_deref())?;
    let registry = Registry::<W>::with_builtins();
    let labels = LabelManager::new();
    debug!(grammar = %path.display(), arc_type = W::ARC_TYPE, "compiling grammar");

    let mut evaluator = Evaluator::new(&registry, &labels, options, &search);
    let namespace = evaluator.evaluate_root(path)?;
    let (exports, diagnostics) = evaluator.finish();
    info!(grammar = %path.display(), exports = exports.len(), labels = labels.len(), "compiled grammar");
    Ok(Compilation {
        exports,
        symbols: labels.to_symbol_table(),
        diagnostics,
        namespace,
    })
}

/// Compiles `input` for the configured arc kind and writes the exported
/// rules to `output`. Nothing is written when compilation fails.
pub fn compile_to_archive(input: &Path, output: &Path, options: &CompilerOptions) -> Result<Vec<Diagnostic>, CoreError> {
    fn run<W: FstWeight>(input: &Path, output: &Path, options: &CompilerOptions) -> Result<Vec<Diagnostic>, CoreError> {
        let mut compilation = compile_grammar::<W>(input, options)?;
        let diagnostics = std::mem::take(&mut compilation.diagnostics);
        compilation.into_archive().write(output)?;
        Ok(diagnostics)
    }
    match options.arc_kind {
        ArcKind::Standard => run::<TropicalWeight>(input, output, options),
        ArcKind::Log => run::<LogWeight>(input, output, options),
        ArcKind::Log64 => run::<Log64Weight>(input, output, options),
    }
}

/// Parses the grammar at `path` and renders its syntax tree.
pub fn emit_ast(path: &Path, line_numbers: bool) -> Result<String, CoreError> {
    let source = read_source(path)?;
    let module = parse(&source).map_err(|err| err.in_file(path))?;
    Ok(print_module(&module, line_numbers))
}
