//! Functions that read from disk: symbol tables, single automata and
//! compiled archives.

use std::fs;

use grm_fst::SymbolTable;
use tracing::debug;

use super::{Args, Function, FunctionContext, Registry, fst_value};
use crate::archive::{Archive, read_fst};
use crate::error::FunctionError;
use crate::value::{FstWeight, Value};

pub(super) fn register<W: FstWeight>(registry: &mut Registry<W>) {
    registry.register(LoadSymbolTable);
    registry.register(LoadFst);
    registry.register(LoadFstFromFar);
}

/// `SymbolTable['file']` reads a `symbol<TAB>key` text table.
struct LoadSymbolTable;

impl<W: FstWeight> Function<W> for LoadSymbolTable {
    fn name(&self) -> &'static str {
        "SymbolTable"
    }

    fn execute(&self, args: Vec<Value>, ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[1])?;
        let file = args.string(0)?;
        let path = ctx.resolve_path(&file);
        let text = fs::read_to_string(&path).map_err(|source| FunctionError::Io {
            name,
            path: path.clone(),
            source,
        })?;
        let table = SymbolTable::read_text(file, &text).map_err(|source| FunctionError::Fst { name, source })?;
        debug!(path = %path.display(), symbols = table.len(), "loaded symbol table");
        Ok(Value::SymbolTable(table))
    }
}

/// `LoadFst['file']` reads a standalone automaton of this arc kind.
/// Its labels are taken as they are.
struct LoadFst;

impl<W: FstWeight> Function<W> for LoadFst {
    fn name(&self) -> &'static str {
        "LoadFst"
    }

    fn execute(&self, args: Vec<Value>, ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[1])?;
        let file = args.string(0)?;
        let path = ctx.resolve_path(&file);
        let fst = read_fst::<W>(&path).map_err(|source| FunctionError::Archive {
            name,
            source: Box::new(source),
        })?;
        debug!(path = %path.display(), states = fst.num_states(), "loaded automaton");
        Ok(fst_value(fst))
    }
}

/// `LoadFstFromFar['archive', 'rule']`. The archive's generated labels
/// are merged into this compilation and the rule is relabeled to match.
struct LoadFstFromFar;

impl<W: FstWeight> Function<W> for LoadFstFromFar {
    fn name(&self) -> &'static str {
        "LoadFstFromFar"
    }

    fn execute(&self, args: Vec<Value>, ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[2])?;
        let far = args.string(0)?;
        let rule = args.string(1)?;
        let path = ctx.resolve_path(&far);
        let mut archive = Archive::<W>::read(&path).map_err(|source| FunctionError::Archive {
            name,
            source: Box::new(source),
        })?;
        let mut fst = archive
            .take(&rule)
            .ok_or_else(|| FunctionError::invalid(name, format!("Unable to find FST: {rule}")))?;
        if let Some(table) = archive.generated() {
            let merged = ctx.labels.merge(table);
            if merged.is_ok() {
                fst.relabel(|label| ctx.labels.find_remap(label));
            }
            ctx.labels.clear_remap();
            merged.map_err(|source| FunctionError::Labels { name, source })?;
        }
        debug!(path = %path.display(), rule, states = fst.num_states(), "loaded rule from archive");
        Ok(fst_value(fst))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::labels::{GENERATED_LABEL_START, LabelManager};
    use grm_fst::VectorFst;
    use std::collections::BTreeMap;

    #[test]
    fn reads_symbol_tables_relative_to_input_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("syms.txt"), "<eps>\t0\nhello\t7\n").expect("write");
        let value = call_in(
            "SymbolTable",
            vec![Value::String("syms.txt".to_string())],
            dir.path(),
            &LabelManager::new(),
        )
        .expect("table");
        assert_eq!(value.get::<SymbolTable>().find_key("hello"), Some(7));
    }

    #[test]
    fn malformed_symbol_table_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("bad.txt"), "hello\tseven\n").expect("write");
        let err = call_in(
            "SymbolTable",
            vec![Value::String("bad.txt".to_string())],
            dir.path(),
            &LabelManager::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FunctionError::Fst { name: "SymbolTable", .. }));
    }

    #[test]
    fn loaded_rules_follow_the_session_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        // The archive was compiled where "bar" took the first label.
        let mut generated = SymbolTable::new("*StringFstSymbolTable");
        generated.add_symbol("bar", GENERATED_LABEL_START);
        let archive = Archive {
            fsts: BTreeMap::from([(
                "r".to_string(),
                VectorFst::<W>::from_labels(&[GENERATED_LABEL_START]),
            )]),
            generated: Some(generated),
        };
        archive.write(&dir.path().join("lib.far")).expect("write");

        // This session already gave the first label to "foo".
        let labels = LabelManager::new();
        labels.symbol_to_label("foo").expect("foo");
        let value = call_in(
            "LoadFstFromFar",
            vec![Value::String("lib.far".to_string()), Value::String("r".to_string())],
            dir.path(),
            &labels,
        )
        .expect("load");
        let bar = labels.find_label("bar").expect("bar merged");
        assert_ne!(bar, GENERATED_LABEL_START);
        let fst = value.get::<grm_fst::Fst<W>>().vector();
        assert!(fst.labels().contains(&bar));
        assert!(labels.remap_table().is_empty());
    }

    #[test]
    fn loads_standalone_automata() {
        let dir = tempfile::tempdir().expect("tempdir");
        crate::archive::write_fst(
            &VectorFst::<W>::from_labels(&[104, 105]),
            &dir.path().join("fsts/hi.fst"),
        )
        .expect("write");
        let labels = LabelManager::new();
        let value = call_in(
            "LoadFst",
            vec![Value::String("fsts/hi.fst".to_string())],
            dir.path(),
            &labels,
        )
        .expect("load");
        assert_eq!(outputs(&value, "hi"), ["hi"]);
        assert!(outputs(&value, "ho").is_empty());

        let err = call_in("LoadFst", vec![Value::String("absent.fst".to_string())], dir.path(), &labels).unwrap_err();
        assert!(matches!(err, FunctionError::Archive { name: "LoadFst", .. }));
        let err = call_in("LoadFst", vec![Value::Int(1)], dir.path(), &labels).unwrap_err();
        assert!(matches!(err, FunctionError::ArgumentType { got: "int", .. }));
    }

    #[test]
    fn load_fst_rejects_other_arc_kinds() {
        let dir = tempfile::tempdir().expect("tempdir");
        crate::archive::write_fst(
            &VectorFst::<grm_fst::LogWeight>::from_labels(&[97]),
            &dir.path().join("log.fst"),
        )
        .expect("write");
        let err = call_in(
            "LoadFst",
            vec![Value::String("log.fst".to_string())],
            dir.path(),
            &LabelManager::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("archive holds log arcs"));
    }

    #[test]
    fn missing_rule_and_archive_fail() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = Archive::<W>::default();
        archive.write(&dir.path().join("empty.far")).expect("write");
        let labels = LabelManager::new();
        let far = |file: &str| vec![Value::String(file.to_string()), Value::String("r".to_string())];
        let err = call_in("LoadFstFromFar", far("empty.far"), dir.path(), &labels).unwrap_err();
        assert!(err.to_string().contains("Unable to find FST: r"));
        let err = call_in("LoadFstFromFar", far("absent.far"), dir.path(), &labels).unwrap_err();
        assert!(matches!(err, FunctionError::Archive { .. }));
    }
}
