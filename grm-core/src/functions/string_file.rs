//! `StringFile['file', in_mode?, out_mode?]`: a lexicon compiled from a
//! tab-separated file of `input [output [weight]]` rows.

use std::fs;

use grm_fst::ops::{ArcSortType, arc_sort, rm_epsilon};
use grm_fst::{Semiring, SymbolTable, TokenType, string_to_labels};
use tracing::debug;

use super::{Args, Function, FunctionContext, Registry, fst_value};
use crate::error::FunctionError;
use crate::prefix_tree::PrefixTree;
use crate::value::{FstWeight, Value};

const NAME: &str = "StringFile";

pub(super) fn register<W: FstWeight>(registry: &mut Registry<W>) {
    registry.register(StringFile);
}

enum Mode {
    Byte,
    Utf8,
    Symbols(SymbolTable),
}

impl Mode {
    fn token_type(&self) -> TokenType<'_> {
        match self {
            Mode::Byte => TokenType::Byte,
            Mode::Utf8 => TokenType::Utf8,
            Mode::Symbols(table) => TokenType::Symbol(table),
        }
    }
}

fn mode(args: &mut Args, index: usize, side: &str) -> Result<Mode, FunctionError> {
    if args.is::<SymbolTable>(index) {
        return Ok(Mode::Symbols(args.symbol_table(index)?));
    }
    if !args.is::<String>(index) {
        return Err(FunctionError::invalid(
            NAME,
            format!("Invalid parse mode or symbol table for {side} symbols"),
        ));
    }
    match args.string(index)?.as_str() {
        "byte" => Ok(Mode::Byte),
        "utf8" => Ok(Mode::Utf8),
        other => Err(FunctionError::invalid(
            NAME,
            format!("Invalid parse mode '{other}' for {side} symbols"),
        )),
    }
}

struct StringFile;

impl<W: FstWeight> Function<W> for StringFile {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, args: Vec<Value>, ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let mut args = Args::new(NAME, args, &[1, 2, 3])?;
        let file = args.string(0)?;
        let input_mode = if args.len() > 1 {
            mode(&mut args, 1, "input")?
        } else {
            Mode::Byte
        };
        let output_mode = if args.len() > 2 {
            Some(mode(&mut args, 2, "output")?)
        } else {
            None
        };
        let output_mode = output_mode.as_ref().unwrap_or(&input_mode);

        let path = ctx.resolve_path(&file);
        let text = fs::read_to_string(&path).map_err(|source| FunctionError::Io {
            name: NAME,
            path: path.clone(),
            source,
        })?;
        let mut tree = PrefixTree::<W>::new();
        let mut entries = 0usize;
        for (index, line) in text.lines().enumerate() {
            let line = strip_comment(line);
            if line.trim().is_empty() {
                continue;
            }
            let (input, output, weight) = parse_row::<W>(&line, index + 1)?;
            let input_labels = labels(input, &input_mode, index + 1)?;
            let output_labels = labels(output.unwrap_or(input), output_mode, index + 1)?;
            tree.add(&input_labels, &output_labels, weight);
            entries += 1;
        }
        debug!(path = %path.display(), entries, states = tree.num_states(), "compiled string file");

        let mut fst = tree.to_fst();
        rm_epsilon(&mut fst);
        arc_sort(&mut fst, ArcSortType::Input);
        Ok(fst_value(fst))
    }
}

fn parse_row<W: Semiring>(line: &str, number: usize) -> Result<(&str, Option<&str>, W), FunctionError> {
    let columns: Vec<&str> = line.split('\t').collect();
    match columns.as_slice() {
        [input] => Ok((input, None, W::one())),
        [input, output] => Ok((input, Some(output), W::one())),
        [input, output, weight] => {
            let weight = W::parse(weight).ok_or_else(|| {
                FunctionError::invalid(NAME, format!("line {number}: invalid weight '{weight}'"))
            })?;
            Ok((input, Some(output), weight))
        }
        _ => Err(FunctionError::invalid(
            NAME,
            format!("line {number}: expected 1 to 3 tab-separated columns but got {}", columns.len()),
        )),
    }
}

fn labels(text: &str, mode: &Mode, number: usize) -> Result<Vec<grm_fst::Label>, FunctionError> {
    string_to_labels(text, mode.token_type())
        .map_err(|source| FunctionError::invalid(NAME, format!("line {number}: {source}")))
}

/// Drops everything from the first unescaped `#` and turns `\#` into `#`.
fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'#') => {
                out.push('#');
                chars.next();
            }
            '#' => break,
            other => out.push(other),
        }
    }
    out.trim_end_matches('\r').to_string()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::labels::LabelManager;
    use grm_fst::Fst;
    use grm_fst::ops::paths::paths;

    fn compile(contents: &str, extra: Vec<Value>) -> Result<Value, FunctionError> {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("lex.tsv"), contents).expect("write");
        let mut args = vec![Value::String("lex.tsv".to_string())];
        args.extend(extra);
        call_in("StringFile", args, dir.path(), &LabelManager::new())
    }

    #[test]
    fn single_column_rows_are_acceptors() {
        let fst = compile("cat\ndog\n", vec![]).expect("compile");
        assert_eq!(outputs(&fst, "cat"), ["cat"]);
        assert_eq!(outputs(&fst, "dog"), ["dog"]);
        assert!(outputs(&fst, "cow").is_empty());
    }

    #[test]
    fn columns_give_outputs_and_weights() {
        let fst = compile("cat\tchat\t1.5\ndog\tchien\n", vec![]).expect("compile");
        assert_eq!(outputs(&fst, "cat"), ["chat"]);
        assert_eq!(outputs(&fst, "dog"), ["chien"]);
        let found = paths(fst.get::<Fst<W>>().vector(), 10);
        let cat = found.iter().find(|path| path.ilabels == bytes("cat")).expect("cat");
        assert_eq!(cat.weight, grm_fst::TropicalWeight(1.5));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let fst = compile("# header\n\na\\#b\t# trailing\nc # note\n", vec![]).expect("compile");
        assert_eq!(outputs(&fst, "a#b"), [""]);
        assert_eq!(outputs(&fst, "c "), ["c "]);
    }

    #[test]
    fn malformed_rows_report_line() {
        let err = compile("a\tb\tc\td\n", vec![]).unwrap_err();
        assert!(err.to_string().contains("line 1"));
        let err = compile("ok\na\tb\tnot-a-weight\n", vec![]).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn modes_are_validated() {
        let fst = compile("é\n", vec![Value::String("utf8".to_string())]).expect("utf8");
        let found = paths(fst.get::<Fst<W>>().vector(), 10);
        assert_eq!(found[0].ilabels, vec![0xe9]);
        let err = compile("a\n", vec![Value::String("latin1".to_string())]).unwrap_err();
        assert!(err.to_string().contains("latin1"));
        let err = compile("a\n", vec![Value::Int(3)]).unwrap_err();
        assert!(err.to_string().contains("input symbols"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = call_in(
            "StringFile",
            vec![Value::String("absent.tsv".to_string())],
            dir.path(),
            &LabelManager::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FunctionError::Io { .. }));
    }
}
