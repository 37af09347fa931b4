//! Compilation of double-quoted string literals.
//!
//! In byte and UTF-8 mode a bracketed span such as `[foo]` becomes one
//! generated label instead of its characters. A bracketed number is
//! taken as a literal label (`[32]`, `[0x20]`, `[040]`), and `[BOS]` and
//! `[EOS]` are the boundary labels. Backslash escapes `\n`, `\r` and `\t`;
//! any other escaped character stands for itself.

use grm_fst::{EPSILON, Label, Semiring, SymbolTable, TokenType, VectorFst, string_to_labels};
use tracing::trace;

use super::{Args, Function, FunctionContext, Registry, fst_value};
use crate::error::FunctionError;
use crate::labels::{BOS_LABEL, BOS_SYMBOL, EOS_LABEL, EOS_SYMBOL, LabelManager};
use crate::value::{FstWeight, Value};

const NAME: &str = "StringFst";

/// How the characters outside brackets are turned into labels.
#[derive(Debug, Clone, Copy)]
pub enum StringFstMode<'a> {
    Byte,
    Utf8,
    /// Whitespace-separated symbols; brackets have no special meaning.
    Symbols(&'a SymbolTable),
}

impl<'a> StringFstMode<'a> {
    fn token_type(self) -> TokenType<'a> {
        match self {
            StringFstMode::Byte => TokenType::Byte,
            StringFstMode::Utf8 => TokenType::Utf8,
            StringFstMode::Symbols(table) => TokenType::Symbol(table),
        }
    }
}

pub(super) fn register<W: FstWeight>(registry: &mut Registry<W>) {
    registry.register(StringFst);
}

/// `StringFst[mode, text]` or `StringFst[2, text, symbols]`, where mode
/// 0 is bytes, 1 is UTF-8 and 2 is a symbol table.
struct StringFst;

impl<W: FstWeight> Function<W> for StringFst {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, args: Vec<Value>, ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let mut args = Args::new(NAME, args, &[2, 3])?;
        let mode = args.int(0)?;
        let text = args.string(1)?;
        let table;
        let mode = match (mode, args.len()) {
            (0, 2) => StringFstMode::Byte,
            (1, 2) => StringFstMode::Utf8,
            (2, 3) => {
                if !args.is::<SymbolTable>(2) {
                    return Err(FunctionError::invalid(
                        NAME,
                        "Invalid symbol table for symbol table parse mode",
                    ));
                }
                table = args.symbol_table(2)?;
                StringFstMode::Symbols(&table)
            }
            (mode, got) => {
                return Err(FunctionError::invalid(
                    NAME,
                    format!("parse mode {mode} does not take {got} arguments"),
                ));
            }
        };
        let fst = compile_fst_string::<W>(&text, mode, ctx.labels)?;
        Ok(fst_value(fst))
    }
}

/// Compiles `text` into a linear acceptor, allocating generated labels
/// from `labels` as brackets are met.
pub fn compile_fst_string<W: Semiring>(
    text: &str,
    mode: StringFstMode<'_>,
    labels: &LabelManager,
) -> Result<VectorFst<W>, FunctionError> {
    let brackets = !matches!(mode, StringFstMode::Symbols(_));
    let mut out: Vec<Label> = Vec::new();
    let mut chunk = String::new();
    let mut in_label = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' if brackets => {
                if in_label {
                    return Err(FunctionError::invalid(
                        NAME,
                        "Cannot start new generated label while in previous label",
                    ));
                }
                flush(&mut chunk, mode, &mut out)?;
                in_label = true;
            }
            ']' if brackets => {
                if !in_label {
                    return Err(FunctionError::invalid(
                        NAME,
                        "Cannot terminate generated label without already being in one",
                    ));
                }
                if chunk.chars().any(char::is_whitespace) {
                    return Err(FunctionError::invalid(
                        NAME,
                        format!("Cannot have labels containing whitespace: {chunk}"),
                    ));
                }
                out.push(generated_label(&chunk, mode, labels)?);
                chunk.clear();
                in_label = false;
            }
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    FunctionError::invalid(NAME, "Unterminated escaped character at string end")
                })?;
                chunk.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
            }
            other => chunk.push(other),
        }
    }
    if in_label {
        return Err(FunctionError::invalid(
            NAME,
            "Unexpected string termination in generated label",
        ));
    }
    flush(&mut chunk, mode, &mut out)?;
    out.retain(|&label| label != EPSILON);
    Ok(VectorFst::from_labels(&out))
}

fn flush(chunk: &mut String, mode: StringFstMode<'_>, out: &mut Vec<Label>) -> Result<(), FunctionError> {
    let labels = string_to_labels(chunk, mode.token_type()).map_err(|source| FunctionError::Fst { name: NAME, source })?;
    out.extend(labels);
    chunk.clear();
    Ok(())
}

fn generated_label(symbol: &str, mode: StringFstMode<'_>, labels: &LabelManager) -> Result<Label, FunctionError> {
    if let Some(value) = parse_c_integer(symbol) {
        return Label::try_from(value)
            .map_err(|_| FunctionError::invalid(NAME, format!("label {value} is out of range")));
    }
    let single_character = match mode {
        StringFstMode::Utf8 => symbol.chars().count() == 1,
        _ => symbol.len() == 1,
    };
    if single_character {
        return Err(FunctionError::invalid(
            NAME,
            format!(
                "Single-character generated labels are not permitted. \
                 Replace \"[{symbol}]\" with just \"{symbol}\" in your grammar."
            ),
        ));
    }
    let label = match symbol {
        BOS_SYMBOL => BOS_LABEL,
        EOS_SYMBOL => EOS_LABEL,
        _ => labels
            .symbol_to_label(symbol)
            .map_err(|source| FunctionError::Labels { name: NAME, source })?,
    };
    trace!(symbol, label, "bracketed label");
    Ok(label)
}

/// Integer syntax of C's `strtol` with base 0: an optional sign, then a
/// `0x` prefix for hexadecimal, a leading `0` for octal, or decimal. The
/// empty string is zero. Anything left unparsed rejects the whole text.
fn parse_c_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() {
        return text.is_empty().then_some(0);
    }
    // from_str_radix accepts a sign of its own; only one is allowed.
    if digits.contains(['+', '-']) {
        return None;
    }
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}
