//! Conversions between text and label sequences.

use crate::error::FstError;
use crate::fst::{Label, VectorFst};
use crate::semiring::Semiring;
use crate::symbol_table::SymbolTable;

/// How text is split into labels.
#[derive(Debug, Clone, Copy)]
pub enum TokenType<'a> {
    /// One label per byte.
    Byte,
    /// One label per Unicode scalar value.
    Utf8,
    /// Whitespace-separated tokens looked up in a symbol table.
    Symbol(&'a SymbolTable),
}

pub fn string_to_labels(text: &str, token_type: TokenType<'_>) -> Result<Vec<Label>, FstError> {
    match token_type {
        TokenType::Byte => Ok(text.bytes().map(Label::from).collect()),
        TokenType::Utf8 => Ok(text.chars().map(|c| c as Label).collect()),
        TokenType::Symbol(table) => text
            .split_whitespace()
            .map(|token| {
                table
                    .find_key(token)
                    .ok_or_else(|| FstError::MissingSymbol(token.to_string()))
            })
            .collect(),
    }
}

/// Compiles `text` into a linear acceptor.
pub fn compile_string<W: Semiring>(
    text: &str,
    token_type: TokenType<'_>,
) -> Result<VectorFst<W>, FstError> {
    let labels = string_to_labels(text, token_type)?;
    Ok(VectorFst::from_labels(&labels))
}

/// Renders labels back to text. Labels found in `generated` print as
/// `[symbol]`, which lets generated labels survive byte and UTF-8 output.
pub fn labels_to_string(
    labels: &[Label],
    token_type: TokenType<'_>,
    generated: Option<&SymbolTable>,
) -> Result<String, FstError> {
    let generated_symbol = |label: Label| generated.and_then(|table| table.find_symbol(label));
    match token_type {
        TokenType::Byte => {
            let mut bytes = Vec::with_capacity(labels.len());
            for &label in labels {
                if let Some(symbol) = generated_symbol(label) {
                    bytes.push(b'[');
                    bytes.extend_from_slice(symbol.as_bytes());
                    bytes.push(b']');
                } else {
                    let byte = u8::try_from(label).map_err(|_| FstError::InvalidCodePoint(label))?;
                    bytes.push(byte);
                }
            }
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        TokenType::Utf8 => {
            let mut out = String::new();
            for &label in labels {
                if let Some(symbol) = generated_symbol(label) {
                    out.push('[');
                    out.push_str(symbol);
                    out.push(']');
                } else {
                    out.push(char::from_u32(label).ok_or(FstError::InvalidCodePoint(label))?);
                }
            }
            Ok(out)
        }
        TokenType::Symbol(table) => {
            let symbols = labels
                .iter()
                .map(|&label| {
                    table
                        .find_symbol(label)
                        .or_else(|| generated_symbol(label))
                        .ok_or(FstError::MissingLabel(label))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(symbols.join(" "))
        }
    }
}
