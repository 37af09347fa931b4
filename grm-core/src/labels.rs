//! Labels generated for bracketed symbols such as `"[foo]"`.
//!
//! One [`LabelManager`] serves a whole compilation. Generated labels live
//! in a private-use range above every Unicode scalar that appears in
//! ordinary text. Tables loaded from other archives are merged in, and
//! labels that collide are recorded in a remap table so that automata
//! from those archives can be relabeled.

use std::collections::BTreeMap;

use grm_fst::{Label, SymbolTable};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

pub const GENERATED_LABEL_START: Label = 0x100000;
pub const GENERATED_LABEL_END: Label = 0x10fffb;

pub const BOS_SYMBOL: &str = "BOS";
pub const BOS_LABEL: Label = 0x10fffc;
pub const EOS_SYMBOL: &str = "EOS";
pub const EOS_LABEL: Label = 0x10fffd;

/// Name under which the generated table is stored in archives.
pub const GENERATED_SYMBOL_TABLE_NAME: &str = "*StringFstSymbolTable";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("exceeded maximum number of generated labels")]
    Exhausted,
    #[error("detected label mismatch: {symbol} -> {existing_label}, {label} -> {existing_symbol}")]
    Mismatch {
        symbol: String,
        label: Label,
        existing_label: Label,
        existing_symbol: String,
    },
}

#[derive(Debug)]
struct Tables {
    symbol_to_label: BTreeMap<String, Label>,
    label_to_symbol: BTreeMap<Label, String>,
    remap: BTreeMap<Label, Label>,
    next_label: Label,
}

impl Tables {
    fn new() -> Self {
        Tables {
            symbol_to_label: BTreeMap::new(),
            label_to_symbol: BTreeMap::new(),
            remap: BTreeMap::new(),
            next_label: GENERATED_LABEL_START,
        }
    }

    fn allocate(&mut self, symbol: &str) -> Result<Label, LabelError> {
        if self.next_label > GENERATED_LABEL_END {
            warn!(symbol, "generated label range exhausted");
            return Err(LabelError::Exhausted);
        }
        let label = self.next_label;
        self.next_label += 1;
        self.bind(symbol, label);
        Ok(label)
    }

    fn bind(&mut self, symbol: &str, label: Label) {
        self.symbol_to_label.insert(symbol.to_string(), label);
        self.label_to_symbol.insert(label, symbol.to_string());
    }
}

#[derive(Debug)]
pub struct LabelManager {
    tables: Mutex<Tables>,
}

impl Default for LabelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelManager {
    pub fn new() -> Self {
        LabelManager {
            tables: Mutex::new(Tables::new()),
        }
    }

    /// The label of `symbol`, allocating the next free one on first use.
    /// `BOS` and `EOS` map to fixed labels outside the table.
    pub fn symbol_to_label(&self, symbol: &str) -> Result<Label, LabelError> {
        match symbol {
            BOS_SYMBOL => return Ok(BOS_LABEL),
            EOS_SYMBOL => return Ok(EOS_LABEL),
            _ => {}
        }
        let mut tables = self.tables.lock();
        if let Some(&label) = tables.symbol_to_label.get(symbol) {
            return Ok(label);
        }
        let label = tables.allocate(symbol)?;
        debug!(symbol, label, "assigned generated label");
        Ok(label)
    }

    pub fn find_label(&self, symbol: &str) -> Option<Label> {
        self.tables.lock().symbol_to_label.get(symbol).copied()
    }

    pub fn find_symbol(&self, label: Label) -> Option<String> {
        self.tables.lock().label_to_symbol.get(&label).cloned()
    }

    /// Merges a table produced by another compilation. Every pair is
    /// processed; the first inconsistency found is returned after the
    /// rest of the table has been merged.
    pub fn merge(&self, other: &SymbolTable) -> Result<(), LabelError> {
        let mut tables = self.tables.lock();
        let mut failure = None;
        for (label, symbol) in other.iter() {
            let known_label = tables.symbol_to_label.get(symbol).copied();
            let known_symbol = tables.label_to_symbol.get(&label).cloned();
            match (known_label, known_symbol) {
                (None, None) => {
                    tables.bind(symbol, label);
                    if tables.next_label <= label {
                        tables.next_label = label + 1;
                    }
                    debug!(symbol, label, "loaded generated label");
                }
                (None, Some(_)) => {
                    let fresh = tables.allocate(symbol)?;
                    tables.remap.insert(label, fresh);
                    debug!(symbol, from = label, to = fresh, "remapped to new label");
                }
                (Some(existing), None) => {
                    tables.remap.insert(label, existing);
                    debug!(symbol, from = label, to = existing, "remapped to existing label");
                }
                (Some(existing_label), Some(existing_symbol)) => {
                    let label_agrees = existing_label == label;
                    let symbol_agrees = existing_symbol == symbol;
                    if label_agrees && symbol_agrees {
                        continue;
                    }
                    if label_agrees || symbol_agrees {
                        warn!(symbol, label, existing_label, %existing_symbol, "label mismatch");
                        failure.get_or_insert(LabelError::Mismatch {
                            symbol: symbol.to_string(),
                            label,
                            existing_label,
                            existing_symbol,
                        });
                    } else {
                        tables.remap.insert(label, existing_label);
                        debug!(symbol, from = label, to = existing_label, "remapped to existing label");
                    }
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn find_remap(&self, label: Label) -> Option<Label> {
        self.tables.lock().remap.get(&label).copied()
    }

    pub fn remap_table(&self) -> BTreeMap<Label, Label> {
        self.tables.lock().remap.clone()
    }

    pub fn clear_remap(&self) {
        self.tables.lock().remap.clear();
    }

    /// The generated symbols as a table, or `None` if none were used.
    pub fn to_symbol_table(&self) -> Option<SymbolTable> {
        let tables = self.tables.lock();
        if tables.symbol_to_label.is_empty() {
            return None;
        }
        let mut table = SymbolTable::new(GENERATED_SYMBOL_TABLE_NAME);
        for (symbol, &label) in &tables.symbol_to_label {
            table.add_symbol(symbol.clone(), label);
        }
        Some(table)
    }

    pub fn len(&self) -> usize {
        self.tables.lock().symbol_to_label.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every symbol and restarts allocation at the range start.
    pub fn reset(&self) {
        *self.tables.lock() = Tables::new();
    }
}
