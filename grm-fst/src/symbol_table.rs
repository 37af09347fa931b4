use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use crate::error::FstError;
use crate::fst::Label;

/// A named, bidirectional map between symbols and integer keys.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolTable {
    name: String,
    symbols: HashMap<String, Label>,
    keys: BTreeMap<Label, String>,
}

impl SymbolTable {
    pub fn new(name: impl Into<String>) -> Self {
        SymbolTable {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts `symbol` under `key`, replacing whatever either side was
    /// bound to before.
    pub fn add_symbol(&mut self, symbol: impl Into<String>, key: Label) {
        let symbol = symbol.into();
        if let Some(old_key) = self.symbols.remove(&symbol) {
            self.keys.remove(&old_key);
        }
        if let Some(old_symbol) = self.keys.remove(&key) {
            self.symbols.remove(&old_symbol);
        }
        self.symbols.insert(symbol.clone(), key);
        self.keys.insert(key, symbol);
    }

    pub fn find_key(&self, symbol: &str) -> Option<Label> {
        self.symbols.get(symbol).copied()
    }

    pub fn find_symbol(&self, key: Label) -> Option<&str> {
        self.keys.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, &str)> + '_ {
        self.keys.iter().map(|(key, symbol)| (*key, symbol.as_str()))
    }

    /// Parses the text form: one `symbol key` pair per line, separated by
    /// tabs or spaces. Blank lines are skipped.
    pub fn read_text(name: impl Into<String>, text: &str) -> Result<Self, FstError> {
        let mut table = SymbolTable::new(name);
        for (index, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split(['\t', ' ']).filter(|f| !f.is_empty());
            let (Some(symbol), Some(key), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(FstError::MalformedSymbolTable {
                    line: index + 1,
                    text: line.to_string(),
                });
            };
            let key = key.parse::<Label>().map_err(|_| FstError::MalformedSymbolTable {
                line: index + 1,
                text: line.to_string(),
            })?;
            table.add_symbol(symbol, key);
        }
        Ok(table)
    }

    pub fn write_text(&self) -> String {
        let mut out = String::new();
        for (key, symbol) in self.iter() {
            let _ = writeln!(out, "{symbol}\t{key}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tab_and_space_separated_pairs() {
        let table = SymbolTable::read_text("t", "<eps>\t0\nfoo 1\n\nbar\t2\n").expect("read");
        assert_eq!(table.len(), 3);
        assert_eq!(table.find_key("foo"), Some(1));
        assert_eq!(table.find_symbol(2), Some("bar"));
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = SymbolTable::read_text("t", "foo\n").unwrap_err();
        assert!(matches!(err, FstError::MalformedSymbolTable { line: 1, .. }));
        assert!(SymbolTable::read_text("t", "foo x\n").is_err());
    }

    #[test]
    fn text_form_round_trips() {
        let mut table = SymbolTable::new("t");
        table.add_symbol("a", 5);
        table.add_symbol("b", 3);
        let reread = SymbolTable::read_text("t", &table.write_text()).expect("read");
        assert_eq!(reread, table);
    }

    #[test]
    fn rebinding_a_key_drops_the_old_symbol() {
        let mut table = SymbolTable::new("t");
        table.add_symbol("a", 1);
        table.add_symbol("b", 1);
        assert_eq!(table.find_symbol(1), Some("b"));
        assert_eq!(table.find_key("a"), None);
    }
}
