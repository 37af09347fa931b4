//! Named automata written by `grm compile` and read back by
//! `LoadFstFromFar` and `grm rewrite`, plus the single-automaton file
//! read by `LoadFst`.
//!
//! The on-disk form is JSON. Weights are stored as their numeric value,
//! with semiring zero written as an absent field, so the file never
//! contains infinities.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use grm_fst::ops::paths::paths;
use grm_fst::ops::{compose, connect, shortest_path};
use grm_fst::{Arc, Label, Semiring, StateId, SymbolTable, TokenType, VectorFst, labels_to_string};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::labels::GENERATED_SYMBOL_TABLE_NAME;
use crate::value::ArcKind;

#[derive(Debug, Clone)]
pub struct Archive<W: Semiring> {
    pub fsts: BTreeMap<String, VectorFst<W>>,
    /// Generated labels used by the automata, if any.
    pub generated: Option<SymbolTable>,
}

impl<W: Semiring> Default for Archive<W> {
    fn default() -> Self {
        Archive {
            fsts: BTreeMap::new(),
            generated: None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StoredArchive {
    arc_type: String,
    #[serde(default)]
    symbol_tables: BTreeMap<String, Vec<(String, Label)>>,
    #[serde(default)]
    fsts: BTreeMap<String, StoredFst>,
}

#[derive(Deserialize)]
struct ArchiveHeader {
    arc_type: String,
}

#[derive(Serialize, Deserialize)]
struct StoredFst {
    start: Option<StateId>,
    states: Vec<StoredState>,
}

/// One automaton on its own, tagged with its arc kind.
#[derive(Serialize, Deserialize)]
struct StoredStandalone {
    arc_type: String,
    #[serde(flatten)]
    fst: StoredFst,
}

#[derive(Serialize, Deserialize)]
struct StoredState {
    #[serde(rename = "final", default, skip_serializing_if = "Option::is_none")]
    final_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    arcs: Vec<StoredArc>,
}

#[derive(Serialize, Deserialize)]
struct StoredArc {
    ilabel: Label,
    olabel: Label,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
    nextstate: StateId,
}

fn store_weight<W: Semiring>(weight: W) -> Option<f64> {
    (!weight.is_zero()).then(|| weight.value())
}

fn load_weight<W: Semiring>(weight: Option<f64>) -> W {
    weight.map_or_else(W::zero, W::from_value)
}

impl StoredFst {
    fn from_fst<W: Semiring>(fst: &VectorFst<W>) -> Self {
        let states = fst
            .states()
            .map(|state| StoredState {
                final_weight: store_weight(fst.final_weight(state)),
                arcs: fst
                    .arcs(state)
                    .iter()
                    .map(|arc| StoredArc {
                        ilabel: arc.ilabel,
                        olabel: arc.olabel,
                        weight: store_weight(arc.weight),
                        nextstate: arc.nextstate,
                    })
                    .collect(),
            })
            .collect();
        StoredFst {
            start: fst.start(),
            states,
        }
    }

    fn into_fst<W: Semiring>(self, name: &str) -> Result<VectorFst<W>, String> {
        let num_states = self.states.len();
        let check = |state: StateId| {
            if (state as usize) < num_states {
                Ok(state)
            } else {
                Err(format!("rule '{name}' refers to state {state} of {num_states}"))
            }
        };
        let mut fst = VectorFst::new();
        for _ in 0..num_states {
            fst.add_state();
        }
        if let Some(start) = self.start {
            fst.set_start(check(start)?);
        }
        for (state, stored) in (0..).zip(self.states) {
            fst.set_final(state, load_weight(stored.final_weight));
            for arc in stored.arcs {
                let nextstate = check(arc.nextstate)?;
                fst.add_arc(state, Arc::new(arc.ilabel, arc.olabel, load_weight(arc.weight), nextstate));
            }
        }
        Ok(fst)
    }
}

fn malformed(path: &Path, message: impl std::fmt::Display) -> CoreError {
    CoreError::MalformedArchive {
        path: path.to_path_buf(),
        source: <serde_json::Error as serde::de::Error>::custom(message),
    }
}

impl<W: Semiring> Archive<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, fst: VectorFst<W>) {
        self.fsts.insert(name.into(), fst);
    }

    pub fn get(&self, name: &str) -> Option<&VectorFst<W>> {
        self.fsts.get(name)
    }

    pub fn take(&mut self, name: &str) -> Option<VectorFst<W>> {
        self.fsts.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.fsts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fsts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fsts.is_empty()
    }

    pub fn generated(&self) -> Option<&SymbolTable> {
        self.generated.as_ref()
    }

    /// Writes the archive, creating missing parent directories.
    pub fn write(&self, path: &Path) -> Result<(), CoreError> {
        let output_error = |source| CoreError::OutputIo {
            path: path.to_path_buf(),
            source,
        };
        let mut symbol_tables = BTreeMap::new();
        if let Some(table) = &self.generated {
            let pairs = table.iter().map(|(label, symbol)| (symbol.to_string(), label)).collect();
            symbol_tables.insert(GENERATED_SYMBOL_TABLE_NAME.to_string(), pairs);
        }
        let stored = StoredArchive {
            arc_type: W::ARC_TYPE.to_string(),
            symbol_tables,
            fsts: self
                .fsts
                .iter()
                .map(|(name, fst)| (name.clone(), StoredFst::from_fst(fst)))
                .collect(),
        };
        let bytes = serde_json::to_vec(&stored).map_err(|err| output_error(std::io::Error::other(err)))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(output_error)?;
        }
        fs::write(path, bytes).map_err(output_error)?;
        info!(path = %path.display(), rules = self.fsts.len(), arc_type = W::ARC_TYPE, "wrote archive");
        Ok(())
    }

    /// Reads an archive, which must hold automata of this weight's arc
    /// kind.
    pub fn read(path: &Path) -> Result<Self, CoreError> {
        let bytes = fs::read(path).map_err(|source| CoreError::SourceIo {
            path: path.to_path_buf(),
            source,
        })?;
        let stored: StoredArchive = serde_json::from_slice(&bytes).map_err(|source| CoreError::MalformedArchive {
            path: path.to_path_buf(),
            source,
        })?;
        if stored.arc_type != W::ARC_TYPE {
            return Err(CoreError::ArcTypeMismatch {
                expected: W::ARC_TYPE.to_string(),
                found: stored.arc_type,
            });
        }
        let mut symbol_tables = stored.symbol_tables;
        let generated = symbol_tables.remove(GENERATED_SYMBOL_TABLE_NAME).map(|pairs| {
            let mut table = SymbolTable::new(GENERATED_SYMBOL_TABLE_NAME);
            for (symbol, label) in pairs {
                table.add_symbol(symbol, label);
            }
            table
        });
        let mut fsts = BTreeMap::new();
        for (name, stored) in stored.fsts {
            let fst = stored.into_fst(&name).map_err(|message| malformed(path, message))?;
            fsts.insert(name, fst);
        }
        debug!(path = %path.display(), rules = fsts.len(), "read archive");
        Ok(Archive { fsts, generated })
    }

    /// Applies the named rules in order to `input`.
    pub fn rewrite(&self, rules: &[&str], input: &VectorFst<W>) -> Result<VectorFst<W>, CoreError> {
        let mut current = input.clone();
        for &rule in rules {
            let fst = self.get(rule).ok_or_else(|| CoreError::MissingRule(rule.to_string()))?;
            current = compose(&current, fst);
            connect(&mut current);
        }
        Ok(current)
    }

    /// Up to `n` distinct output strings of `lattice`, cheapest first.
    /// Generated labels print as `[symbol]`.
    pub fn best_strings(
        &self,
        lattice: &VectorFst<W>,
        n: usize,
        token_type: TokenType<'_>,
    ) -> Result<Vec<(String, W)>, CoreError> {
        let mut outputs = lattice.clone();
        grm_fst::ops::project(&mut outputs, grm_fst::ops::ProjectType::Output);
        let best = shortest_path(&outputs, n, true);
        let mut found = paths(&best, n);
        found.sort_by(|a, b| a.weight.value().total_cmp(&b.weight.value()));
        found
            .into_iter()
            .map(|path| -> Result<(String, W), CoreError> {
                let text = labels_to_string(&path.olabels, token_type, self.generated.as_ref())?;
                Ok((text, path.weight))
            })
            .collect()
    }
}

/// Writes `fst` as a standalone automaton file.
pub fn write_fst<W: Semiring>(fst: &VectorFst<W>, path: &Path) -> Result<(), CoreError> {
    let output_error = |source| CoreError::OutputIo {
        path: path.to_path_buf(),
        source,
    };
    let stored = StoredStandalone {
        arc_type: W::ARC_TYPE.to_string(),
        fst: StoredFst::from_fst(fst),
    };
    let bytes = serde_json::to_vec(&stored).map_err(|err| output_error(std::io::Error::other(err)))?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(output_error)?;
    }
    fs::write(path, bytes).map_err(output_error)?;
    debug!(path = %path.display(), states = fst.num_states(), "wrote automaton");
    Ok(())
}

/// Reads a standalone automaton file of this weight's arc kind.
pub fn read_fst<W: Semiring>(path: &Path) -> Result<VectorFst<W>, CoreError> {
    let bytes = fs::read(path).map_err(|source| CoreError::SourceIo {
        path: path.to_path_buf(),
        source,
    })?;
    let stored: StoredStandalone = serde_json::from_slice(&bytes).map_err(|source| CoreError::MalformedArchive {
        path: path.to_path_buf(),
        source,
    })?;
    if stored.arc_type != W::ARC_TYPE {
        return Err(CoreError::ArcTypeMismatch {
            expected: W::ARC_TYPE.to_string(),
            found: stored.arc_type,
        });
    }
    let name = path.display().to_string();
    stored.fst.into_fst(&name).map_err(|message| malformed(path, message))
}

/// The arc kind recorded in an archive, read without loading its rules.
pub fn peek_arc_type(path: &Path) -> Result<ArcKind, CoreError> {
    let bytes = fs::read(path).map_err(|source| CoreError::SourceIo {
        path: path.to_path_buf(),
        source,
    })?;
    let header: ArchiveHeader = serde_json::from_slice(&bytes).map_err(|source| CoreError::MalformedArchive {
        path: path.to_path_buf(),
        source,
    })?;
    header.arc_type.parse()
}
