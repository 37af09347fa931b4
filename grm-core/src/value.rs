//! The tagged value flowing through the evaluator.
//!
//! Every rule, argument and function result is a [`Value`]. Accessors
//! are checked: asking for a variant that is not active is a bug in the
//! caller, which must test with [`Value::is`] first, so [`Value::get`]
//! panics instead of returning an error.

use std::fmt;
use std::str::FromStr;

use grm_fst::{Fst, Log64Weight, LogWeight, Semiring, SymbolTable, TropicalWeight};

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub enum Value {
    StdFst(Fst<TropicalWeight>),
    LogFst(Fst<LogWeight>),
    Log64Fst(Fst<Log64Weight>),
    SymbolTable(SymbolTable),
    String(String),
    Int(i32),
}

/// The arc kinds a grammar can be compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArcKind {
    #[default]
    Standard,
    Log,
    Log64,
}

impl ArcKind {
    pub fn name(self) -> &'static str {
        match self {
            ArcKind::Standard => TropicalWeight::ARC_TYPE,
            ArcKind::Log => LogWeight::ARC_TYPE,
            ArcKind::Log64 => Log64Weight::ARC_TYPE,
        }
    }
}

impl FromStr for ArcKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(ArcKind::Standard),
            "log" => Ok(ArcKind::Log),
            "log64" => Ok(ArcKind::Log64),
            other => Err(CoreError::UnsupportedArcType(other.to_string())),
        }
    }
}

impl fmt::Display for ArcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A weight whose automata have their own [`Value`] variant.
pub trait FstWeight: Semiring {
    const KIND: ArcKind;

    fn into_value(fst: Fst<Self>) -> Value;
    fn as_fst(value: &Value) -> Option<&Fst<Self>>;
    fn into_fst(value: Value) -> Result<Fst<Self>, Value>;
}

macro_rules! fst_weight {
    ($weight:ty, $kind:ident, $variant:ident) => {
        impl FstWeight for $weight {
            const KIND: ArcKind = ArcKind::$kind;

            fn into_value(fst: Fst<Self>) -> Value {
                Value::$variant(fst)
            }

            fn as_fst(value: &Value) -> Option<&Fst<Self>> {
                match value {
                    Value::$variant(fst) => Some(fst),
                    _ => None,
                }
            }

            fn into_fst(value: Value) -> Result<Fst<Self>, Value> {
                match value {
                    Value::$variant(fst) => Ok(fst),
                    other => Err(other),
                }
            }
        }
    };
}

fst_weight!(TropicalWeight, Standard, StdFst);
fst_weight!(LogWeight, Log, LogFst);
fst_weight!(Log64Weight, Log64, Log64Fst);

/// A type that can be the active variant of a [`Value`].
pub trait ValueKind: Sized {
    const NAME: &'static str;

    fn extract(value: &Value) -> Option<&Self>;
    fn take(value: Value) -> Result<Self, Value>;
}

impl<W: FstWeight> ValueKind for Fst<W> {
    const NAME: &'static str = "FST";

    fn extract(value: &Value) -> Option<&Self> {
        W::as_fst(value)
    }

    fn take(value: Value) -> Result<Self, Value> {
        W::into_fst(value)
    }
}

macro_rules! value_kind {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ValueKind for $ty {
            const NAME: &'static str = $name;

            fn extract(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn take(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

value_kind!(SymbolTable, SymbolTable, "symbol table");
value_kind!(String, String, "string");
value_kind!(i32, Int, "int");

impl Value {
    pub fn is<T: ValueKind>(&self) -> bool {
        T::extract(self).is_some()
    }

    /// # Panics
    ///
    /// Panics when `T` is not the active variant.
    pub fn get<T: ValueKind>(&self) -> &T {
        match T::extract(self) {
            Some(inner) => inner,
            None => panic!("value holds {}, not {}", self.kind_name(), T::NAME),
        }
    }

    /// Moves the payload out, handing the value back on a mismatch.
    pub fn take<T: ValueKind>(self) -> Result<T, Value> {
        T::take(self)
    }

    /// Deep copy. Materialized automata are cloned state by state; delayed
    /// views share their operands, which are never mutated.
    pub fn copy(&self) -> Value {
        self.clone()
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::StdFst(_) => "standard FST",
            Value::LogFst(_) => "log FST",
            Value::Log64Fst(_) => "log64 FST",
            Value::SymbolTable(_) => "symbol table",
            Value::String(_) => "string",
            Value::Int(_) => "int",
        }
    }

    pub fn is_fst(&self) -> bool {
        matches!(self, Value::StdFst(_) | Value::LogFst(_) | Value::Log64Fst(_))
    }
}

impl<W: FstWeight> From<Fst<W>> for Value {
    fn from(fst: Fst<W>) -> Self {
        W::into_value(fst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grm_fst::VectorFst;

    #[test]
    fn checked_access_matches_active_variant() {
        let value = Value::from(Fst::from(VectorFst::<TropicalWeight>::from_labels(&[1])));
        assert!(value.is::<Fst<TropicalWeight>>());
        assert!(!value.is::<Fst<LogWeight>>());
        assert!(!value.is::<String>());
        assert_eq!(value.get::<Fst<TropicalWeight>>().vector().num_states(), 2);
    }

    #[test]
    #[should_panic(expected = "value holds string, not int")]
    fn mismatched_get_panics() {
        let value = Value::String("x".to_string());
        let _ = value.get::<i32>();
    }

    #[test]
    fn copy_is_independent() {
        let original = Value::from(Fst::from(VectorFst::<LogWeight>::from_labels(&[1, 2])));
        let copy = original.copy();
        let mut fst = copy.take::<Fst<LogWeight>>().expect("fst").into_vector();
        fst.add_state();
        assert_eq!(original.get::<Fst<LogWeight>>().vector().num_states(), 3);
        assert_eq!(fst.num_states(), 4);
    }

    #[test]
    fn arc_kind_round_trips_names() {
        for kind in [ArcKind::Standard, ArcKind::Log, ArcKind::Log64] {
            assert_eq!(kind.name().parse::<ArcKind>().expect("kind"), kind);
        }
        assert!("tropical".parse::<ArcKind>().is_err());
    }
}
