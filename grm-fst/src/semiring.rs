//! Weight semirings.
//!
//! All three semirings share the same carrier, non-negative costs
//! extended with `+inf`: `zero` is `+inf`, `one` is `0` and `times` is
//! addition of costs. They differ only in `plus`: the tropical semiring
//! keeps the cheaper alternative, the log semirings add the underlying
//! probabilities.

use std::fmt;

/// Default comparison tolerance, the same one used by epsilon removal
/// and weight quantization.
pub const DELTA: f64 = 1.0 / 1024.0;

pub trait Semiring:
    Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Name of the arc kind this weight belongs to (`standard`, `log`,
    /// `log64`).
    const ARC_TYPE: &'static str;

    fn zero() -> Self;
    fn one() -> Self;
    fn plus(&self, rhs: &Self) -> Self;
    fn times(&self, rhs: &Self) -> Self;

    /// Residual `self ⊘ rhs`, defined whenever `rhs` is not zero.
    fn divide(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        Self::from_value(self.value() - rhs.value())
    }

    fn value(&self) -> f64;
    fn from_value(value: f64) -> Self;

    fn is_zero(&self) -> bool {
        self.value() == f64::INFINITY
    }

    fn is_one(&self) -> bool {
        self.value() == 0.0
    }

    fn approx_eq(&self, other: &Self, delta: f64) -> bool {
        let (a, b) = (self.value(), other.value());
        if a.is_infinite() || b.is_infinite() {
            return a == b;
        }
        (a - b).abs() <= delta
    }

    /// Integer bucket used to compare weights as hash keys.
    fn quantize(&self, delta: f64) -> i64 {
        let value = self.value();
        if value.is_infinite() {
            if value > 0.0 { i64::MAX } else { i64::MIN }
        } else {
            (value / delta).round() as i64
        }
    }

    /// Parses the textual form used inside `<...>` weight annotations.
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            "inf" | "Infinity" | "+inf" => Some(Self::zero()),
            _ => text.parse::<f64>().ok().map(Self::from_value),
        }
    }

    /// `true` when `self` is strictly better (cheaper) than `other`.
    fn less(&self, other: &Self) -> bool {
        self.value() < other.value()
    }
}

fn log_plus(a: f64, b: f64) -> f64 {
    if a == f64::INFINITY {
        return b;
    }
    if b == f64::INFINITY {
        return a;
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    lo - (-(hi - lo)).exp().ln_1p()
}

fn fmt_cost(value: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value == f64::INFINITY {
        write!(f, "Infinity")
    } else {
        write!(f, "{value}")
    }
}

/// Tropical weight over `f32`, the weight of the `standard` arc kind.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TropicalWeight(pub f32);

impl Semiring for TropicalWeight {
    const ARC_TYPE: &'static str = "standard";

    fn zero() -> Self {
        TropicalWeight(f32::INFINITY)
    }

    fn one() -> Self {
        TropicalWeight(0.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        if self.0 <= rhs.0 { *self } else { *rhs }
    }

    fn times(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        TropicalWeight(self.0 + rhs.0)
    }

    fn value(&self) -> f64 {
        f64::from(self.0)
    }

    fn from_value(value: f64) -> Self {
        TropicalWeight(value as f32)
    }
}

impl fmt::Display for TropicalWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_cost(self.value(), f)
    }
}

/// Log weight over `f32`, the weight of the `log` arc kind.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LogWeight(pub f32);

impl Semiring for LogWeight {
    const ARC_TYPE: &'static str = "log";

    fn zero() -> Self {
        LogWeight(f32::INFINITY)
    }

    fn one() -> Self {
        LogWeight(0.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        LogWeight(log_plus(self.value(), rhs.value()) as f32)
    }

    fn times(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        LogWeight(self.0 + rhs.0)
    }

    fn value(&self) -> f64 {
        f64::from(self.0)
    }

    fn from_value(value: f64) -> Self {
        LogWeight(value as f32)
    }
}

impl fmt::Display for LogWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_cost(self.value(), f)
    }
}

/// Log weight over `f64`, the weight of the `log64` arc kind.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Log64Weight(pub f64);

impl Semiring for Log64Weight {
    const ARC_TYPE: &'static str = "log64";

    fn zero() -> Self {
        Log64Weight(f64::INFINITY)
    }

    fn one() -> Self {
        Log64Weight(0.0)
    }

    fn plus(&self, rhs: &Self) -> Self {
        Log64Weight(log_plus(self.0, rhs.0))
    }

    fn times(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        Log64Weight(self.0 + rhs.0)
    }

    fn value(&self) -> f64 {
        self.0
    }

    fn from_value(value: f64) -> Self {
        Log64Weight(value)
    }
}

impl fmt::Display for Log64Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_cost(self.value(), f)
    }
}
