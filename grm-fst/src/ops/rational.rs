//! Union, concatenation and closure, all destructive on their first
//! argument.

use crate::fst::{Arc, EPSILON, VectorFst};
use crate::semiring::Semiring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureType {
    /// Zero or more repetitions.
    Star,
    /// One or more repetitions.
    Plus,
}

/// Replaces `fst` with `fst | other`.
pub fn union<W: Semiring>(fst: &mut VectorFst<W>, other: &VectorFst<W>) {
    let Some(other_start) = other.start() else {
        return;
    };
    let Some(start) = fst.start() else {
        *fst = other.clone();
        return;
    };
    let offset = fst.append(other);
    let new_start = fst.add_state();
    fst.add_arc(new_start, Arc::new(EPSILON, EPSILON, W::one(), start));
    fst.add_arc(
        new_start,
        Arc::new(EPSILON, EPSILON, W::one(), other_start + offset),
    );
    fst.set_start(new_start);
}

/// Replaces `fst` with `fst other`.
pub fn concat<W: Semiring>(fst: &mut VectorFst<W>, other: &VectorFst<W>) {
    if fst.start().is_none() {
        return;
    }
    let Some(other_start) = other.start() else {
        fst.clear();
        return;
    };
    let original = fst.states();
    let offset = fst.append(other);
    for s in original {
        if fst.is_final(s) {
            let weight = fst.final_weight(s);
            fst.add_arc(s, Arc::new(EPSILON, EPSILON, weight, other_start + offset));
            fst.set_final(s, W::zero());
        }
    }
}

/// Replaces `fst` with `other fst`.
pub fn concat_left<W: Semiring>(other: &VectorFst<W>, fst: &mut VectorFst<W>) {
    let mut out = other.clone();
    concat(&mut out, fst);
    *fst = out;
}

pub fn closure<W: Semiring>(fst: &mut VectorFst<W>, closure_type: ClosureType) {
    let Some(start) = fst.start() else {
        if closure_type == ClosureType::Star {
            *fst = VectorFst::epsilon();
        }
        return;
    };
    for s in fst.states() {
        if fst.is_final(s) {
            let weight = fst.final_weight(s);
            fst.add_arc(s, Arc::new(EPSILON, EPSILON, weight, start));
        }
    }
    if closure_type == ClosureType::Star {
        let new_start = fst.add_state();
        fst.set_final(new_start, W::one());
        fst.add_arc(new_start, Arc::new(EPSILON, EPSILON, W::one(), start));
        fst.set_start(new_start);
    }
}

/// Bounded repetition `fst{lower,upper}`. An `upper` of zero means no
/// upper bound.
pub fn concat_range<W: Semiring>(fst: &mut VectorFst<W>, lower: u32, upper: u32) {
    if fst.start().is_none() {
        return;
    }
    let copy = fst.clone();
    let optional = |fst: &mut VectorFst<W>| union(fst, &VectorFst::epsilon());
    if upper == 0 {
        closure(fst, ClosureType::Star);
        for _ in 0..lower {
            concat_left(&copy, fst);
        }
    } else if lower == 0 {
        for _ in 1..upper {
            optional(fst);
            concat_left(&copy, fst);
        }
        optional(fst);
    } else {
        for _ in lower..upper {
            optional(fst);
            concat_left(&copy, fst);
        }
        for _ in 1..lower {
            concat_left(&copy, fst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fst::Label;
    use crate::ops::paths::accepts;
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    fn acceptor(labels: &[Label]) -> VectorFst<W> {
        VectorFst::from_labels(labels)
    }

    #[test]
    fn union_accepts_both_sides() {
        let mut fst = acceptor(&[1]);
        union(&mut fst, &acceptor(&[2, 3]));
        assert!(accepts(&fst, &[1]));
        assert!(accepts(&fst, &[2, 3]));
        assert!(!accepts(&fst, &[2]));
    }

    #[test]
    fn concat_with_empty_language_is_empty() {
        let mut fst = acceptor(&[1]);
        concat(&mut fst, &VectorFst::new());
        assert!(fst.start().is_none());
    }

    #[test]
    fn concat_joins_strings() {
        let mut fst = acceptor(&[1]);
        concat(&mut fst, &acceptor(&[2]));
        assert!(accepts(&fst, &[1, 2]));
        assert!(!accepts(&fst, &[1]));
    }

    #[test]
    fn star_and_plus_closure() {
        let mut star = acceptor(&[1]);
        closure(&mut star, ClosureType::Star);
        assert!(accepts(&star, &[]));
        assert!(accepts(&star, &[1, 1, 1]));

        let mut plus = acceptor(&[1]);
        closure(&mut plus, ClosureType::Plus);
        assert!(!accepts(&plus, &[]));
        assert!(accepts(&plus, &[1, 1]));
    }

    #[test]
    fn bounded_range_counts_repetitions() {
        let mut fst = acceptor(&[1]);
        concat_range(&mut fst, 2, 3);
        assert!(!accepts(&fst, &[1]));
        assert!(accepts(&fst, &[1, 1]));
        assert!(accepts(&fst, &[1, 1, 1]));
        assert!(!accepts(&fst, &[1, 1, 1, 1]));
    }

    #[test]
    fn range_with_zero_lower_bound_is_optional() {
        let mut fst = acceptor(&[1]);
        concat_range(&mut fst, 0, 2);
        assert!(accepts(&fst, &[]));
        assert!(accepts(&fst, &[1, 1]));
        assert!(!accepts(&fst, &[1, 1, 1]));
    }

    #[test]
    fn unbounded_range_requires_lower_copies() {
        let mut fst = acceptor(&[1]);
        concat_range(&mut fst, 2, 0);
        assert!(!accepts(&fst, &[1]));
        assert!(accepts(&fst, &[1, 1]));
        assert!(accepts(&fst, &[1, 1, 1, 1, 1]));
    }
}
