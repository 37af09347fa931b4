use std::collections::{HashMap, VecDeque};

use crate::error::FstError;
use crate::fst::{Arc, EPSILON, Label, StateId, VectorFst};
use crate::ops::{ProjectType, compose, connect, determinize, project, rm_weight, union};
use crate::semiring::Semiring;

/// Paths of `fst` whose output string is not accepted by `subtrahend`,
/// which must be an unweighted acceptor.
pub fn difference<W: Semiring>(
    fst: &VectorFst<W>,
    subtrahend: &VectorFst<W>,
) -> Result<VectorFst<W>, FstError> {
    if !subtrahend.is_acceptor() || !subtrahend.is_unweighted() {
        return Err(FstError::NotUnweightedAcceptor);
    }
    let mut out = VectorFst::new();
    let Some(start) = fst.start() else {
        return Ok(out);
    };
    let dfa = determinize(subtrahend);
    let transitions: Vec<HashMap<Label, StateId>> = dfa
        .states()
        .map(|s| dfa.arcs(s).iter().map(|a| (a.ilabel, a.nextstate)).collect())
        .collect();

    // `None` on the right means the output already left the subtrahend.
    type Pair = (StateId, Option<StateId>);
    let mut index: HashMap<Pair, StateId> = HashMap::new();
    let mut queue: VecDeque<Pair> = VecDeque::new();
    let mut intern = |pair: Pair, out: &mut VectorFst<W>, queue: &mut VecDeque<Pair>| {
        *index.entry(pair).or_insert_with(|| {
            queue.push_back(pair);
            out.add_state()
        })
    };

    let initial = (start, dfa.start());
    let start_state = intern(initial, &mut out, &mut queue);
    out.set_start(start_state);
    while let Some(pair) = queue.pop_front() {
        let (q, d) = pair;
        let source = intern(pair, &mut out, &mut queue);
        let rejected = d.is_none_or(|d| !dfa.is_final(d));
        if fst.is_final(q) && rejected {
            out.set_final(source, fst.final_weight(q));
        }
        for arc in fst.arcs(q) {
            let next_d = if arc.olabel == EPSILON {
                d
            } else {
                d.and_then(|d| transitions[d as usize].get(&arc.olabel).copied())
            };
            let target = intern((arc.nextstate, next_d), &mut out, &mut queue);
            out.add_arc(source, Arc::new(arc.ilabel, arc.olabel, arc.weight, target));
        }
    }
    connect(&mut out);
    Ok(out)
}

/// Priority union: `preferred` wherever its input side is defined, and
/// `fallback` on the rest of `sigma_star`.
pub fn priority_union<W: Semiring>(
    preferred: &VectorFst<W>,
    fallback: &VectorFst<W>,
    sigma_star: &VectorFst<W>,
) -> Result<VectorFst<W>, FstError> {
    let mut domain = preferred.clone();
    project(&mut domain, ProjectType::Input);
    rm_weight(&mut domain);
    let outside = difference(sigma_star, &domain)?;
    let mut out = preferred.clone();
    union(&mut out, &compose(&outside, fallback));
    Ok(out)
}

/// Lenient composition: `fst ∘ constraint` where that composition is
/// defined, and `fst` unchanged elsewhere.
pub fn lenient_compose<W: Semiring>(
    fst: &VectorFst<W>,
    constraint: &VectorFst<W>,
    sigma_star: &VectorFst<W>,
) -> Result<VectorFst<W>, FstError> {
    let composed = compose(fst, constraint);
    priority_union(&composed, fst, sigma_star)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::paths::{accepts, transduce};
    use crate::ops::{ClosureType, closure};
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    fn sigma_star(labels: &[Label]) -> VectorFst<W> {
        let mut fst = VectorFst::new();
        let s = fst.add_state();
        fst.set_start(s);
        fst.set_final(s, W::one());
        for &label in labels {
            fst.add_arc(s, Arc::new(label, label, W::one(), s));
        }
        fst
    }

    #[test]
    fn removes_subtrahend_strings() {
        let mut fst = VectorFst::<W>::from_labels(&[1]);
        closure(&mut fst, ClosureType::Star);
        let one_one = VectorFst::from_labels(&[1, 1]);
        let diff = difference(&fst, &one_one).expect("difference");
        assert!(accepts(&diff, &[]));
        assert!(accepts(&diff, &[1]));
        assert!(!accepts(&diff, &[1, 1]));
        assert!(accepts(&diff, &[1, 1, 1]));
    }

    #[test]
    fn rejects_weighted_subtrahend() {
        let fst = VectorFst::<W>::from_labels(&[1]);
        let mut weighted = VectorFst::from_labels(&[1]);
        weighted.set_final(1, TropicalWeight(2.0));
        assert_eq!(difference(&fst, &weighted).unwrap_err(), FstError::NotUnweightedAcceptor);
        let transducer = VectorFst::from_label_pairs(&[1], &[2]);
        assert!(difference(&fst, &transducer).is_err());
    }

    #[test]
    fn lenient_composition_falls_back_to_first_argument() {
        // 1 -> 2 or 3; constraint keeps only outputs containing 3.
        let mut fst = VectorFst::<W>::from_label_pairs(&[1], &[2]);
        union(&mut fst, &VectorFst::from_label_pairs(&[1], &[3]));
        union(&mut fst, &VectorFst::from_label_pairs(&[4], &[2]));
        let constraint = VectorFst::from_labels(&[3]);
        let sigma = sigma_star(&[1, 2, 3, 4]);
        let lenient = lenient_compose(&fst, &constraint, &sigma).expect("lenient");
        assert_eq!(transduce(&lenient, &[1]), vec![vec![3]]);
        assert_eq!(transduce(&lenient, &[4]), vec![vec![2]]);
    }
}
