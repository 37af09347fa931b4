//! Path enumeration and membership tests.

use std::collections::BTreeSet;

use crate::fst::{EPSILON, Label, StateId, VectorFst};
use crate::ops::compose;
use crate::semiring::Semiring;

/// One successful path with epsilons stripped from both label sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Path<W> {
    pub ilabels: Vec<Label>,
    pub olabels: Vec<Label>,
    pub weight: W,
}

/// Enumerates up to `limit` successful paths in depth-first order. Cycles
/// are not followed, so only simple paths are produced.
pub fn paths<W: Semiring>(fst: &VectorFst<W>, limit: usize) -> Vec<Path<W>> {
    let mut out = Vec::new();
    let Some(start) = fst.start() else {
        return out;
    };
    let mut on_path = vec![false; fst.num_states()];
    let mut current = Path {
        ilabels: Vec::new(),
        olabels: Vec::new(),
        weight: W::one(),
    };
    visit(fst, start, &mut on_path, &mut current, &mut out, limit);
    out
}

fn visit<W: Semiring>(
    fst: &VectorFst<W>,
    state: StateId,
    on_path: &mut [bool],
    current: &mut Path<W>,
    out: &mut Vec<Path<W>>,
    limit: usize,
) {
    if out.len() >= limit {
        return;
    }
    on_path[state as usize] = true;
    if fst.is_final(state) {
        out.push(Path {
            weight: current.weight.times(&fst.final_weight(state)),
            ..current.clone()
        });
    }
    for arc in fst.arcs(state) {
        if on_path[arc.nextstate as usize] || out.len() >= limit {
            continue;
        }
        let saved = current.weight;
        let (ilen, olen) = (current.ilabels.len(), current.olabels.len());
        if arc.ilabel != EPSILON {
            current.ilabels.push(arc.ilabel);
        }
        if arc.olabel != EPSILON {
            current.olabels.push(arc.olabel);
        }
        current.weight = saved.times(&arc.weight);
        visit(fst, arc.nextstate, on_path, current, out, limit);
        current.ilabels.truncate(ilen);
        current.olabels.truncate(olen);
        current.weight = saved;
    }
    on_path[state as usize] = false;
}

/// Whether the input side of `fst` contains `labels`.
pub fn accepts<W: Semiring>(fst: &VectorFst<W>, labels: &[Label]) -> bool {
    let Some(start) = fst.start() else {
        return false;
    };
    let closure = |states: BTreeSet<StateId>| {
        let mut stack: Vec<StateId> = states.iter().copied().collect();
        let mut seen = states;
        while let Some(s) = stack.pop() {
            for arc in fst.arcs(s) {
                if arc.ilabel == EPSILON && seen.insert(arc.nextstate) {
                    stack.push(arc.nextstate);
                }
            }
        }
        seen
    };
    let mut current = closure(BTreeSet::from([start]));
    for &label in labels {
        let next = current
            .iter()
            .flat_map(|&s| fst.arcs(s).iter())
            .filter(|arc| arc.ilabel == label)
            .map(|arc| arc.nextstate)
            .collect();
        current = closure(next);
        if current.is_empty() {
            return false;
        }
    }
    current.iter().any(|&s| fst.is_final(s))
}

/// Distinct output strings produced for `input`, sorted.
pub fn transduce<W: Semiring>(fst: &VectorFst<W>, input: &[Label]) -> Vec<Vec<Label>> {
    let composed = compose(&VectorFst::from_labels(input), fst);
    let outputs: BTreeSet<Vec<Label>> = paths(&composed, usize::MAX)
        .into_iter()
        .map(|path| path.olabels)
        .collect();
    outputs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{ClosureType, closure, union};
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn enumerates_each_branch() {
        let mut fst = VectorFst::<W>::from_labels(&[1]);
        union(&mut fst, &VectorFst::from_labels(&[2, 3]));
        let mut found: Vec<_> = paths(&fst, 10).into_iter().map(|p| p.ilabels).collect();
        found.sort();
        assert_eq!(found, vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn respects_limit_on_cyclic_machines() {
        let mut fst = VectorFst::<W>::from_labels(&[1]);
        closure(&mut fst, ClosureType::Star);
        assert!(paths(&fst, 1).len() <= 1);
        assert!(accepts(&fst, &[1, 1, 1]));
    }
}
