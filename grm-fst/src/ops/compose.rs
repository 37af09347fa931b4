use std::collections::{HashMap, VecDeque};

use crate::fst::{Arc, EPSILON, Label, StateId, VectorFst};
use crate::ops::connect;
use crate::semiring::Semiring;

/// Filter state of the epsilon sequencing filter. Between two matching
/// moves, moves of the right machine alone come before moves of the left
/// machine alone, which keeps exactly one path per pair of paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Filter {
    Open,
    LeftOnly,
}

/// Composes `left` with `right`, matching the output side of `left`
/// against the input side of `right`. The result is trimmed.
pub fn compose<W: Semiring>(left: &VectorFst<W>, right: &VectorFst<W>) -> VectorFst<W> {
    let mut out = VectorFst::new();
    let (Some(start1), Some(start2)) = (left.start(), right.start()) else {
        return out;
    };

    // Right-hand arcs sorted by input label so matches are a range.
    let sorted: Vec<Vec<Arc<W>>> = right
        .states()
        .map(|s| {
            let mut arcs = right.arcs(s).to_vec();
            arcs.sort_by_key(|arc| arc.ilabel);
            arcs
        })
        .collect();

    let mut index: HashMap<(StateId, StateId, Filter), StateId> = HashMap::new();
    let mut queue = VecDeque::new();
    let mut intern = |key: (StateId, StateId, Filter),
                      out: &mut VectorFst<W>,
                      queue: &mut VecDeque<(StateId, StateId, Filter)>| {
        *index.entry(key).or_insert_with(|| {
            queue.push_back(key);
            out.add_state()
        })
    };

    let start = intern((start1, start2, Filter::Open), &mut out, &mut queue);
    out.set_start(start);

    while let Some(key) = queue.pop_front() {
        let (q1, q2, filter) = key;
        let source = intern(key, &mut out, &mut queue);
        if left.is_final(q1) && right.is_final(q2) {
            out.set_final(source, left.final_weight(q1).times(&right.final_weight(q2)));
        }
        for arc1 in left.arcs(q1) {
            if arc1.olabel == EPSILON {
                let target = intern((arc1.nextstate, q2, Filter::LeftOnly), &mut out, &mut queue);
                out.add_arc(source, Arc::new(arc1.ilabel, EPSILON, arc1.weight, target));
                continue;
            }
            for arc2 in matching(&sorted, q2, arc1.olabel) {
                let target = intern((arc1.nextstate, arc2.nextstate, Filter::Open), &mut out, &mut queue);
                out.add_arc(
                    source,
                    Arc::new(arc1.ilabel, arc2.olabel, arc1.weight.times(&arc2.weight), target),
                );
            }
        }
        if filter == Filter::Open {
            for arc2 in matching(&sorted, q2, EPSILON) {
                let target = intern((q1, arc2.nextstate, Filter::Open), &mut out, &mut queue);
                out.add_arc(source, Arc::new(EPSILON, arc2.olabel, arc2.weight, target));
            }
        }
    }

    connect(&mut out);
    out
}

fn matching<W>(sorted: &[Vec<Arc<W>>], state: StateId, label: Label) -> &[Arc<W>] {
    let arcs = &sorted[state as usize];
    let lo = arcs.partition_point(|arc| arc.ilabel < label);
    let hi = arcs.partition_point(|arc| arc.ilabel <= label);
    &arcs[lo..hi]
}

/// Cross product: every string of `input`'s input language paired with
/// every string of `output`'s output language.
pub fn cross<W: Semiring>(input: &VectorFst<W>, output: &VectorFst<W>) -> VectorFst<W> {
    let mut left = input.clone();
    for s in left.states() {
        for arc in left.arcs_mut(s) {
            arc.olabel = EPSILON;
        }
    }
    let mut right = output.clone();
    for s in right.states() {
        for arc in right.arcs_mut(s) {
            arc.ilabel = EPSILON;
        }
    }
    crate::ops::concat(&mut left, &right);
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::paths::{accepts, transduce};
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn composes_relations() {
        let ab = VectorFst::<W>::from_label_pairs(&[1], &[2]);
        let bc = VectorFst::<W>::from_label_pairs(&[2], &[3]);
        let ac = compose(&ab, &bc);
        assert_eq!(transduce(&ac, &[1]), vec![vec![3]]);
    }

    #[test]
    fn mismatched_labels_compose_to_empty() {
        let ab = VectorFst::<W>::from_label_pairs(&[1], &[2]);
        let cd = VectorFst::<W>::from_label_pairs(&[3], &[4]);
        assert!(compose(&ab, &cd).start().is_none());
    }

    #[test]
    fn epsilons_on_both_sides_yield_single_path() {
        // a:ε b:c  composed with  ε:x c:d
        let mut left = VectorFst::<W>::new();
        let s: Vec<_> = (0..3).map(|_| left.add_state()).collect();
        left.set_start(s[0]);
        left.add_arc(s[0], Arc::new(1, EPSILON, W::one(), s[1]));
        left.add_arc(s[1], Arc::new(2, 3, W::one(), s[2]));
        left.set_final(s[2], W::one());

        let mut right = VectorFst::<W>::new();
        let t: Vec<_> = (0..3).map(|_| right.add_state()).collect();
        right.set_start(t[0]);
        right.add_arc(t[0], Arc::new(EPSILON, 9, W::one(), t[1]));
        right.add_arc(t[1], Arc::new(3, 4, W::one(), t[2]));
        right.set_final(t[2], W::one());

        let composed = compose(&left, &right);
        assert_eq!(transduce(&composed, &[1, 2]), vec![vec![9, 4]]);
        assert_eq!(crate::ops::paths::paths(&composed, 10).len(), 1);
    }

    #[test]
    fn weights_multiply() {
        let mut left = VectorFst::<W>::from_label_pairs(&[1], &[2]);
        left.arcs_mut(0)[0].weight = TropicalWeight(1.5);
        let mut right = VectorFst::<W>::from_label_pairs(&[2], &[3]);
        right.set_final(1, TropicalWeight(2.0));
        let composed = compose(&left, &right);
        let paths = crate::ops::paths::paths(&composed, 10);
        assert_eq!(paths[0].weight, TropicalWeight(3.5));
    }

    #[test]
    fn cross_pairs_languages() {
        let a = VectorFst::<W>::from_labels(&[1, 2]);
        let b = VectorFst::<W>::from_labels(&[3]);
        let crossed = cross(&a, &b);
        assert!(accepts(&crossed, &[1, 2]));
        assert_eq!(transduce(&crossed, &[1, 2]), vec![vec![3]]);
    }
}
