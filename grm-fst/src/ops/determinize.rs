use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::fst::{Arc, EPSILON, Label, StateId, VectorFst};
use crate::ops::rm_epsilon;
use crate::semiring::{DELTA, Semiring};

/// Maps each distinct `(ilabel, olabel)` pair to a single label so a
/// transducer can be treated as an acceptor. `ε:ε` stays epsilon.
#[derive(Debug, Clone, Default)]
pub struct EncodeTable {
    pairs: Vec<(Label, Label)>,
    index: HashMap<(Label, Label), Label>,
}

impl EncodeTable {
    fn encode(&mut self, ilabel: Label, olabel: Label) -> Label {
        if ilabel == EPSILON && olabel == EPSILON {
            return EPSILON;
        }
        if let Some(&label) = self.index.get(&(ilabel, olabel)) {
            return label;
        }
        self.pairs.push((ilabel, olabel));
        let label = self.pairs.len() as Label;
        self.index.insert((ilabel, olabel), label);
        label
    }

    fn decode(&self, label: Label) -> (Label, Label) {
        if label == EPSILON {
            return (EPSILON, EPSILON);
        }
        self.pairs[label as usize - 1]
    }
}

pub fn encode<W: Semiring>(fst: &VectorFst<W>) -> (VectorFst<W>, EncodeTable) {
    let mut table = EncodeTable::default();
    let mut out = fst.clone();
    for s in out.states() {
        for arc in out.arcs_mut(s) {
            let label = table.encode(arc.ilabel, arc.olabel);
            arc.ilabel = label;
            arc.olabel = label;
        }
    }
    (out, table)
}

pub fn decode<W: Semiring>(fst: &mut VectorFst<W>, table: &EncodeTable) {
    for s in fst.states() {
        for arc in fst.arcs_mut(s) {
            let (ilabel, olabel) = table.decode(arc.ilabel);
            arc.ilabel = ilabel;
            arc.olabel = olabel;
        }
    }
}

/// Weighted subset construction. Transducers are determinized over their
/// encoded label pairs, so the result is deterministic on pairs.
pub fn determinize<W: Semiring>(fst: &VectorFst<W>) -> VectorFst<W> {
    let mut input = fst.clone();
    rm_epsilon(&mut input);
    if input.is_acceptor() {
        return determinize_acceptor(&input);
    }
    let (encoded, table) = encode(&input);
    let mut out = determinize_acceptor(&encoded);
    decode(&mut out, &table);
    out
}

type Subset<W> = Vec<(StateId, W)>;
type SubsetKey = Vec<(StateId, i64)>;

fn determinize_acceptor<W: Semiring>(fst: &VectorFst<W>) -> VectorFst<W> {
    let mut out = VectorFst::new();
    let Some(start) = fst.start() else {
        return out;
    };
    let key_of = |subset: &Subset<W>| -> SubsetKey {
        subset.iter().map(|(s, w)| (*s, w.quantize(DELTA))).collect()
    };

    let mut index: HashMap<SubsetKey, StateId> = HashMap::new();
    let mut queue: VecDeque<(StateId, Subset<W>)> = VecDeque::new();
    let initial: Subset<W> = vec![(start, W::one())];
    let start_state = out.add_state();
    index.insert(key_of(&initial), start_state);
    out.set_start(start_state);
    queue.push_back((start_state, initial));

    while let Some((source, subset)) = queue.pop_front() {
        let mut final_weight = W::zero();
        // label -> destination -> accumulated weight
        let mut transitions: BTreeMap<Label, BTreeMap<StateId, W>> = BTreeMap::new();
        for &(q, residual) in &subset {
            if fst.is_final(q) {
                final_weight = final_weight.plus(&residual.times(&fst.final_weight(q)));
            }
            for arc in fst.arcs(q) {
                let weight = residual.times(&arc.weight);
                let slot = transitions
                    .entry(arc.ilabel)
                    .or_default()
                    .entry(arc.nextstate)
                    .or_insert_with(W::zero);
                *slot = slot.plus(&weight);
            }
        }
        out.set_final(source, final_weight);

        for (label, destinations) in transitions {
            let total = destinations
                .values()
                .fold(W::zero(), |acc, w| acc.plus(w));
            if total.is_zero() {
                continue;
            }
            let next: Subset<W> = destinations
                .into_iter()
                .map(|(s, w)| (s, w.divide(&total)))
                .collect();
            let key = key_of(&next);
            let target = match index.get(&key) {
                Some(&target) => target,
                None => {
                    let target = out.add_state();
                    index.insert(key, target);
                    queue.push_back((target, next));
                    target
                }
            };
            out.add_arc(source, Arc::new(label, label, total, target));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::paths::{accepts, paths, transduce};
    use crate::ops::union;
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn merges_shared_prefixes() {
        let mut fst = VectorFst::<W>::from_labels(&[1, 2]);
        union(&mut fst, &VectorFst::from_labels(&[1, 3]));
        let det = determinize(&fst);
        assert!(det.is_input_deterministic());
        assert!(accepts(&det, &[1, 2]));
        assert!(accepts(&det, &[1, 3]));
        assert_eq!(det.num_states(), 4);
    }

    #[test]
    fn tropical_determinization_keeps_best_weight() {
        let mut cheap = VectorFst::<W>::from_labels(&[1]);
        cheap.set_final(1, TropicalWeight(1.0));
        let mut dear = VectorFst::<W>::from_labels(&[1]);
        dear.set_final(1, TropicalWeight(5.0));
        union(&mut cheap, &dear);
        let det = determinize(&cheap);
        let found = paths(&det, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].weight, TropicalWeight(1.0));
    }

    #[test]
    fn transducers_are_determinized_on_pairs() {
        let mut fst = VectorFst::<W>::from_label_pairs(&[1], &[2]);
        union(&mut fst, &VectorFst::from_label_pairs(&[1], &[3]));
        let det = determinize(&fst);
        assert_eq!(transduce(&det, &[1]), vec![vec![2], vec![3]]);
    }
}
