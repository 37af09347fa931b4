use std::collections::{BTreeMap, VecDeque};

use crate::fst::{Arc, EPSILON, StateId, VectorFst};
use crate::ops::connect;
use crate::semiring::{DELTA, Semiring};

fn is_epsilon<W>(arc: &Arc<W>) -> bool {
    arc.ilabel == EPSILON && arc.olabel == EPSILON
}

/// Shortest distance from `source` to every state reachable through
/// epsilon-only arcs, `source` itself included at weight one.
fn epsilon_distance<W: Semiring>(fst: &VectorFst<W>, source: StateId) -> BTreeMap<StateId, W> {
    let mut distance = BTreeMap::from([(source, W::one())]);
    let mut residual = BTreeMap::from([(source, W::one())]);
    let mut queue = VecDeque::from([source]);
    while let Some(s) = queue.pop_front() {
        let r = residual.insert(s, W::zero()).unwrap_or_else(W::zero);
        for arc in fst.arcs(s).iter().filter(|arc| is_epsilon(arc)) {
            let through = r.times(&arc.weight);
            let old = distance.get(&arc.nextstate).copied().unwrap_or_else(W::zero);
            let updated = old.plus(&through);
            if !updated.approx_eq(&old, DELTA) {
                distance.insert(arc.nextstate, updated);
                let pending = residual.get(&arc.nextstate).copied().unwrap_or_else(W::zero);
                residual.insert(arc.nextstate, pending.plus(&through));
                if !queue.contains(&arc.nextstate) {
                    queue.push_back(arc.nextstate);
                }
            }
        }
    }
    distance
}

/// Removes every arc whose input and output are both epsilon, preserving
/// the weighted relation.
pub fn rm_epsilon<W: Semiring>(fst: &mut VectorFst<W>) {
    if fst.is_epsilon_free() {
        return;
    }
    let mut rebuilt = Vec::with_capacity(fst.num_states());
    for q in fst.states() {
        let mut arcs = Vec::new();
        let mut final_weight = W::zero();
        for (p, d) in epsilon_distance(fst, q) {
            if fst.is_final(p) {
                final_weight = final_weight.plus(&d.times(&fst.final_weight(p)));
            }
            for arc in fst.arcs(p).iter().filter(|arc| !is_epsilon(arc)) {
                arcs.push(Arc::new(arc.ilabel, arc.olabel, d.times(&arc.weight), arc.nextstate));
            }
        }
        rebuilt.push((final_weight, arcs));
    }
    for (q, (final_weight, arcs)) in fst.states().zip(rebuilt) {
        fst.set_final(q, final_weight);
        *fst.arcs_mut(q) = arcs;
    }
    connect(fst);
}
