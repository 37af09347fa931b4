use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::fst::{Arc, EPSILON, Label, StateId, VectorFst};
use crate::semiring::Semiring;

struct Node<W> {
    state: StateId,
    weight: W,
    parent: Option<usize>,
    arc: Option<Arc<W>>,
}

#[derive(PartialEq)]
struct Entry {
    cost: f64,
    node: usize,
    complete: bool,
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; cheaper entries must compare greater.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The `n` cheapest successful paths as a machine whose paths are exactly
/// those paths. Each state is expanded at most `n` times, which bounds the
/// search on cyclic machines. With `unique`, paths whose label sequences
/// repeat an earlier one are skipped.
pub fn shortest_path<W: Semiring>(fst: &VectorFst<W>, n: usize, unique: bool) -> VectorFst<W> {
    let mut out = VectorFst::new();
    let Some(start) = fst.start() else {
        return out;
    };
    if n == 0 {
        return out;
    }

    let mut nodes: Vec<Node<W>> = vec![Node {
        state: start,
        weight: W::one(),
        parent: None,
        arc: None,
    }];
    let mut heap = BinaryHeap::from([Entry {
        cost: 0.0,
        node: 0,
        complete: false,
    }]);
    let mut expanded = vec![0usize; fst.num_states()];
    let mut found: Vec<(Vec<Arc<W>>, W)> = Vec::new();
    let mut seen: HashSet<(Vec<Label>, Vec<Label>)> = HashSet::new();

    while let Some(entry) = heap.pop() {
        if found.len() >= n {
            break;
        }
        let node = &nodes[entry.node];
        let state = node.state;
        if entry.complete {
            let arcs = trace(&nodes, entry.node);
            if unique {
                let key = (
                    arcs.iter().map(|a| a.ilabel).filter(|&l| l != EPSILON).collect(),
                    arcs.iter().map(|a| a.olabel).filter(|&l| l != EPSILON).collect(),
                );
                if !seen.insert(key) {
                    continue;
                }
            }
            found.push((arcs, fst.final_weight(state)));
            continue;
        }
        if expanded[state as usize] >= n {
            continue;
        }
        expanded[state as usize] += 1;
        let weight = node.weight;
        if fst.is_final(state) {
            let total = weight.times(&fst.final_weight(state));
            heap.push(Entry {
                cost: total.value(),
                node: entry.node,
                complete: true,
            });
        }
        for arc in fst.arcs(state) {
            let next_weight = weight.times(&arc.weight);
            if next_weight.is_zero() {
                continue;
            }
            nodes.push(Node {
                state: arc.nextstate,
                weight: next_weight,
                parent: Some(entry.node),
                arc: Some(*arc),
            });
            heap.push(Entry {
                cost: next_weight.value(),
                node: nodes.len() - 1,
                complete: false,
            });
        }
    }

    let root = out.add_state();
    out.set_start(root);
    for (arcs, final_weight) in found {
        let mut current = root;
        for arc in arcs {
            let next = out.add_state();
            out.add_arc(current, Arc::new(arc.ilabel, arc.olabel, arc.weight, next));
            current = next;
        }
        out.set_final(current, final_weight);
    }
    out
}

fn trace<W: Semiring>(nodes: &[Node<W>], mut index: usize) -> Vec<Arc<W>> {
    let mut arcs = Vec::new();
    while let Some(parent) = nodes[index].parent {
        if let Some(arc) = nodes[index].arc {
            arcs.push(arc);
        }
        index = parent;
    }
    arcs.reverse();
    arcs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::paths::paths;
    use crate::ops::{ClosureType, closure, union};
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    fn weighted(labels: &[Label], weight: f32) -> VectorFst<W> {
        let mut fst = VectorFst::from_labels(labels);
        let last = (fst.num_states() - 1) as StateId;
        fst.set_final(last, TropicalWeight(weight));
        fst
    }

    #[test]
    fn picks_cheapest_path() {
        let mut fst = weighted(&[1], 3.0);
        union(&mut fst, &weighted(&[2], 1.0));
        union(&mut fst, &weighted(&[3], 2.0));
        let best = shortest_path(&fst, 1, false);
        let found = paths(&best, 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ilabels, vec![2]);
        assert_eq!(found[0].weight, TropicalWeight(1.0));
    }

    #[test]
    fn returns_n_best_in_order() {
        let mut fst = weighted(&[1], 3.0);
        union(&mut fst, &weighted(&[2], 1.0));
        union(&mut fst, &weighted(&[3], 2.0));
        let best = shortest_path(&fst, 2, false);
        let mut weights: Vec<f32> = paths(&best, 10).iter().map(|p| p.weight.0).collect();
        weights.sort_by(f32::total_cmp);
        assert_eq!(weights, vec![1.0, 2.0]);
    }

    #[test]
    fn terminates_on_cycles() {
        let mut fst = weighted(&[1], 0.0);
        closure(&mut fst, ClosureType::Star);
        let best = shortest_path(&fst, 3, true);
        let found = paths(&best, 10);
        assert!(!found.is_empty());
        assert!(found.len() <= 3);
        assert!(found.iter().any(|p| p.ilabels.is_empty()));
    }
}
