//! Mutable automata and delayed views over them.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::OnceLock;

use crate::ops;
use crate::semiring::Semiring;

pub type Label = u32;
pub type StateId = u32;

/// The empty label. On an arc it consumes or emits nothing.
pub const EPSILON: Label = 0;

/// A labeled, weighted transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc<W> {
    pub ilabel: Label,
    pub olabel: Label,
    pub weight: W,
    pub nextstate: StateId,
}

impl<W> Arc<W> {
    pub fn new(ilabel: Label, olabel: Label, weight: W, nextstate: StateId) -> Self {
        Arc {
            ilabel,
            olabel,
            weight,
            nextstate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct State<W> {
    final_weight: W,
    arcs: Vec<Arc<W>>,
}

/// An automaton stored as one arc vector per state.
///
/// States are numbered densely from zero in allocation order. A state is
/// final when its final weight is not `W::zero()`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFst<W> {
    states: Vec<State<W>>,
    start: Option<StateId>,
}

impl<W: Semiring> Default for VectorFst<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Semiring> VectorFst<W> {
    pub fn new() -> Self {
        VectorFst {
            states: Vec::new(),
            start: None,
        }
    }

    /// The machine accepting only the empty string with weight one.
    pub fn epsilon() -> Self {
        let mut fst = Self::new();
        let s = fst.add_state();
        fst.set_start(s);
        fst.set_final(s, W::one());
        fst
    }

    /// A linear acceptor over `labels`. Epsilon labels are kept as arcs.
    pub fn from_labels(labels: &[Label]) -> Self {
        Self::from_label_pairs(labels, labels)
    }

    /// A linear transducer reading `input` and writing `output`, the
    /// shorter side padded with epsilons.
    pub fn from_label_pairs(input: &[Label], output: &[Label]) -> Self {
        let mut fst = Self::new();
        let mut current = fst.add_state();
        fst.set_start(current);
        for i in 0..input.len().max(output.len()) {
            let next = fst.add_state();
            let ilabel = input.get(i).copied().unwrap_or(EPSILON);
            let olabel = output.get(i).copied().unwrap_or(EPSILON);
            fst.add_arc(current, Arc::new(ilabel, olabel, W::one(), next));
            current = next;
        }
        fst.set_final(current, W::one());
        fst
    }

    pub fn add_state(&mut self) -> StateId {
        self.states.push(State {
            final_weight: W::zero(),
            arcs: Vec::new(),
        });
        (self.states.len() - 1) as StateId
    }

    pub fn set_start(&mut self, state: StateId) {
        self.start = Some(state);
    }

    pub fn start(&self) -> Option<StateId> {
        self.start
    }

    pub fn set_final(&mut self, state: StateId, weight: W) {
        self.states[state as usize].final_weight = weight;
    }

    pub fn final_weight(&self, state: StateId) -> W {
        self.states[state as usize].final_weight
    }

    pub fn is_final(&self, state: StateId) -> bool {
        !self.states[state as usize].final_weight.is_zero()
    }

    pub fn add_arc(&mut self, state: StateId, arc: Arc<W>) {
        self.states[state as usize].arcs.push(arc);
    }

    pub fn arcs(&self, state: StateId) -> &[Arc<W>] {
        &self.states[state as usize].arcs
    }

    pub fn arcs_mut(&mut self, state: StateId) -> &mut Vec<Arc<W>> {
        &mut self.states[state as usize].arcs
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_arcs(&self) -> usize {
        self.states.iter().map(|s| s.arcs.len()).sum()
    }

    pub fn states(&self) -> Range<StateId> {
        0..self.states.len() as StateId
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.start = None;
    }

    /// Copies every state of `other` into `self` and returns the offset
    /// added to `other`'s state ids. The start state is not changed.
    pub fn append(&mut self, other: &VectorFst<W>) -> StateId {
        let offset = self.states.len() as StateId;
        for state in &other.states {
            let arcs = state
                .arcs
                .iter()
                .map(|arc| Arc {
                    nextstate: arc.nextstate + offset,
                    ..*arc
                })
                .collect();
            self.states.push(State {
                final_weight: state.final_weight,
                arcs,
            });
        }
        offset
    }

    /// Keeps only the states with `keep[s] == true`, renumbering the
    /// survivors in order and dropping arcs into removed states.
    pub fn retain_states(&mut self, keep: &[bool]) {
        let mut remap = vec![None; self.states.len()];
        let mut next = 0;
        for (s, kept) in keep.iter().enumerate() {
            if *kept {
                remap[s] = Some(next);
                next += 1;
            }
        }
        let old = std::mem::take(&mut self.states);
        for (s, mut state) in old.into_iter().enumerate() {
            if remap[s].is_none() {
                continue;
            }
            state.arcs.retain_mut(|arc| match remap[arc.nextstate as usize] {
                Some(target) => {
                    arc.nextstate = target;
                    true
                }
                None => false,
            });
            self.states.push(state);
        }
        self.start = self.start.and_then(|s| remap[s as usize]);
    }

    pub fn is_acceptor(&self) -> bool {
        self.states
            .iter()
            .all(|s| s.arcs.iter().all(|a| a.ilabel == a.olabel))
    }

    pub fn is_unweighted(&self) -> bool {
        self.states.iter().all(|s| {
            (s.final_weight.is_zero() || s.final_weight.is_one())
                && s.arcs.iter().all(|a| a.weight.is_one())
        })
    }

    pub fn is_epsilon_free(&self) -> bool {
        self.states.iter().all(|s| {
            s.arcs
                .iter()
                .all(|a| a.ilabel != EPSILON || a.olabel != EPSILON)
        })
    }

    /// No state has two arcs with the same input label, and no arc reads
    /// epsilon.
    pub fn is_input_deterministic(&self) -> bool {
        self.states.iter().all(|s| {
            let mut seen = BTreeSet::new();
            s.arcs
                .iter()
                .all(|a| a.ilabel != EPSILON && seen.insert(a.ilabel))
        })
    }

    pub fn is_acyclic(&self) -> bool {
        // 0 = unvisited, 1 = on stack, 2 = done
        let mut color = vec![0u8; self.states.len()];
        for root in self.states() {
            if color[root as usize] != 0 {
                continue;
            }
            let mut stack = vec![(root, 0usize)];
            color[root as usize] = 1;
            while let Some((s, index)) = stack.pop() {
                let arcs = self.arcs(s);
                if index < arcs.len() {
                    stack.push((s, index + 1));
                    let next = arcs[index].nextstate;
                    match color[next as usize] {
                        0 => {
                            color[next as usize] = 1;
                            stack.push((next, 0));
                        }
                        1 => return false,
                        _ => {}
                    }
                } else {
                    color[s as usize] = 2;
                }
            }
        }
        true
    }

    /// All non-epsilon labels on either side of any arc.
    pub fn labels(&self) -> BTreeSet<Label> {
        let mut labels = BTreeSet::new();
        for state in &self.states {
            for arc in &state.arcs {
                if arc.ilabel != EPSILON {
                    labels.insert(arc.ilabel);
                }
                if arc.olabel != EPSILON {
                    labels.insert(arc.olabel);
                }
            }
        }
        labels
    }

    pub fn max_label(&self) -> Label {
        self.labels().last().copied().unwrap_or(EPSILON)
    }

    /// Rewrites every non-epsilon label through `map`, leaving unmapped
    /// labels untouched.
    pub fn relabel(&mut self, map: impl Fn(Label) -> Option<Label>) {
        for state in &mut self.states {
            for arc in &mut state.arcs {
                if arc.ilabel != EPSILON {
                    arc.ilabel = map(arc.ilabel).unwrap_or(arc.ilabel);
                }
                if arc.olabel != EPSILON {
                    arc.olabel = map(arc.olabel).unwrap_or(arc.olabel);
                }
            }
        }
    }
}

type SharedFst<W> = std::sync::Arc<Fst<W>>;

/// The composite operations that can be left unexpanded.
#[derive(Debug, Clone)]
pub enum DelayedOp<W: Semiring> {
    Union(SharedFst<W>, SharedFst<W>),
    Concat(SharedFst<W>, SharedFst<W>),
    Compose(SharedFst<W>, SharedFst<W>),
}

/// A composite view over shared operands, expanded on first access.
#[derive(Debug, Clone)]
pub struct DelayedFst<W: Semiring> {
    op: DelayedOp<W>,
    expanded: OnceLock<VectorFst<W>>,
}

impl<W: Semiring> DelayedFst<W> {
    pub fn op(&self) -> &DelayedOp<W> {
        &self.op
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded.get().is_some()
    }

    fn expand(&self) -> &VectorFst<W> {
        self.expanded.get_or_init(|| match &self.op {
            DelayedOp::Union(a, b) => {
                let mut out = a.vector().clone();
                ops::union(&mut out, b.vector());
                out
            }
            DelayedOp::Concat(a, b) => {
                let mut out = a.vector().clone();
                ops::concat(&mut out, b.vector());
                out
            }
            DelayedOp::Compose(a, b) => ops::compose(a.vector(), b.vector()),
        })
    }
}

/// An automaton value: either materialized or a delayed view.
#[derive(Debug, Clone)]
pub enum Fst<W: Semiring> {
    Vector(VectorFst<W>),
    Delayed(DelayedFst<W>),
}

impl<W: Semiring> From<VectorFst<W>> for Fst<W> {
    fn from(fst: VectorFst<W>) -> Self {
        Fst::Vector(fst)
    }
}

impl<W: Semiring> Fst<W> {
    fn delayed(op: DelayedOp<W>) -> Self {
        Fst::Delayed(DelayedFst {
            op,
            expanded: OnceLock::new(),
        })
    }

    pub fn delayed_union(a: Fst<W>, b: Fst<W>) -> Self {
        Self::delayed(DelayedOp::Union(a.into(), b.into()))
    }

    pub fn delayed_concat(a: Fst<W>, b: Fst<W>) -> Self {
        Self::delayed(DelayedOp::Concat(a.into(), b.into()))
    }

    pub fn delayed_compose(a: Fst<W>, b: Fst<W>) -> Self {
        Self::delayed(DelayedOp::Compose(a.into(), b.into()))
    }

    pub fn is_delayed(&self) -> bool {
        matches!(self, Fst::Delayed(_))
    }

    /// The materialized machine, expanding a delayed view if needed.
    pub fn vector(&self) -> &VectorFst<W> {
        match self {
            Fst::Vector(fst) => fst,
            Fst::Delayed(delayed) => delayed.expand(),
        }
    }

    /// Takes the materialized machine, cloning only for delayed views.
    pub fn into_vector(self) -> VectorFst<W> {
        match self {
            Fst::Vector(fst) => fst,
            Fst::Delayed(delayed) => delayed.expand().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn linear_acceptor_has_one_state_per_label_plus_one() {
        let fst = VectorFst::<W>::from_labels(&[1, 2, 3]);
        assert_eq!(fst.num_states(), 4);
        assert_eq!(fst.num_arcs(), 3);
        assert!(fst.is_acceptor());
        assert!(fst.is_final(3));
        assert!(!fst.is_final(0));
        assert!(fst.is_acyclic());
    }

    #[test]
    fn label_pairs_pad_with_epsilon() {
        let fst = VectorFst::<W>::from_label_pairs(&[1], &[2, 3]);
        assert!(!fst.is_acceptor());
        assert_eq!(fst.arcs(1)[0].ilabel, EPSILON);
        assert_eq!(fst.arcs(1)[0].olabel, 3);
    }

    #[test]
    fn retain_states_renumbers_and_drops_dangling_arcs() {
        let mut fst = VectorFst::<W>::from_labels(&[1, 2]);
        let dead = fst.add_state();
        fst.add_arc(0, Arc::new(9, 9, W::one(), dead));
        let mut keep = vec![true; fst.num_states()];
        keep[dead as usize] = false;
        fst.retain_states(&keep);
        assert_eq!(fst.num_states(), 3);
        assert_eq!(fst.arcs(0).len(), 1);
    }

    #[test]
    fn detects_cycles() {
        let mut fst = VectorFst::<W>::from_labels(&[1]);
        fst.add_arc(1, Arc::new(2, 2, W::one(), 0));
        assert!(!fst.is_acyclic());
    }

    #[test]
    fn delayed_union_leaves_operands_untouched() {
        let a = Fst::from(VectorFst::<W>::from_labels(&[1]));
        let b = Fst::from(VectorFst::<W>::from_labels(&[2]));
        let delayed = Fst::delayed_union(a.clone(), b);
        let Fst::Delayed(view) = &delayed else {
            panic!("expected a delayed view");
        };
        assert!(!view.is_expanded());
        assert!(delayed.vector().num_states() >= 4);
        assert!(view.is_expanded());
        assert_eq!(a.vector().num_states(), 2);
    }
}
