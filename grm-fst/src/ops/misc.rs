use crate::fst::{Arc, EPSILON, StateId, VectorFst};
use crate::semiring::Semiring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcSortType {
    Input,
    Output,
}

/// Copies one side of every arc onto the other, making an acceptor.
pub fn project<W: Semiring>(fst: &mut VectorFst<W>, project_type: ProjectType) {
    for s in fst.states() {
        for arc in fst.arcs_mut(s) {
            match project_type {
                ProjectType::Input => arc.olabel = arc.ilabel,
                ProjectType::Output => arc.ilabel = arc.olabel,
            }
        }
    }
}

/// Swaps input and output labels.
pub fn invert<W: Semiring>(fst: &mut VectorFst<W>) {
    for s in fst.states() {
        for arc in fst.arcs_mut(s) {
            std::mem::swap(&mut arc.ilabel, &mut arc.olabel);
        }
    }
}

/// Sets every arc and final weight to one.
pub fn rm_weight<W: Semiring>(fst: &mut VectorFst<W>) {
    for s in fst.states() {
        if fst.is_final(s) {
            fst.set_final(s, W::one());
        }
        for arc in fst.arcs_mut(s) {
            arc.weight = W::one();
        }
    }
}

pub fn arc_sort<W: Semiring>(fst: &mut VectorFst<W>, sort_type: ArcSortType) {
    for s in fst.states() {
        let arcs = fst.arcs_mut(s);
        match sort_type {
            ArcSortType::Input => arcs.sort_by_key(|arc| (arc.ilabel, arc.olabel)),
            ArcSortType::Output => arcs.sort_by_key(|arc| (arc.olabel, arc.ilabel)),
        }
    }
}

/// The reversed machine. A fresh start state reaches each former final
/// state by an epsilon arc carrying its final weight.
pub fn reverse<W: Semiring>(fst: &VectorFst<W>) -> VectorFst<W> {
    let mut out = VectorFst::new();
    let Some(start) = fst.start() else {
        return out;
    };
    let super_start = out.add_state();
    for _ in fst.states() {
        out.add_state();
    }
    out.set_start(super_start);
    out.set_final(start + 1, W::one());
    for s in fst.states() {
        if fst.is_final(s) {
            out.add_arc(
                super_start,
                Arc::new(EPSILON, EPSILON, fst.final_weight(s), s + 1),
            );
        }
        for arc in fst.arcs(s) {
            out.add_arc(
                arc.nextstate + 1,
                Arc::new(arc.ilabel, arc.olabel, arc.weight, s + 1),
            );
        }
    }
    out
}

/// Removes every state that is not both reachable from the start and able
/// to reach a final state. Zero-weight arcs are dropped first.
pub fn connect<W: Semiring>(fst: &mut VectorFst<W>) {
    for s in fst.states() {
        fst.arcs_mut(s).retain(|arc| !arc.weight.is_zero());
    }
    let Some(start) = fst.start() else {
        fst.clear();
        return;
    };
    let n = fst.num_states();

    let mut accessible = vec![false; n];
    let mut stack = vec![start];
    accessible[start as usize] = true;
    while let Some(s) = stack.pop() {
        for arc in fst.arcs(s) {
            if !accessible[arc.nextstate as usize] {
                accessible[arc.nextstate as usize] = true;
                stack.push(arc.nextstate);
            }
        }
    }

    let mut incoming: Vec<Vec<StateId>> = vec![Vec::new(); n];
    for s in fst.states() {
        for arc in fst.arcs(s) {
            incoming[arc.nextstate as usize].push(s);
        }
    }
    let mut coaccessible = vec![false; n];
    let mut stack: Vec<StateId> = fst.states().filter(|&s| fst.is_final(s)).collect();
    for &s in &stack {
        coaccessible[s as usize] = true;
    }
    while let Some(s) = stack.pop() {
        for &prev in &incoming[s as usize] {
            if !coaccessible[prev as usize] {
                coaccessible[prev as usize] = true;
                stack.push(prev);
            }
        }
    }

    let keep: Vec<bool> = (0..n).map(|s| accessible[s] && coaccessible[s]).collect();
    if !keep[start as usize] {
        fst.clear();
        return;
    }
    fst.retain_states(&keep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::paths::{accepts, transduce};
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn projection_makes_acceptors() {
        let mut fst = VectorFst::<W>::from_label_pairs(&[1, 2], &[3, 4]);
        project(&mut fst, ProjectType::Output);
        assert!(fst.is_acceptor());
        assert!(accepts(&fst, &[3, 4]));
    }

    #[test]
    fn invert_swaps_sides() {
        let mut fst = VectorFst::<W>::from_label_pairs(&[1], &[2]);
        invert(&mut fst);
        assert_eq!(transduce(&fst, &[2]), vec![vec![1]]);
    }

    #[test]
    fn reverse_reads_backwards() {
        let fst = VectorFst::<W>::from_labels(&[1, 2, 3]);
        let reversed = reverse(&fst);
        assert!(accepts(&reversed, &[3, 2, 1]));
        assert!(!accepts(&reversed, &[1, 2, 3]));
    }

    #[test]
    fn connect_trims_dead_ends() {
        let mut fst = VectorFst::<W>::from_labels(&[1]);
        let dead = fst.add_state();
        fst.add_arc(0, Arc::new(2, 2, W::one(), dead));
        let unreachable = fst.add_state();
        fst.set_final(unreachable, W::one());
        connect(&mut fst);
        assert_eq!(fst.num_states(), 2);
        assert!(accepts(&fst, &[1]));
    }

    #[test]
    fn connect_empties_machine_without_final_states() {
        let mut fst = VectorFst::<W>::from_labels(&[1]);
        fst.set_final(1, W::zero());
        connect(&mut fst);
        assert!(fst.start().is_none());
        assert_eq!(fst.num_states(), 0);
    }

    #[test]
    fn arc_sort_orders_by_label() {
        let mut fst = VectorFst::<W>::new();
        let s = fst.add_state();
        let t = fst.add_state();
        fst.set_start(s);
        fst.set_final(t, W::one());
        fst.add_arc(s, Arc::new(5, 1, W::one(), t));
        fst.add_arc(s, Arc::new(2, 7, W::one(), t));
        arc_sort(&mut fst, ArcSortType::Input);
        assert_eq!(fst.arcs(s)[0].ilabel, 2);
        arc_sort(&mut fst, ArcSortType::Output);
        assert_eq!(fst.arcs(s)[0].olabel, 1);
    }
}
