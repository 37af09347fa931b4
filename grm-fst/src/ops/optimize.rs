use tracing::debug;

use crate::fst::VectorFst;
use crate::ops::{connect, determinize, minimize, rm_epsilon};
use crate::semiring::Semiring;

/// Epsilon removal followed by determinization and minimization. The
/// last two steps only run on acyclic or unweighted machines, the cases
/// where weighted determinization is known to terminate.
pub fn optimize<W: Semiring>(fst: &VectorFst<W>) -> VectorFst<W> {
    let mut out = fst.clone();
    connect(&mut out);
    rm_epsilon(&mut out);
    if out.is_acyclic() || out.is_unweighted() {
        out = minimize(&determinize(&out));
    } else {
        debug!(states = out.num_states(), "skipping determinization of cyclic weighted machine");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::paths::accepts;
    use crate::ops::{ClosureType, closure, concat, union};
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    #[test]
    fn shrinks_redundant_unions() {
        let mut fst = VectorFst::<W>::from_labels(&[1, 2]);
        for _ in 0..4 {
            union(&mut fst, &VectorFst::from_labels(&[1, 2]));
        }
        let optimized = optimize(&fst);
        assert_eq!(optimized.num_states(), 3);
        assert!(accepts(&optimized, &[1, 2]));
    }

    #[test]
    fn keeps_language_of_cyclic_machines() {
        let mut fst = VectorFst::<W>::from_labels(&[1]);
        union(&mut fst, &VectorFst::from_labels(&[2]));
        closure(&mut fst, ClosureType::Star);
        concat(&mut fst, &VectorFst::from_labels(&[3]));
        let optimized = optimize(&fst);
        assert!(optimized.is_epsilon_free());
        assert!(accepts(&optimized, &[1, 2, 1, 3]));
        assert!(!accepts(&optimized, &[1, 2]));
    }
}
