use std::collections::HashMap;

use crate::fst::{Arc, Label, StateId, VectorFst};
use crate::ops::{connect, decode, determinize, encode};
use crate::semiring::{DELTA, Semiring};

/// Merges equivalent states by partition refinement. Non-deterministic
/// input is determinized first; transducers are minimized over encoded
/// label pairs. Weights are compared after quantization and are not
/// pushed, so weighted machines may keep some redundant states.
pub fn minimize<W: Semiring>(fst: &VectorFst<W>) -> VectorFst<W> {
    let (encoded, table) = encode(fst);
    let mut input = if encoded.is_input_deterministic() {
        encoded
    } else {
        determinize(&encoded)
    };
    connect(&mut input);
    let mut out = quotient(&input);
    decode(&mut out, &table);
    out
}

type Signature = (usize, Vec<(Label, i64, usize)>);

fn quotient<W: Semiring>(fst: &VectorFst<W>) -> VectorFst<W> {
    let Some(start) = fst.start() else {
        return VectorFst::new();
    };
    let n = fst.num_states();

    let mut class: Vec<usize> = {
        let mut initial: HashMap<i64, usize> = HashMap::new();
        fst.states()
            .map(|s| {
                let key = fst.final_weight(s).quantize(DELTA);
                let next = initial.len();
                *initial.entry(key).or_insert(next)
            })
            .collect()
    };
    let mut count = class.iter().copied().max().map_or(0, |m| m + 1);

    loop {
        let mut signatures: HashMap<Signature, usize> = HashMap::new();
        let refined: Vec<usize> = fst
            .states()
            .map(|s| {
                let mut arcs: Vec<(Label, i64, usize)> = fst
                    .arcs(s)
                    .iter()
                    .map(|arc| {
                        (
                            arc.ilabel,
                            arc.weight.quantize(DELTA),
                            class[arc.nextstate as usize],
                        )
                    })
                    .collect();
                arcs.sort_unstable();
                let signature = (class[s as usize], arcs);
                let next = signatures.len();
                *signatures.entry(signature).or_insert(next)
            })
            .collect();
        let refined_count = signatures.len();
        class = refined;
        if refined_count == count {
            break;
        }
        count = refined_count;
    }

    let mut out = VectorFst::new();
    for _ in 0..count {
        out.add_state();
    }
    let mut built = vec![false; count];
    for s in 0..n {
        let c = class[s];
        if built[c] {
            continue;
        }
        built[c] = true;
        let s = s as StateId;
        out.set_final(c as StateId, fst.final_weight(s));
        for arc in fst.arcs(s) {
            out.add_arc(
                c as StateId,
                Arc::new(arc.ilabel, arc.olabel, arc.weight, class[arc.nextstate as usize] as StateId),
            );
        }
    }
    out.set_start(class[start as usize] as StateId);
    out
}
