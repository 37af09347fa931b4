//! Context-dependent rewrite rules.
//!
//! A rule `tau / lambda __ rho` rewrites strings of `tau`'s input side
//! into `tau`'s output side wherever they occur between the left context
//! `lambda` and the right context `rho`. The rule is compiled into a
//! cascade of transducers in the manner of Mohri and Sproat (1996):
//!
//! 1. `r` inserts `>` before every occurrence of `rho`;
//! 2. `f` inserts `<1` or `<2` before every occurrence of `phi >`, where
//!    `phi` is the input side of `tau`;
//! 3. `replace` rewrites `<1 phi >` spans through `tau`;
//! 4. `l1` admits `<1` only after `lambda`;
//! 5. `l2` admits `<2` only where `lambda` does not precede it.
//!
//! Markers are fresh labels above every label in use. All filters are
//! built over an explicit alphabet extended with the labels of `tau`, so
//! that rewritten output (e.g. inserted symbols) passes the context
//! filters even when the caller's alphabet lacks it.

use std::collections::BTreeSet;

use crate::error::FstError;
use crate::fst::{Arc, EPSILON, Label, VectorFst};
use crate::ops::{ProjectType, compose, concat, determinize, project, reverse, rm_weight};
use crate::semiring::Semiring;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Left context is matched against already rewritten output.
    LeftToRight,
    /// Right context is matched against already rewritten output.
    RightToLeft,
    /// Both contexts are matched against the input.
    Simultaneous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Obligatory,
    Optional,
}

#[derive(Debug, Clone, Copy)]
struct Markers {
    rbrace: Label,
    lbrace1: Label,
    lbrace2: Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerType {
    /// Insert a marker after every match.
    Insert,
    /// Admit (and consume) a marker only right after a match.
    Check,
    /// Admit (and consume) a marker only where no match ends.
    CheckComplement,
}

/// Compiles the rule over `alphabet`.
pub fn cdrewrite<W: Semiring>(
    tau: &VectorFst<W>,
    lambda: &VectorFst<W>,
    rho: &VectorFst<W>,
    alphabet: &BTreeSet<Label>,
    direction: Direction,
    mode: Mode,
) -> VectorFst<W> {
    let mut alphabet = alphabet.clone();
    alphabet.extend(tau.labels());
    let alphabet = &alphabet;
    let top = [tau, lambda, rho]
        .iter()
        .map(|fst| fst.max_label())
        .chain(alphabet.iter().copied())
        .max()
        .unwrap_or(EPSILON);
    let markers = Markers {
        rbrace: top + 1,
        lbrace1: top + 2,
        lbrace2: top + 3,
    };
    match direction {
        Direction::LeftToRight | Direction::Simultaneous => {
            compile(tau, lambda, rho, alphabet, direction, mode, markers)
        }
        Direction::RightToLeft => {
            let rule = compile(
                &reverse(tau),
                &reverse(rho),
                &reverse(lambda),
                alphabet,
                Direction::LeftToRight,
                mode,
                markers,
            );
            reverse(&rule)
        }
    }
}

/// Compiles the rule over the labels of `sigma_star` extended with the
/// boundary labels `bos` and `eos`, then wraps it so that the contexts
/// may mention the boundaries while inputs and outputs never contain
/// them.
pub fn cdrewrite_with_boundaries<W: Semiring>(
    tau: &VectorFst<W>,
    lambda: &VectorFst<W>,
    rho: &VectorFst<W>,
    sigma_star: &VectorFst<W>,
    (bos, eos): (Label, Label),
    direction: Direction,
    mode: Mode,
) -> Result<VectorFst<W>, FstError> {
    if !sigma_star.is_acceptor() {
        return Err(FstError::NotAcceptor);
    }
    let mut base = sigma_star.labels();
    base.extend(tau.labels());
    let mut alphabet = base.clone();
    alphabet.insert(bos);
    alphabet.insert(eos);
    let rule = cdrewrite(tau, lambda, rho, &alphabet, direction, mode);
    let inserter = boundary_transducer(&base, (EPSILON, bos), (EPSILON, eos));
    let deleter = boundary_transducer(&base, (bos, EPSILON), (eos, EPSILON));
    Ok(compose(&compose(&inserter, &rule), &deleter))
}

fn boundary_transducer<W: Semiring>(
    alphabet: &BTreeSet<Label>,
    (bos_in, bos_out): (Label, Label),
    (eos_in, eos_out): (Label, Label),
) -> VectorFst<W> {
    let mut fst = VectorFst::new();
    let begin = fst.add_state();
    let body = fst.add_state();
    let end = fst.add_state();
    fst.set_start(begin);
    fst.set_final(end, W::one());
    fst.add_arc(begin, Arc::new(bos_in, bos_out, W::one(), body));
    for &label in alphabet {
        fst.add_arc(body, Arc::new(label, label, W::one(), body));
    }
    fst.add_arc(body, Arc::new(eos_in, eos_out, W::one(), end));
    fst
}

fn compile<W: Semiring>(
    tau: &VectorFst<W>,
    lambda: &VectorFst<W>,
    rho: &VectorFst<W>,
    alphabet: &BTreeSet<Label>,
    direction: Direction,
    mode: Mode,
    m: Markers,
) -> VectorFst<W> {
    let simultaneous = direction == Direction::Simultaneous;
    let sigma: Vec<Label> = alphabet.iter().copied().collect();
    let phi = input_language(tau);

    let r = reverse(&mark(
        &sigma_star_then(&sigma, &reverse(&input_language(rho))),
        MarkerType::Insert,
        &[m.rbrace],
        true,
    ));

    let mut sigma_rb = sigma.clone();
    sigma_rb.push(m.rbrace);
    let mut phi_rb = with_inner_markers(&phi, &[m.rbrace], false);
    concat(&mut phi_rb, &VectorFst::from_labels(&[m.rbrace]));
    let f = reverse(&mark(
        &sigma_star_then(&sigma_rb, &reverse(&phi_rb)),
        MarkerType::Insert,
        &[m.lbrace1, m.lbrace2],
        true,
    ));

    let replace = replace_transducer(tau, &sigma, m, simultaneous);
    let lambda_dfa = sigma_star_then(&sigma, &input_language(lambda));

    let (l1, l2) = if simultaneous {
        let mut l1 = mark(&lambda_dfa, MarkerType::Check, &[m.lbrace1], false);
        add_loops(&mut l1, &[m.rbrace, m.lbrace2]);
        let l2 = match mode {
            Mode::Obligatory => {
                let mut l2 = mark(&lambda_dfa, MarkerType::CheckComplement, &[m.lbrace2], false);
                add_loops(&mut l2, &[m.rbrace, m.lbrace1]);
                Some(l2)
            }
            Mode::Optional => None,
        };
        (l1, l2)
    } else {
        let mut l1 = mark(&lambda_dfa, MarkerType::Check, &[m.lbrace1], true);
        add_loops(&mut l1, &[m.lbrace2]);
        let l2 = match mode {
            Mode::Obligatory => mark(&lambda_dfa, MarkerType::CheckComplement, &[m.lbrace2], true),
            Mode::Optional => {
                let mut deleter = sigma_loop(&sigma);
                deleter.add_arc(0, Arc::new(m.lbrace2, EPSILON, W::one(), 0));
                deleter
            }
        };
        (l1, Some(l2))
    };

    let mut out = compose(&r, &f);
    if simultaneous {
        out = compose(&out, &l1);
        if let Some(l2) = &l2 {
            out = compose(&out, l2);
        }
        compose(&out, &replace)
    } else {
        out = compose(&out, &replace);
        out = compose(&out, &l1);
        match &l2 {
            Some(l2) => compose(&out, l2),
            None => out,
        }
    }
}

/// Unweighted acceptor for the input side of `fst`.
fn input_language<W: Semiring>(fst: &VectorFst<W>) -> VectorFst<W> {
    let mut out = fst.clone();
    project(&mut out, ProjectType::Input);
    rm_weight(&mut out);
    out
}

/// One state, start and final, with an identity loop per label.
fn sigma_loop<W: Semiring>(labels: &[Label]) -> VectorFst<W> {
    let mut fst = VectorFst::new();
    let s = fst.add_state();
    fst.set_start(s);
    fst.set_final(s, W::one());
    for &label in labels {
        fst.add_arc(s, Arc::new(label, label, W::one(), s));
    }
    fst
}

/// Deterministic acceptor for `labels* beta`. Since every subset contains
/// the looping start state, it is complete over `labels`, and a state is
/// final exactly when the prefix read so far ends with a match of `beta`.
fn sigma_star_then<W: Semiring>(labels: &[Label], beta: &VectorFst<W>) -> VectorFst<W> {
    let mut fst = sigma_loop(labels);
    concat(&mut fst, beta);
    let mut dfa = determinize(&fst);
    rm_weight(&mut dfa);
    dfa
}

fn add_loops<W: Semiring>(fst: &mut VectorFst<W>, labels: &[Label]) {
    for s in fst.states() {
        for &label in labels {
            fst.add_arc(s, Arc::new(label, label, W::one(), s));
        }
    }
}

/// `fst` with `markers` allowed anywhere except before its first symbol,
/// either passed through or deleted.
fn with_inner_markers<W: Semiring>(fst: &VectorFst<W>, markers: &[Label], delete: bool) -> VectorFst<W> {
    let mut out = fst.clone();
    let Some(start) = fst.start() else {
        return out;
    };
    for s in out.states() {
        for &marker in markers {
            let olabel = if delete { EPSILON } else { marker };
            out.add_arc(s, Arc::new(marker, olabel, W::one(), s));
        }
    }
    let entry = out.add_state();
    for arc in fst.arcs(start) {
        out.add_arc(entry, *arc);
    }
    out.set_final(entry, fst.final_weight(start));
    out.set_start(entry);
    out
}

/// Turns a deterministic acceptor into an identity transducer that
/// inserts or checks `markers` at the positions where `dfa` is final.
fn mark<W: Semiring>(
    dfa: &VectorFst<W>,
    marker_type: MarkerType,
    markers: &[Label],
    delete: bool,
) -> VectorFst<W> {
    let mut out = dfa.clone();
    match marker_type {
        MarkerType::Insert => {
            for s in dfa.states() {
                if !dfa.is_final(s) {
                    out.set_final(s, W::one());
                    continue;
                }
                let after = out.add_state();
                let arcs = std::mem::take(out.arcs_mut(s));
                *out.arcs_mut(after) = arcs;
                for &marker in markers {
                    out.add_arc(s, Arc::new(EPSILON, marker, W::one(), after));
                }
                out.set_final(s, W::zero());
                out.set_final(after, W::one());
            }
        }
        MarkerType::Check | MarkerType::CheckComplement => {
            let on_match = marker_type == MarkerType::Check;
            for s in dfa.states() {
                if dfa.is_final(s) == on_match {
                    for &marker in markers {
                        let olabel = if delete { EPSILON } else { marker };
                        out.add_arc(s, Arc::new(marker, olabel, W::one(), s));
                    }
                }
                out.set_final(s, W::one());
            }
        }
    }
    out
}

/// Identity on the alphabet, deleting `>`; each `<1 phi >` span is
/// rewritten through `tau` with any markers inside it deleted.
fn replace_transducer<W: Semiring>(
    tau: &VectorFst<W>,
    sigma: &[Label],
    m: Markers,
    simultaneous: bool,
) -> VectorFst<W> {
    let mut out = sigma_loop(sigma);
    let hub = 0;
    out.add_arc(hub, Arc::new(m.rbrace, EPSILON, W::one(), hub));
    let kept = |marker: Label| if simultaneous { EPSILON } else { marker };
    out.add_arc(hub, Arc::new(m.lbrace2, kept(m.lbrace2), W::one(), hub));

    let inner = with_inner_markers(tau, &[m.lbrace1, m.lbrace2, m.rbrace], true);
    let Some(inner_start) = inner.start() else {
        return out;
    };
    let offset = out.append(&inner);
    out.add_arc(
        hub,
        Arc::new(m.lbrace1, kept(m.lbrace1), W::one(), inner_start + offset),
    );
    for s in inner.states() {
        if inner.is_final(s) {
            out.set_final(s + offset, W::zero());
            out.add_arc(
                s + offset,
                Arc::new(m.rbrace, EPSILON, inner.final_weight(s), hub),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::paths::transduce;
    use crate::semiring::TropicalWeight;

    type W = TropicalWeight;

    const A: Label = 1;
    const B: Label = 2;
    const C: Label = 3;
    const D: Label = 4;

    fn alphabet() -> BTreeSet<Label> {
        BTreeSet::from([A, B, C, D])
    }

    fn a_to_b() -> VectorFst<W> {
        VectorFst::from_label_pairs(&[A], &[B])
    }

    fn rewrite(rule: &VectorFst<W>, input: &[Label]) -> Vec<Vec<Label>> {
        transduce(rule, input)
    }

    #[test]
    fn rewrites_only_inside_contexts() {
        let rule = cdrewrite(
            &a_to_b(),
            &VectorFst::from_labels(&[C]),
            &VectorFst::from_labels(&[D]),
            &alphabet(),
            Direction::LeftToRight,
            Mode::Obligatory,
        );
        assert_eq!(rewrite(&rule, &[C, A, D]), vec![vec![C, B, D]]);
        assert_eq!(rewrite(&rule, &[C, A, B]), vec![vec![C, A, B]]);
        assert_eq!(rewrite(&rule, &[D, A, D]), vec![vec![D, A, D]]);
        assert_eq!(
            rewrite(&rule, &[C, A, D, C, A, D]),
            vec![vec![C, B, D, C, B, D]]
        );
    }

    #[test]
    fn empty_contexts_rewrite_everywhere() {
        let rule = cdrewrite(
            &a_to_b(),
            &VectorFst::epsilon(),
            &VectorFst::epsilon(),
            &alphabet(),
            Direction::LeftToRight,
            Mode::Obligatory,
        );
        assert_eq!(rewrite(&rule, &[A, A]), vec![vec![B, B]]);
        assert_eq!(rewrite(&rule, &[C, A]), vec![vec![C, B]]);
        assert_eq!(rewrite(&rule, &[]), vec![Vec::<Label>::new()]);
    }

    #[test]
    fn insertion_rule_fires_between_contexts() {
        const X: Label = 5;
        let insert_x = VectorFst::from_label_pairs(&[], &[X]);
        let rule = cdrewrite(
            &insert_x,
            &VectorFst::from_labels(&[C]),
            &VectorFst::from_labels(&[D]),
            &alphabet(),
            Direction::LeftToRight,
            Mode::Obligatory,
        );
        assert_eq!(rewrite(&rule, &[C, D]), vec![vec![C, X, D]]);
        assert_eq!(rewrite(&rule, &[C]), vec![vec![C]]);
        assert_eq!(rewrite(&rule, &[A, B]), vec![vec![A, B]]);
        assert_eq!(rewrite(&rule, &[C, D, C, D]), vec![vec![C, X, D, C, X, D]]);
    }

    #[test]
    fn insertion_output_outside_sigma_survives_boundaries() {
        const X: Label = 5;
        const BOS: Label = 100;
        const EOS: Label = 101;
        let sigma_star = sigma_loop::<W>(&[A, B, C, D]);
        let rule = cdrewrite_with_boundaries(
            &VectorFst::from_label_pairs(&[], &[X]),
            &VectorFst::from_labels(&[C]),
            &VectorFst::from_labels(&[D]),
            &sigma_star,
            (BOS, EOS),
            Direction::LeftToRight,
            Mode::Obligatory,
        )
        .expect("compile");
        assert_eq!(rewrite(&rule, &[C, D]), vec![vec![C, X, D]]);
        assert_eq!(rewrite(&rule, &[A, B]), vec![vec![A, B]]);
    }

    #[test]
    fn optional_mode_keeps_both_outputs() {
        let rule = cdrewrite(
            &a_to_b(),
            &VectorFst::from_labels(&[C]),
            &VectorFst::epsilon(),
            &alphabet(),
            Direction::LeftToRight,
            Mode::Optional,
        );
        assert_eq!(rewrite(&rule, &[C, A]), vec![vec![C, A], vec![C, B]]);
        assert_eq!(rewrite(&rule, &[D, A]), vec![vec![D, A]]);
    }

    #[test]
    fn direction_decides_which_side_sees_rewritten_text() {
        let left_a = VectorFst::from_labels(&[A]);
        let compile_in = |direction| {
            cdrewrite(
                &a_to_b(),
                &left_a,
                &VectorFst::epsilon(),
                &alphabet(),
                direction,
                Mode::Obligatory,
            )
        };
        let ltr = compile_in(Direction::LeftToRight);
        let sim = compile_in(Direction::Simultaneous);
        let rtl = compile_in(Direction::RightToLeft);
        assert_eq!(rewrite(&ltr, &[A, A, A]), vec![vec![A, B, A]]);
        assert_eq!(rewrite(&sim, &[A, A, A]), vec![vec![A, B, B]]);
        assert_eq!(rewrite(&rtl, &[A, A, A]), vec![vec![A, B, B]]);
    }

    #[test]
    fn boundary_markers_anchor_contexts() {
        const BOS: Label = 100;
        const EOS: Label = 101;
        let sigma_star = sigma_loop::<W>(&[A, B, C, D]);
        let rule = cdrewrite_with_boundaries(
            &a_to_b(),
            &VectorFst::from_labels(&[BOS]),
            &VectorFst::epsilon(),
            &sigma_star,
            (BOS, EOS),
            Direction::LeftToRight,
            Mode::Obligatory,
        )
        .expect("compile");
        assert_eq!(rewrite(&rule, &[A, A]), vec![vec![B, A]]);
        assert_eq!(rewrite(&rule, &[C, A]), vec![vec![C, A]]);
    }
}
