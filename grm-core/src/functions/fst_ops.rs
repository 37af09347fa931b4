//! Algebra over automaton arguments.

use grm_fst::ops::{
    self, ArcSortType, ClosureType, ProjectType, arc_sort, closure, concat, concat_range, connect, determinize,
    invert, minimize, optimize, project, reverse, rm_epsilon, rm_weight, shortest_path, union,
};
use grm_fst::{Fst, VectorFst};

use super::{Args, Function, FunctionContext, Registry, fst_value};
use crate::error::FunctionError;
use crate::value::{FstWeight, Value};

pub(super) fn register<W: FstWeight>(registry: &mut Registry<W>) {
    let unary: [(&'static str, fn(VectorFst<W>) -> VectorFst<W>); 9] = [
        ("Connect", |mut fst| {
            connect(&mut fst);
            fst
        }),
        ("Determinize", |fst| determinize(&fst)),
        ("Expand", |fst| fst),
        ("Invert", |mut fst| {
            invert(&mut fst);
            fst
        }),
        ("Minimize", |fst| minimize(&fst)),
        ("Optimize", |fst| optimize(&fst)),
        ("Reverse", |fst| reverse(&fst)),
        ("RmEpsilon", |mut fst| {
            rm_epsilon(&mut fst);
            fst
        }),
        ("RmWeight", |mut fst| {
            rm_weight(&mut fst);
            fst
        }),
    ];
    for (name, op) in unary {
        registry.register(Unary { name, op });
    }
    registry.register(Binary { name: "Union", delayed: false });
    registry.register(Binary { name: "UnionDelayed", delayed: true });
    registry.register(Binary { name: "Concat", delayed: false });
    registry.register(Binary { name: "ConcatDelayed", delayed: true });
    registry.register(ArcSort);
    registry.register(Closure);
    registry.register(Compose);
    registry.register(Difference);
    registry.register(LenientlyCompose);
    registry.register(Project);
    registry.register(Rewrite);
    registry.register(ShortestPath);
    registry.register(Weight);
}

/// A one-argument function that maps an automaton to an automaton.
struct Unary<W> {
    name: &'static str,
    op: fn(VectorFst<W>) -> VectorFst<W>,
}

impl<W: FstWeight> Function<W> for Unary<W> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let mut args = Args::new(self.name, args, &[1])?;
        let fst = args.vector::<W>(0)?;
        Ok(fst_value((self.op)(fst)))
    }
}

/// Union or concatenation of two automata.
struct Binary {
    name: &'static str,
    delayed: bool,
}

impl<W: FstWeight> Function<W> for Binary {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let mut args = Args::new(self.name, args, &[2])?;
        let left = args.fst::<W>(0)?;
        let right = args.fst::<W>(1)?;
        let is_union = self.name.starts_with("Union");
        if self.delayed {
            let view = if is_union {
                Fst::delayed_union(left, right)
            } else {
                Fst::delayed_concat(left, right)
            };
            return Ok(Value::from(view));
        }
        let mut out = left.into_vector();
        if is_union {
            union(&mut out, right.vector());
        } else {
            concat(&mut out, right.vector());
        }
        Ok(fst_value(out))
    }
}

fn side(name: &'static str, text: &str) -> Result<ProjectType, FunctionError> {
    match text {
        "input" => Ok(ProjectType::Input),
        "output" => Ok(ProjectType::Output),
        other => Err(FunctionError::invalid(
            name,
            format!("Invalid side '{other}', expected 'input' or 'output'"),
        )),
    }
}

struct ArcSort;

impl<W: FstWeight> Function<W> for ArcSort {
    fn name(&self) -> &'static str {
        "ArcSort"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[2])?;
        let mut fst = args.vector::<W>(0)?;
        let sort_type = match side(name, &args.string(1)?)? {
            ProjectType::Input => ArcSortType::Input,
            ProjectType::Output => ArcSortType::Output,
        };
        arc_sort(&mut fst, sort_type);
        Ok(fst_value(fst))
    }
}

/// `Closure[f]` is the Kleene star; `Closure[f, lo, hi]` repeats between
/// `lo` and `hi` times, where a `hi` of zero is unbounded.
struct Closure;

impl<W: FstWeight> Function<W> for Closure {
    fn name(&self) -> &'static str {
        "Closure"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[1, 3])?;
        let mut fst = args.vector::<W>(0)?;
        if args.len() == 1 {
            closure(&mut fst, ClosureType::Star);
            return Ok(fst_value(fst));
        }
        let lower = args.int(1)?;
        let upper = args.int(2)?;
        if lower < 0 || upper < 0 {
            return Err(FunctionError::invalid(name, "repetition bounds must be non-negative"));
        }
        if upper != 0 && upper < lower {
            return Err(FunctionError::invalid(
                name,
                format!("lower bound {lower} exceeds upper bound {upper}"),
            ));
        }
        match (lower, upper) {
            (0, 0) => closure(&mut fst, ClosureType::Star),
            (1, 0) => closure(&mut fst, ClosureType::Plus),
            (lower, upper) => concat_range(&mut fst, lower as u32, upper as u32),
        }
        Ok(fst_value(fst))
    }
}

/// Delayed composition. An optional third argument arc-sorts the left
/// operand on output, the right one on input, or both.
struct Compose;

impl<W: FstWeight> Function<W> for Compose {
    fn name(&self) -> &'static str {
        "Compose"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[2, 3])?;
        let mut left = args.fst::<W>(0)?;
        let mut right = args.fst::<W>(1)?;
        if args.len() == 3 {
            let (sort_left, sort_right) = match args.string(2)?.as_str() {
                "left" => (true, false),
                "right" => (false, true),
                "both" => (true, true),
                other => {
                    return Err(FunctionError::invalid(
                        name,
                        format!("Invalid sort mode '{other}', expected 'left', 'right' or 'both'"),
                    ));
                }
            };
            if sort_left {
                let mut fst = left.into_vector();
                arc_sort(&mut fst, ArcSortType::Output);
                left = Fst::from(fst);
            }
            if sort_right {
                let mut fst = right.into_vector();
                arc_sort(&mut fst, ArcSortType::Input);
                right = Fst::from(fst);
            }
        }
        Ok(Value::from(Fst::delayed_compose(left, right)))
    }
}

struct Difference;

impl<W: FstWeight> Function<W> for Difference {
    fn name(&self) -> &'static str {
        "Difference"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[2])?;
        let fst = args.fst::<W>(0)?;
        let subtrahend = args.fst::<W>(1)?;
        let out = ops::difference(fst.vector(), subtrahend.vector()).map_err(|source| FunctionError::Fst { name, source })?;
        Ok(fst_value(out))
    }
}

/// `LenientlyCompose[f, constraint, sigma_star]`.
struct LenientlyCompose;

impl<W: FstWeight> Function<W> for LenientlyCompose {
    fn name(&self) -> &'static str {
        "LenientlyCompose"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[3])?;
        let fst = args.fst::<W>(0)?;
        let constraint = args.fst::<W>(1)?;
        let sigma_star = args.fst::<W>(2)?;
        let out = ops::lenient_compose(fst.vector(), constraint.vector(), sigma_star.vector())
            .map_err(|source| FunctionError::Fst { name, source })?;
        Ok(fst_value(out))
    }
}

struct Project;

impl<W: FstWeight> Function<W> for Project {
    fn name(&self) -> &'static str {
        "Project"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[2])?;
        let mut fst = args.vector::<W>(0)?;
        project(&mut fst, side(name, &args.string(1)?)?);
        Ok(fst_value(fst))
    }
}

/// Cross product of two languages: every string of the first rewrites
/// to every string of the second.
struct Rewrite;

impl<W: FstWeight> Function<W> for Rewrite {
    fn name(&self) -> &'static str {
        "Rewrite"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[2])?;
        let input = args.fst::<W>(0)?;
        let output = args.fst::<W>(1)?;
        for (index, fst) in [&input, &output].into_iter().enumerate() {
            if !fst.vector().is_acceptor() {
                return Err(FunctionError::invalid(
                    name,
                    format!("Expected acceptor for argument {}, got transducer", index + 1),
                ));
            }
        }
        Ok(fst_value(ops::cross(input.vector(), output.vector())))
    }
}

/// `ShortestPath[f]` or `ShortestPath[f, n]`, keeping the `n` best
/// distinct paths.
struct ShortestPath;

impl<W: FstWeight> Function<W> for ShortestPath {
    fn name(&self) -> &'static str {
        "ShortestPath"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[1, 2])?;
        let fst = args.fst::<W>(0)?;
        let n = if args.len() == 2 { args.int(1)? } else { 1 };
        if n < 1 {
            return Err(FunctionError::invalid(name, format!("path count must be positive, got {n}")));
        }
        Ok(fst_value(shortest_path(fst.vector(), n as usize, true)))
    }
}

/// `Weight[f, 'w']` multiplies every final weight by `w`.
struct Weight;

impl<W: FstWeight> Function<W> for Weight {
    fn name(&self) -> &'static str {
        "Weight"
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let name = <Self as Function<W>>::name(self);
        let mut args = Args::new(name, args, &[2])?;
        let mut fst = args.vector::<W>(0)?;
        let text = args.string(1)?;
        let weight = W::parse(&text).ok_or_else(|| FunctionError::invalid(name, format!("Invalid weight '{text}'")))?;
        for state in fst.states() {
            if fst.is_final(state) {
                let weighted = fst.final_weight(state).times(&weight);
                fst.set_final(state, weighted);
            }
        }
        Ok(fst_value(fst))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use grm_fst::TropicalWeight;
    use grm_fst::ops::paths::paths;

    fn string(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn concat_and_union_combine_languages() {
        let ab = call("Concat", vec![acceptor("a"), acceptor("b")]).expect("concat");
        assert_eq!(outputs(&ab, "ab"), ["ab"]);
        let either = call("Union", vec![ab, acceptor("c")]).expect("union");
        assert_eq!(outputs(&either, "c"), ["c"]);
        assert_eq!(outputs(&either, "ab"), ["ab"]);
    }

    #[test]
    fn delayed_variants_produce_views() {
        let view = call("UnionDelayed", vec![acceptor("a"), acceptor("b")]).expect("union");
        assert!(view.get::<Fst<W>>().is_delayed());
        assert_eq!(outputs(&view, "b"), ["b"]);
        let expanded = call("Expand", vec![view]).expect("expand");
        assert!(!expanded.get::<Fst<W>>().is_delayed());
    }

    #[test]
    fn closure_bounds_repetition() {
        let star = call("Closure", vec![acceptor("a")]).expect("star");
        assert_eq!(outputs(&star, ""), [""]);
        assert_eq!(outputs(&star, "aaa"), ["aaa"]);
        let range = call("Closure", vec![acceptor("a"), Value::Int(2), Value::Int(3)]).expect("range");
        assert!(outputs(&range, "a").is_empty());
        assert_eq!(outputs(&range, "aa"), ["aa"]);
        assert_eq!(outputs(&range, "aaa"), ["aaa"]);
        assert!(outputs(&range, "aaaa").is_empty());
        let err = call("Closure", vec![acceptor("a"), Value::Int(3), Value::Int(2)]).unwrap_err();
        assert!(matches!(err, FunctionError::Invalid { .. }));
    }

    #[test]
    fn rewrite_and_compose_chain_transductions() {
        let ab = call("Rewrite", vec![acceptor("a"), acceptor("b")]).expect("rewrite");
        let bc = call("Rewrite", vec![acceptor("b"), acceptor("c")]).expect("rewrite");
        let ac = call("Compose", vec![ab, bc, string("both")]).expect("compose");
        assert_eq!(outputs(&ac, "a"), ["c"]);
        let inverted = call("Invert", vec![ac]).expect("invert");
        assert_eq!(outputs(&inverted, "c"), ["a"]);
    }

    #[test]
    fn rewrite_rejects_transducers() {
        let ab = call("Rewrite", vec![acceptor("a"), acceptor("b")]).expect("rewrite");
        let err = call("Rewrite", vec![ab, acceptor("c")]).unwrap_err();
        assert_eq!(err.to_string(), "Rewrite: Expected acceptor for argument 1, got transducer");
    }

    #[test]
    fn project_keeps_one_side() {
        let ab = call("Rewrite", vec![acceptor("a"), acceptor("b")]).expect("rewrite");
        let output = call("Project", vec![ab, string("output")]).expect("project");
        assert_eq!(outputs(&output, "b"), ["b"]);
        let err = call("Project", vec![acceptor("a"), string("sideways")]).unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn difference_requires_unweighted_acceptor() {
        let ab = call("Union", vec![acceptor("a"), acceptor("b")]).expect("union");
        let only_b = call("Difference", vec![ab, acceptor("a")]).expect("difference");
        assert!(outputs(&only_b, "a").is_empty());
        assert_eq!(outputs(&only_b, "b"), ["b"]);
        let weighted = call("Weight", vec![acceptor("a"), string("1")]).expect("weight");
        let err = call("Difference", vec![acceptor("a"), weighted]).unwrap_err();
        assert!(matches!(err, FunctionError::Fst { name: "Difference", .. }));
    }

    #[test]
    fn weight_and_shortest_path_pick_cheapest() {
        let cheap = call("Weight", vec![acceptor("a"), string("1")]).expect("weight");
        let dear = call("Weight", vec![acceptor("b"), string("2")]).expect("weight");
        let both = call("Union", vec![cheap, dear]).expect("union");
        let best = call("ShortestPath", vec![both]).expect("shortest");
        let found = paths(best.get::<Fst<W>>().vector(), 10);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ilabels, bytes("a"));
        assert_eq!(found[0].weight, TropicalWeight(1.0));
        let err = call("Weight", vec![acceptor("a"), string("heavy")]).unwrap_err();
        assert!(err.to_string().contains("Invalid weight"));
    }

    #[test]
    fn optimize_preserves_language() {
        let ab = call("Union", vec![acceptor("ab"), acceptor("ab")]).expect("union");
        let optimized = call("Optimize", vec![ab]).expect("optimize");
        assert_eq!(optimized.get::<Fst<W>>().vector().num_states(), 3);
        assert_eq!(outputs(&optimized, "ab"), ["ab"]);
    }

    #[test]
    fn lenient_composition_falls_back() {
        let sigma = call("Closure", vec![call("Union", vec![acceptor("a"), acceptor("b")]).expect("union")])
            .expect("sigma");
        let rule = call("Union", vec![acceptor("a"), acceptor("b")]).expect("rule");
        let constraint = acceptor("a");
        let lenient = call("LenientlyCompose", vec![rule, constraint, sigma]).expect("lenient");
        assert_eq!(outputs(&lenient, "a"), ["a"]);
        assert_eq!(outputs(&lenient, "b"), ["b"]);
    }
}
