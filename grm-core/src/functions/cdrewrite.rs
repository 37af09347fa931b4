//! `CDRewrite[tau, lambda, rho, sigma_star, direction?, mode?]`.

use grm_fst::cdrewrite::{Direction, Mode, cdrewrite_with_boundaries};

use super::{Args, Function, FunctionContext, Registry, fst_value};
use crate::error::FunctionError;
use crate::labels::{BOS_LABEL, EOS_LABEL};
use crate::value::{FstWeight, Value};

const NAME: &str = "CDRewrite";

pub(super) fn register<W: FstWeight>(registry: &mut Registry<W>) {
    registry.register(CdRewrite);
}

/// Rewrites `tau` between `lambda` and `rho` over the alphabet of
/// `sigma_star`. The contexts may use `[BOS]` and `[EOS]` to anchor at
/// the string boundaries. Defaults to left-to-right and obligatory.
struct CdRewrite;

impl<W: FstWeight> Function<W> for CdRewrite {
    fn name(&self) -> &'static str {
        NAME
    }

    fn execute(&self, args: Vec<Value>, _ctx: &FunctionContext<'_>) -> Result<Value, FunctionError> {
        let mut args = Args::new(NAME, args, &[4, 6])?;
        let tau = args.fst::<W>(0)?;
        let lambda = args.fst::<W>(1)?;
        let rho = args.fst::<W>(2)?;
        let sigma_star = args.fst::<W>(3)?;
        let (direction, mode) = if args.len() == 6 {
            let direction = match args.string(4)?.as_str() {
                "ltr" => Direction::LeftToRight,
                "rtl" => Direction::RightToLeft,
                "sim" => Direction::Simultaneous,
                other => return Err(FunctionError::invalid(NAME, format!("Invalid direction: {other}"))),
            };
            let mode = match args.string(5)?.as_str() {
                "obl" => Mode::Obligatory,
                "opt" => Mode::Optional,
                other => return Err(FunctionError::invalid(NAME, format!("Invalid mode: {other}"))),
            };
            (direction, mode)
        } else {
            (Direction::LeftToRight, Mode::Obligatory)
        };
        let rule = cdrewrite_with_boundaries(
            tau.vector(),
            lambda.vector(),
            rho.vector(),
            sigma_star.vector(),
            (BOS_LABEL, EOS_LABEL),
            direction,
            mode,
        )
        .map_err(|source| FunctionError::Fst { name: NAME, source })?;
        Ok(fst_value(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::labels::LabelManager;
    use grm_fst::VectorFst;
    use grm_fst::Label;

    fn sigma_star() -> Value {
        let letters = ["a", "b", "c", "d"].map(acceptor).into_iter();
        let sigma = letters
            .reduce(|left, right| call("Union", vec![left, right]).expect("union"))
            .expect("letters");
        call("Closure", vec![sigma]).expect("closure")
    }

    fn rewrite(from: &str, to: &str) -> Value {
        call("Rewrite", vec![acceptor(from), acceptor(to)]).expect("rewrite")
    }

    fn string(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn rewrites_only_in_context() {
        let rule = call(
            "CDRewrite",
            vec![rewrite("a", "b"), acceptor("c"), acceptor("d"), sigma_star()],
        )
        .expect("rule");
        assert_eq!(outputs(&rule, "cad"), ["cbd"]);
        assert_eq!(outputs(&rule, "cab"), ["cab"]);
        assert_eq!(outputs(&rule, "dad"), ["dad"]);
    }

    #[test]
    fn insertion_outside_sigma_is_emitted() {
        let rule = call(
            "CDRewrite",
            vec![rewrite("", "x"), acceptor("c"), acceptor("d"), sigma_star()],
        )
        .expect("rule");
        assert_eq!(outputs(&rule, "cd"), ["cxd"]);
        assert_eq!(outputs(&rule, "c"), ["c"]);
        assert_eq!(outputs(&rule, "ab"), ["ab"]);
    }

    #[test]
    fn boundary_context_anchors_rule() {
        let labels = LabelManager::new();
        let bos = call_in(
            "StringFst",
            vec![Value::Int(0), string("[BOS]")],
            std::path::Path::new("."),
            &labels,
        )
        .expect("bos");
        let rule = call("CDRewrite", vec![rewrite("a", "b"), bos, acceptor(""), sigma_star()]).expect("rule");
        assert_eq!(outputs(&rule, "aa"), ["ba"]);
    }

    #[test]
    fn direction_and_mode_arguments() {
        let rule = call(
            "CDRewrite",
            vec![
                rewrite("a", "b"),
                acceptor(""),
                acceptor(""),
                sigma_star(),
                string("sim"),
                string("opt"),
            ],
        )
        .expect("rule");
        assert_eq!(outputs(&rule, "a"), ["a", "b"]);
        let err = call(
            "CDRewrite",
            vec![
                rewrite("a", "b"),
                acceptor(""),
                acceptor(""),
                sigma_star(),
                string("up"),
                string("obl"),
            ],
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "CDRewrite: Invalid direction: up");
    }

    #[test]
    fn transducer_alphabet_is_rejected() {
        let sigma: Value = fst_value(VectorFst::<W>::from_label_pairs(&[97 as Label], &[98]));
        let err = call("CDRewrite", vec![rewrite("a", "b"), acceptor(""), acceptor(""), sigma]).unwrap_err();
        assert!(matches!(err, FunctionError::Fst { name: "CDRewrite", .. }));
    }
}
