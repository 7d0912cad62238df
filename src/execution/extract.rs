//! Result extractor: decide whether captured text is handed back verbatim or
//! decoded into a scalar/table.

use std::collections::BTreeSet;

use super::ResultType;
use crate::codec::{decode, EvaluationResult, TableHeuristic};

pub fn classify_and_decode(
    raw: &str,
    result_type: ResultType,
    result_params: &BTreeSet<String>,
    heuristic: &TableHeuristic,
) -> EvaluationResult {
    let has = |p: &str| result_params.contains(p);

    if has("code") {
        return EvaluationResult::Raw(raw.to_string());
    }
    if result_type == ResultType::Output && has("output") && !has("table") {
        return EvaluationResult::Raw(raw.to_string());
    }
    decode(raw, heuristic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Scalar;

    fn params(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run(raw: &str, ty: ResultType, list: &[&str]) -> EvaluationResult {
        classify_and_decode(raw, ty, &params(list), &TableHeuristic::default())
    }

    #[test]
    fn code_wins_in_every_mode() {
        assert_eq!(run("1\t2", ResultType::Value, &["code"]), EvaluationResult::Raw("1\t2".into()));
        assert_eq!(
            run("1\t2", ResultType::Output, &["code", "table"]),
            EvaluationResult::Raw("1\t2".into())
        );
    }

    #[test]
    fn output_param_keeps_console_text() {
        assert_eq!(run("21", ResultType::Output, &["output"]), EvaluationResult::Raw("21".into()));
    }

    #[test]
    fn output_with_table_is_decoded() {
        assert_eq!(
            run("1\t2", ResultType::Output, &["output", "table"]),
            EvaluationResult::Table(vec![vec![Scalar::Int(1), Scalar::Int(2)]])
        );
    }

    #[test]
    fn bare_output_mode_is_decoded() {
        assert_eq!(run("21", ResultType::Output, &[]), EvaluationResult::Scalar(Scalar::Int(21)));
    }

    #[test]
    fn value_mode_is_decoded_even_with_output_param() {
        assert_eq!(
            run("21\n", ResultType::Value, &["output", "pp"]),
            EvaluationResult::Scalar(Scalar::Int(21))
        );
    }
}
