use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::Result;
use evalblock::{
    Engine, EngineOptions, EvalError, EvaluationResult, Fragment, HostValue, InterpreterType,
    ResultType, Scalar,
};

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

macro_rules! require_python {
    () => {
        if !python_available() {
            println!("python3 not found; skipping");
            return Ok(());
        }
    };
}

fn engine(session_wait: Duration) -> Engine {
    Engine::new(EngineOptions {
        interpreter: InterpreterType::Python,
        session_wait,
        ..Default::default()
    })
}

fn output(source: &str, session: &str) -> Fragment {
    Fragment::new(source)
        .session(session)
        .result_type(ResultType::Output)
        .param("output")
}

#[tokio::test]
async fn print_yields_exact_text() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    for session in ["none", "p"] {
        let eval = e.evaluate(&output("print(\"hello\")", session)).await?;
        assert_eq!(eval.result, EvaluationResult::Raw("hello".into()), "session {session}");
    }
    Ok(())
}

#[tokio::test]
async fn final_expression_is_the_value() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    for session in ["none", "p"] {
        let eval = e
            .evaluate(&Fragment::new("print('noise')\n20 + 1").session(session))
            .await?;
        assert_eq!(eval.result, EvaluationResult::Scalar(Scalar::Int(21)), "session {session}");
    }
    Ok(())
}

#[tokio::test]
async fn compound_statements_work_in_sessions() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    let src = "total = 0\nfor i in range(4):\n    total += i\nprint(total)";
    let eval = e.evaluate(&output(src, "loop")).await?;
    assert_eq!(eval.result, EvaluationResult::Raw("6".into()));
    Ok(())
}

#[tokio::test]
async fn session_keeps_bindings() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    e.evaluate(&Fragment::new("x = 5").session("s")).await?;
    let eval = e.evaluate(&Fragment::new("x + 1").session("s")).await?;
    assert_eq!(eval.result, EvaluationResult::Scalar(Scalar::Int(6)));

    // No shared state without a session: the name is unbound.
    let err = e.evaluate(&Fragment::new("x + 1")).await.unwrap_err();
    assert!(matches!(err, EvalError::NonZeroExit { ref stderr, .. } if stderr.contains("NameError")));

    let err = e.evaluate(&Fragment::new("x + 1").session("other")).await.unwrap_err();
    assert!(matches!(err, EvalError::MissingArtifact { ref transcript } if transcript.contains("NameError")));
    Ok(())
}

#[tokio::test]
async fn list_of_rows_is_a_table() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    let eval = e.evaluate(&Fragment::new("[[1, 2], [3, 4]]").session("t")).await?;
    assert_eq!(
        eval.result,
        EvaluationResult::Table(vec![
            vec![Scalar::Int(1), Scalar::Int(2)],
            vec![Scalar::Int(3), Scalar::Int(4)],
        ])
    );
    Ok(())
}

#[tokio::test]
async fn scalars_round_trip_through_the_interpreter() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    let cases = [
        (HostValue::Int(-7), Scalar::Int(-7)),
        (HostValue::Float(2.5), Scalar::Float(2.5)),
        (HostValue::Bool(true), Scalar::Bool(true)),
        (HostValue::Str("hello world".into()), Scalar::Str("hello world".into())),
        (HostValue::Null, Scalar::Null),
    ];
    for (host, expected) in cases {
        let f = Fragment::new("v").var("v", host.clone()).session("rt");
        let eval = e.evaluate(&f).await?;
        assert_eq!(eval.result, EvaluationResult::Scalar(expected), "host value {host:?}");
    }
    Ok(())
}

// Decoding types text by its shape, so these strings come back as
// something other than the string that went in.
#[tokio::test]
async fn typed_looking_strings_decode_by_shape() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    let cases = [
        ("42", Scalar::Int(42)),
        ("2.5", Scalar::Float(2.5)),
        ("True", Scalar::Bool(true)),
        ("", Scalar::Null),
        ("  padded  ", Scalar::Str("padded".into())),
    ];
    for (text, expected) in cases {
        let f = Fragment::new("v").var("v", HostValue::Str(text.into())).session("lossy");
        let eval = e.evaluate(&f).await?;
        assert_eq!(eval.result, EvaluationResult::Scalar(expected), "string {text:?}");
    }
    Ok(())
}

#[tokio::test]
async fn pretty_print_keeps_structure() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(20));
    let eval = e
        .evaluate(&Fragment::new("{'a': 1}").param("pp").param("code"))
        .await?;
    assert_eq!(eval.result, EvaluationResult::Raw("{'a': 1}".into()));
    Ok(())
}

#[tokio::test]
async fn hung_session_times_out_and_recovers() -> Result<()> {
    require_python!();
    let e = engine(Duration::from_secs(2));
    e.evaluate(&Fragment::new("import time").session("h")).await?;

    let started = Instant::now();
    let err = e.evaluate(&output("time.sleep(60)", "h")).await.unwrap_err();
    assert!(matches!(err, EvalError::SessionUnresponsive { .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));

    let eval = e.evaluate(&Fragment::new("'time' in globals()").session("h")).await?;
    assert_eq!(eval.result, EvaluationResult::Scalar(Scalar::Bool(false)));
    Ok(())
}
