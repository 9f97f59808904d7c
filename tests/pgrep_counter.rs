// tests/pgrep_counter.rs

use std::path::Path;

use buildwatch::errors::{CountFailure, FailureKind};
use buildwatch::exec::{parse_counts, PgrepCounter, ProcessCounter, DEFAULT_OK_EXIT_CODES};
use buildwatch::types::{ProcessPattern, UserScope};
use buildwatch_test_utils::init_tracing;

fn pattern(p: &str) -> ProcessPattern {
    ProcessPattern::new(p).unwrap()
}

#[test]
fn scope_translates_to_user_filter() {
    let counter = PgrepCounter::new("pgrep").with_uid(1000);
    let p = pattern("^nix-daemon$");

    assert_eq!(
        counter.args(UserScope::CurrentUser, &p),
        vec!["-u", "1000", "-c", "^nix-daemon$"]
    );
    assert_eq!(
        counter.args(UserScope::CurrentUserAndRoot, &p),
        vec!["-u", "1000,0", "-c", "^nix-daemon$"]
    );
    assert_eq!(counter.args(UserScope::All, &p), vec!["-c", "^nix-daemon$"]);
}

#[test]
fn root_user_is_not_listed_twice() {
    let counter = PgrepCounter::new("pgrep").with_uid(0);
    assert_eq!(
        counter.args(UserScope::CurrentUserAndRoot, &pattern("nix")),
        vec!["-u", "0", "-c", "nix"]
    );
}

#[test]
fn pattern_is_a_single_argument() {
    let counter = PgrepCounter::new("pgrep");
    let args = counter.args(UserScope::All, &pattern("nix build; rm -rf /"));
    assert_eq!(args.last().map(String::as_str), Some("nix build; rm -rf /"));
    assert_eq!(args.len(), 2);
}

#[test]
fn parse_single_count() {
    assert_eq!(parse_counts("3\n"), Ok(vec![3]));
    assert_eq!(parse_counts("  0  "), Ok(vec![0]));
}

#[test]
fn parse_multiple_counts_keeps_order() {
    assert_eq!(parse_counts("2\n5\n"), Ok(vec![2, 5]));
}

#[test]
fn parse_rejects_garbage_and_empty_output() {
    for bad in ["", "\n", "three\n", "-1\n", "3 x\n", "2.5"] {
        let err = parse_counts(bad).unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryOutputMalformed, "input {bad:?}");
    }
}

#[cfg(unix)]
mod exit_status {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    use super::*;
    use buildwatch::exec::classify_exit;

    fn exited(code: i32) -> ExitStatus {
        ExitStatus::from_raw(code << 8)
    }

    fn classify(code: i32, stdout: &str) -> Result<Vec<u64>, CountFailure> {
        classify_exit(
            Path::new("pgrep"),
            exited(code),
            stdout,
            "",
            DEFAULT_OK_EXIT_CODES,
        )
    }

    #[test]
    fn exit_zero_parses_stdout() {
        assert_eq!(classify(0, "3\n"), Ok(vec![3]));
    }

    #[test]
    fn exit_one_means_no_match_not_failure() {
        assert_eq!(classify(1, "0\n"), Ok(vec![0]));
    }

    #[test]
    fn exit_127_is_tool_missing() {
        let err = classify(127, "").unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryToolMissing);
    }

    #[test]
    fn other_exit_codes_are_execution_failures() {
        let err = classify(2, "3\n").unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryExecutionFailed);
    }

    #[test]
    fn killed_by_signal_is_execution_failure() {
        let err = classify_exit(
            Path::new("pgrep"),
            ExitStatus::from_raw(9),
            "",
            "",
            DEFAULT_OK_EXIT_CODES,
        )
        .unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryExecutionFailed);
    }

    #[test]
    fn accepted_codes_are_configurable() {
        let outcome = classify_exit(Path::new("pgrep"), exited(1), "4", "", &[0]);
        assert_eq!(outcome.unwrap_err().kind(), FailureKind::QueryExecutionFailed);
    }
}

/// Real executions. `sh` takes the same `-c <arg>` shape as `pgrep` with the
/// `all` scope, so the "pattern" becomes the script to run.
#[cfg(unix)]
mod real_process {
    use super::*;

    async fn run_sh(script: &str) -> Result<Vec<u64>, CountFailure> {
        init_tracing();
        let counter = PgrepCounter::new("sh");
        counter.count(UserScope::All, &pattern(script)).await
    }

    #[tokio::test]
    async fn single_integer_output() {
        assert_eq!(run_sh("echo 3").await, Ok(vec![3]));
    }

    #[tokio::test]
    async fn multi_line_output_yields_each_count() {
        assert_eq!(run_sh("printf '2\\n5\\n'").await, Ok(vec![2, 5]));
    }

    #[tokio::test]
    async fn no_match_exit_code_still_counts() {
        assert_eq!(run_sh("echo 0; exit 1").await, Ok(vec![0]));
    }

    #[tokio::test]
    async fn exit_127_is_reported_as_missing_tool() {
        let err = run_sh("exit 127").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryToolMissing);
    }

    #[tokio::test]
    async fn unexpected_exit_code_is_execution_failure() {
        let err = run_sh("echo oops >&2; exit 3").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryExecutionFailed);
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn malformed_output_is_reported() {
        let err = run_sh("echo lots").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryOutputMalformed);
    }

    #[tokio::test]
    async fn missing_program_is_reported_not_panicked() {
        let counter = PgrepCounter::new("/nonexistent/definitely-not-pgrep");
        let err = counter
            .count(UserScope::CurrentUser, &pattern("nix"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::QueryToolMissing);
    }
}
