// tests/property_core.rs

use std::path::PathBuf;

use proptest::prelude::*;

use buildwatch::engine::{CoreCommand, CoreLoop, LoopEvent, LoopState};
use buildwatch::errors::CountFailure;
use buildwatch::types::StatusUpdate;
use buildwatch::watch::{TriggerEvent, TriggerKind};

#[derive(Debug, Clone)]
enum Input {
    Trigger,
    Due,
    /// Completion of the in-flight query (ignored when none is running).
    Finish(Result<Vec<u64>, u8>),
}

fn input_strategy() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just(Input::Trigger),
        Just(Input::Due),
        prop_oneof![
            proptest::collection::vec(0u64..50, 1..4).prop_map(|v| Ok::<Vec<u64>, u8>(v)),
            (0u8..3).prop_map(|c| Err::<Vec<u64>, u8>(c)),
        ]
        .prop_map(Input::Finish),
    ]
}

fn failure(code: u8) -> CountFailure {
    match code {
        0 => CountFailure::QueryToolMissing("pgrep".into()),
        1 => CountFailure::QueryExecutionFailed("exit 2".into()),
        _ => CountFailure::QueryOutputMalformed("garbage".into()),
    }
}

proptest! {
    /// Whatever the interleaving of triggers, timer expiries and (non-fatal)
    /// completions:
    /// - at most one query is in flight at a time
    /// - every completion publishes exactly its counts (or its failure)
    /// - the loop never leaves `Running`
    #[test]
    fn queries_are_serialized_and_results_published(
        inputs in proptest::collection::vec(input_strategy(), 1..64)
    ) {
        let mut core = CoreLoop::new();
        let mut running = 0usize;

        for input in inputs {
            let event = match input {
                Input::Trigger => LoopEvent::Triggered(TriggerEvent {
                    path: PathBuf::from("/tmp/marker"),
                    kind: TriggerKind::Modified,
                }),
                Input::Due => LoopEvent::QueryDue,
                Input::Finish(_) if running == 0 => continue,
                Input::Finish(Ok(counts)) => LoopEvent::QueryFinished(Ok(counts)),
                Input::Finish(Err(code)) => LoopEvent::QueryFinished(Err(failure(code))),
            };

            let expected: Vec<StatusUpdate> = match &event {
                LoopEvent::QueryFinished(Ok(counts)) => {
                    counts.iter().map(|n| StatusUpdate::Count(*n)).collect()
                }
                LoopEvent::QueryFinished(Err(f)) => vec![StatusUpdate::Failure(f.clone())],
                _ => Vec::new(),
            };
            if matches!(event, LoopEvent::QueryFinished(_)) {
                running -= 1;
            }

            let step = core.step(event);
            prop_assert!(step.keep_running);

            let published: Vec<StatusUpdate> = step
                .commands
                .iter()
                .filter_map(|c| match c {
                    CoreCommand::Publish(u) => Some(u.clone()),
                    _ => None,
                })
                .collect();
            prop_assert_eq!(published, expected);

            running += step
                .commands
                .iter()
                .filter(|c| **c == CoreCommand::StartQuery)
                .count();
            prop_assert!(running <= 1);
            prop_assert_eq!(core.query_in_flight(), running == 1);
            prop_assert!(!core.follow_up_pending() || core.query_in_flight());
            prop_assert_eq!(core.state(), LoopState::Running);
        }
    }
}
