use proptest::prelude::*;

use mdensemble::engine::{DispatchCommand, DispatchConfig, DispatchController};
use mdensemble::record::CompletionRecord;
use mdensemble::types::TaskId;
use mdensemble_test_utils::builders::backlog_of;

// Strategy: a backlog, a window, and a sequence of picks that decides which
// in-flight task completes next and whether it fails.
fn scenario() -> impl Strategy<Value = (usize, usize, Vec<(usize, bool)>)> {
    (0..40usize, 1..8usize).prop_flat_map(|(backlog, window)| {
        let picks = proptest::collection::vec((any::<usize>(), any::<bool>()), backlog);
        (Just(backlog), Just(window), picks)
    })
}

proptest! {
    #[test]
    fn window_bound_holds_under_any_completion_order(
        (backlog, window, picks) in scenario()
    ) {
        let mut ctl = DispatchController::new(
            DispatchConfig { window_size: window, topic: "task".to_string() },
            backlog_of(backlog),
        ).unwrap();

        let mut in_flight: Vec<u64> = Vec::new();
        let mut logged: Vec<u64> = Vec::new();
        let mut next_expected_submission = 0u64;
        let mut failures = 0usize;
        let mut done_signals = 0usize;

        let mut apply = |commands: Vec<DispatchCommand>,
                         in_flight: &mut Vec<u64>,
                         logged: &mut Vec<u64>,
                         done_signals: &mut usize| {
            for c in commands {
                match c {
                    DispatchCommand::Submit { task, .. } => {
                        // Backlog order is preserved.
                        assert_eq!(task.id.0, next_expected_submission);
                        next_expected_submission += 1;
                        in_flight.push(task.id.0);
                    }
                    DispatchCommand::RecordResult { entry, .. } => logged.push(entry.task_id.0),
                    DispatchCommand::SignalDone => *done_signals += 1,
                }
            }
        };

        let step = ctl.start().unwrap();
        apply(step.commands, &mut in_flight, &mut logged, &mut done_signals);
        prop_assert_eq!(in_flight.len(), window.min(backlog));

        for (pick, fail) in picks {
            prop_assert!(!in_flight.is_empty());
            let id = in_flight.swap_remove(pick % in_flight.len());
            let record = if fail {
                failures += 1;
                CompletionRecord::failure(TaskId(id), "task", "boom")
            } else {
                CompletionRecord::success(TaskId(id), "task")
            };

            let step = ctl.on_completion(record).unwrap();
            apply(step.commands, &mut in_flight, &mut logged, &mut done_signals);

            let state = ctl.state();
            prop_assert!(state.in_flight() <= window);
            prop_assert_eq!(state.in_flight(), in_flight.len());
            prop_assert!(state.submitted_count <= backlog);
        }

        logged.sort();
        prop_assert_eq!(logged, (0..backlog as u64).collect::<Vec<_>>());
        prop_assert!(in_flight.is_empty());
        prop_assert!(ctl.is_done());
        prop_assert_eq!(done_signals, 1);
        prop_assert_eq!(ctl.state().failed_count, failures);
    }
}
