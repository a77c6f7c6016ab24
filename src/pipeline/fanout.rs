//! Parallel groups: snapshot the state per branch, run the branches on a
//! bounded pool, then merge back only what each branch owns.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::Instrument;

use super::state::{ExecutionState, Step, StepOutput, StepStatus};

#[async_trait::async_trait]
pub trait StepRunner: Send + Sync {
    fn step(&self) -> Step;

    /// Runs against a private copy of the state and returns that copy.
    /// Must leave `step()` in a terminal status.
    async fn run(&self, state: ExecutionState) -> ExecutionState;
}

/// What came back from one branch.
pub type BranchOutcome = Result<ExecutionState, String>;

/// Runs `branches` concurrently with at most `max_workers` in flight and
/// blocks until every one of them has returned. Results are merged in the
/// order the branches were given.
pub async fn run_parallel(
    state: &mut ExecutionState,
    branches: &[Arc<dyn StepRunner>],
    max_workers: usize,
) {
    let permits = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut set = JoinSet::new();
    let mut slots = HashMap::with_capacity(branches.len());

    for (index, branch) in branches.iter().enumerate() {
        let snapshot = state.clone();
        let branch = Arc::clone(branch);
        let permits = Arc::clone(&permits);
        let handle = set.spawn(
            async move {
                let _permit = permits.acquire().await.ok();
                branch.run(snapshot).await
            }
            .instrument(tracing::Span::current()),
        );
        slots.insert(handle.id(), index);
    }

    let mut outcomes: Vec<Option<BranchOutcome>> = (0..branches.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, branch_state)) => (id, Ok(branch_state)),
            Err(err) => (err.id(), Err(describe_join_error(&err))),
        };
        if let Some(index) = slots.get(&id) {
            outcomes[*index] = Some(outcome);
        }
    }

    for (branch, outcome) in branches.iter().zip(outcomes) {
        let outcome = outcome.unwrap_or_else(|| Err("branch result was lost".to_string()));
        merge_branch(state, branch.step(), &outcome);
    }
}

/// Folds one branch result into the shared state: the branch's ledger
/// entries, its own status entry and its own output slot. Applying the same
/// successful outcome twice leaves the state unchanged.
pub fn merge_branch(state: &mut ExecutionState, step: Step, outcome: &BranchOutcome) {
    let branch = match outcome {
        Ok(branch) => branch,
        Err(message) => {
            fail_branch(state, step, message);
            return;
        }
    };

    state.ledger.absorb(&branch.ledger);

    let status = branch.statuses.get(step);
    if !status.is_terminal() {
        fail_branch(state, step, "step returned without a terminal status");
        return;
    }

    if let Err(err) = state.finish(step, status, branch.outputs.get(step)) {
        state
            .ledger
            .error(step.component(), format!("Merge of {step} rejected: {err}"));
    }
}

fn fail_branch(state: &mut ExecutionState, step: Step, message: &str) {
    state
        .ledger
        .error(step.component(), format!("{step} aborted: {message}"));
    if let Err(err) = state.finish(
        step,
        StepStatus::Failed,
        StepOutput::error_placeholder(step, message),
    ) {
        state
            .ledger
            .error(step.component(), format!("Could not mark {step} failed: {err}"));
    }
}

fn describe_join_error(err: &JoinError) -> String {
    if err.is_panic() {
        "branch panicked".to_string()
    } else {
        "branch was cancelled".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::testing::sample_state;

    enum Behaviour {
        Complete(StepOutput),
        Fail(StepOutput),
        Panic,
        Forget,
        Trespass,
    }

    struct ScriptedBranch {
        step: Step,
        behaviour: Behaviour,
        delay: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl ScriptedBranch {
        fn new(step: Step, behaviour: Behaviour) -> Self {
            Self {
                step,
                behaviour,
                delay: Duration::ZERO,
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait::async_trait]
    impl StepRunner for ScriptedBranch {
        fn step(&self) -> Step {
            self.step
        }

        async fn run(&self, mut state: ExecutionState) -> ExecutionState {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            state.ledger.info(self.step.component(), "started");
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            match &self.behaviour {
                Behaviour::Complete(output) => {
                    state
                        .finish(self.step, StepStatus::Completed, Some(output.clone()))
                        .unwrap();
                }
                Behaviour::Fail(output) => {
                    state
                        .finish(self.step, StepStatus::Failed, Some(output.clone()))
                        .unwrap();
                }
                Behaviour::Panic => panic!("model crashed"),
                Behaviour::Forget => {}
                Behaviour::Trespass => {
                    state
                        .finish(
                            Step::GovernmentReport,
                            StepStatus::Completed,
                            Some(StepOutput::GovernmentReport("forged".to_string())),
                        )
                        .unwrap();
                    state
                        .finish(
                            self.step,
                            StepStatus::Completed,
                            Some(StepOutput::DisasterHistory(json!({"events": []}))),
                        )
                        .unwrap();
                }
            }
            state.ledger.info(self.step.component(), "finished");
            state
        }
    }

    fn arc(branch: ScriptedBranch) -> Arc<dyn StepRunner> {
        Arc::new(branch)
    }

    #[tokio::test]
    async fn test_failed_branch_does_not_affect_sibling() {
        let mut state = sample_state();
        let branches = vec![
            arc(ScriptedBranch::new(
                Step::Weather,
                Behaviour::Fail(StepOutput::Weather(json!({"error": "timeout"}))),
            )),
            arc(ScriptedBranch::new(
                Step::DisasterHistory,
                Behaviour::Complete(StepOutput::DisasterHistory(json!({"features": []}))),
            )),
        ];

        run_parallel(&mut state, &branches, 2).await;

        assert_eq!(state.statuses.get(Step::Weather), StepStatus::Failed);
        assert_eq!(state.outputs.weather, Some(json!({"error": "timeout"})));
        assert_eq!(state.statuses.get(Step::DisasterHistory), StepStatus::Completed);
        assert_eq!(state.outputs.disaster_history, Some(json!({"features": []})));
    }

    #[tokio::test]
    async fn test_panicking_branch_becomes_failed_status() {
        let mut state = sample_state();
        let branches = vec![
            arc(ScriptedBranch::new(Step::Weather, Behaviour::Panic)),
            arc(ScriptedBranch::new(
                Step::DisasterHistory,
                Behaviour::Complete(StepOutput::DisasterHistory(json!({}))),
            )),
        ];

        run_parallel(&mut state, &branches, 2).await;

        assert_eq!(state.statuses.get(Step::Weather), StepStatus::Failed);
        assert_eq!(state.outputs.weather, Some(json!({"error": "branch panicked"})));
        assert_eq!(state.statuses.get(Step::DisasterHistory), StepStatus::Completed);
        assert!(
            state
                .ledger
                .entries()
                .iter()
                .any(|e| e.message.contains("branch panicked"))
        );
    }

    #[tokio::test]
    async fn test_branch_without_terminal_status_is_failed() {
        let mut state = sample_state();
        let branches = vec![arc(ScriptedBranch::new(Step::Weather, Behaviour::Forget))];

        run_parallel(&mut state, &branches, 1).await;

        assert_eq!(state.statuses.get(Step::Weather), StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_merge_ignores_fields_the_branch_does_not_own() {
        let mut state = sample_state();
        let branches = vec![arc(ScriptedBranch::new(
            Step::DisasterHistory,
            Behaviour::Trespass,
        ))];

        run_parallel(&mut state, &branches, 1).await;

        assert_eq!(state.statuses.get(Step::DisasterHistory), StepStatus::Completed);
        assert_eq!(state.statuses.get(Step::GovernmentReport), StepStatus::Pending);
        assert_eq!(state.outputs.government_report, None);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let mut base = sample_state();
        base.ledger.info("system", "before");

        let mut branch = base.clone();
        branch.ledger.info("data_tool_weather", "fetched");
        branch
            .finish(
                Step::Weather,
                StepStatus::Completed,
                Some(StepOutput::Weather(json!({"current_weather": {}}))),
            )
            .unwrap();
        let outcome: BranchOutcome = Ok(branch);

        let mut once = base.clone();
        merge_branch(&mut once, Step::Weather, &outcome);
        let mut twice = base.clone();
        merge_branch(&mut twice, Step::Weather, &outcome);
        merge_branch(&mut twice, Step::Weather, &outcome);

        assert_eq!(once.outputs, twice.outputs);
        assert_eq!(once.statuses, twice.statuses);
        assert_eq!(once.ledger.entries(), twice.ledger.entries());
        assert_eq!(twice.ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_branch_is_awaited_and_logs_stay_grouped() {
        let mut state = sample_state();
        let mut slow = ScriptedBranch::new(
            Step::Weather,
            Behaviour::Complete(StepOutput::Weather(json!({}))),
        );
        slow.delay = Duration::from_millis(50);
        let branches = vec![
            arc(slow),
            arc(ScriptedBranch::new(
                Step::DisasterHistory,
                Behaviour::Complete(StepOutput::DisasterHistory(json!({}))),
            )),
        ];

        run_parallel(&mut state, &branches, 2).await;

        assert_eq!(state.statuses.get(Step::Weather), StepStatus::Completed);
        let components: Vec<&str> = state
            .ledger
            .entries()
            .iter()
            .map(|e| e.component.as_str())
            .collect();
        assert_eq!(
            components,
            vec![
                "data_tool_weather",
                "data_tool_weather",
                "data_tool_disaster_history",
                "data_tool_disaster_history",
            ]
        );
    }

    #[tokio::test]
    async fn test_worker_pool_bounds_concurrency() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let make = |step: Step, output: StepOutput| {
            let mut branch = ScriptedBranch::new(step, Behaviour::Complete(output));
            branch.delay = Duration::from_millis(20);
            branch.running = Arc::clone(&running);
            branch.peak = Arc::clone(&peak);
            arc(branch)
        };
        let branches = vec![
            make(
                Step::Classification,
                StepOutput::Classification("FIRE".to_string()),
            ),
            make(Step::Weather, StepOutput::Weather(json!({}))),
            make(Step::DisasterHistory, StepOutput::DisasterHistory(json!({}))),
        ];

        let mut state = sample_state();
        run_parallel(&mut state, &branches, 2).await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(state.statuses.count(StepStatus::Completed), 3);
    }
}
