//! Execution gate
//!
//! Turns a reconciliation plan into remote deletions, but only after an
//! explicit yes. State machine:
//!
//! ```text
//! Planned ─┬─> DryRunReported ───────────────────────────> Done
//!          └─> AwaitingConfirmation ─┬─> Confirmed ─> Executing ─> Done
//!                                    └─> Declined ─────────────> Done
//! ```
//!
//! Once executing, every planned id is attempted in plan order. A failed
//! deletion is recorded and the batch moves on; nothing is retried.

use std::io::{self, BufRead, Write};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::ledger::DeletionSink;
use crate::models::TransactionId;
use crate::plan::ReconciliationPlan;

/// Whether the gate may touch the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Report only; no remote call is ever made
    Simulate,
    Execute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Planned,
    DryRunReported,
    AwaitingConfirmation,
    Confirmed,
    Declined,
    Executing,
    Done,
}

/// Source of the yes/no decision before deleting
pub trait Confirmation {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Non-interactive policy that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl FixedAnswer {
    pub fn yes() -> Self {
        Self(true)
    }

    pub fn no() -> Self {
        Self(false)
    }
}

impl Confirmation for FixedAnswer {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(self.0)
    }
}

/// Interactive `(y/N)` prompt.
///
/// Empty input or end of input answers no. Anything not starting with `y`
/// or `n` asks again.
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl ConsolePrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirmation for ConsolePrompt<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        loop {
            write!(self.output, "{} (y/N): ", prompt)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(false);
            }
            let answer = line.trim().to_lowercase();
            if answer.starts_with('y') {
                return Ok(true);
            }
            if answer.is_empty() || answer.starts_with('n') {
                return Ok(false);
            }
            writeln!(self.output, "Please answer 'y' or 'n'.")?;
        }
    }
}

/// A deletion that the ledger rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionFailure {
    pub id: TransactionId,
    pub error: String,
}

/// Counts for an executed batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub attempted: usize,
    pub deleted: Vec<TransactionId>,
    pub failures: Vec<DeletionFailure>,
}

impl DeletionSummary {
    pub fn succeeded(&self) -> usize {
        self.deleted.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// How the gate finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Plan had no entries; nothing to confirm
    NothingToDo,
    /// Simulation mode; `planned` deletions were reported only
    Simulated { planned: usize },
    Declined { planned: usize },
    Executed(DeletionSummary),
}

/// Confirm-then-delete driver for one plan
pub struct ExecutionGate {
    mode: RunMode,
    state: GateState,
}

impl ExecutionGate {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            state: GateState::Planned,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    fn transition(&mut self, next: GateState) {
        debug!("Execution gate: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Drive the plan to completion.
    ///
    /// Errors only come from the confirmation source; deletion failures are
    /// reported in the summary.
    pub fn run<C, S>(
        &mut self,
        plan: &ReconciliationPlan,
        confirmation: &mut C,
        sink: &S,
    ) -> Result<GateOutcome>
    where
        C: Confirmation + ?Sized,
        S: DeletionSink + ?Sized,
    {
        if plan.is_empty() {
            self.transition(GateState::Done);
            return Ok(GateOutcome::NothingToDo);
        }

        let planned = plan.len();

        if self.mode == RunMode::Simulate {
            self.transition(GateState::DryRunReported);
            info!("Dry run: {} transactions marked for deletion, none deleted", planned);
            self.transition(GateState::Done);
            return Ok(GateOutcome::Simulated { planned });
        }

        self.transition(GateState::AwaitingConfirmation);
        let prompt = format!(
            "Proceed with deleting {} identified duplicate transaction(s)?",
            planned
        );
        if !confirmation.confirm(&prompt)? {
            self.transition(GateState::Declined);
            info!("Deletion declined, {} planned deletions discarded", planned);
            self.transition(GateState::Done);
            return Ok(GateOutcome::Declined { planned });
        }

        self.transition(GateState::Confirmed);
        self.transition(GateState::Executing);
        let summary = execute_deletions(&plan.duplicates(), sink);
        self.transition(GateState::Done);

        Ok(GateOutcome::Executed(summary))
    }
}

/// Attempt every deletion in order, isolating failures
pub fn execute_deletions<S>(ids: &[TransactionId], sink: &S) -> DeletionSummary
where
    S: DeletionSink + ?Sized,
{
    let mut summary = DeletionSummary::default();

    for id in ids {
        summary.attempted += 1;
        debug!("Deleting transaction {}", id);
        match sink.delete(id) {
            Ok(()) => {
                info!("Deleted transaction {}", id);
                summary.deleted.push(id.clone());
            }
            Err(e) => {
                warn!("Failed to delete transaction {}: {}", id, e);
                summary.failures.push(DeletionFailure {
                    id: id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Deletion finished: {} attempted, {} deleted, {} failed",
        summary.attempted,
        summary.succeeded(),
        summary.failed()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::error::Error;
    use crate::models::LedgerRecord;
    use crate::plan::find_duplicates;
    use std::cell::RefCell;
    use std::io::Cursor;

    /// Records every call; fails for ids in `failing`
    #[derive(Default)]
    struct RecordingSink {
        calls: RefCell<Vec<TransactionId>>,
        failing: Vec<TransactionId>,
    }

    impl DeletionSink for RecordingSink {
        fn delete(&self, id: &TransactionId) -> Result<()> {
            self.calls.borrow_mut().push(id.clone());
            if self.failing.contains(id) {
                return Err(Error::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn coffee_plan(n: usize) -> ReconciliationPlan {
        let records: Vec<LedgerRecord> = (0..n + 1)
            .map(|i| {
                LedgerRecord::new(
                    &i.to_string(),
                    "2024-03-01",
                    "-3.50",
                    &format!("2024-03-01T08:00:{:02}Z", i),
                    "Coffee",
                )
            })
            .collect();
        find_duplicates(&records, &Classifier::new()).plan
    }

    fn prompt(input: &str) -> ConsolePrompt<Cursor<Vec<u8>>, Vec<u8>> {
        ConsolePrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_simulation_never_calls_sink() {
        let plan = coffee_plan(3);
        let sink = RecordingSink::default();
        let mut gate = ExecutionGate::new(RunMode::Simulate);

        let outcome = gate.run(&plan, &mut FixedAnswer::yes(), &sink).unwrap();

        assert_eq!(outcome, GateOutcome::Simulated { planned: 3 });
        assert!(sink.calls.borrow().is_empty());
        assert_eq!(gate.state(), GateState::Done);
    }

    #[test]
    fn test_declined_makes_no_calls() {
        let plan = coffee_plan(2);
        let sink = RecordingSink::default();
        let mut gate = ExecutionGate::new(RunMode::Execute);

        let outcome = gate.run(&plan, &mut FixedAnswer::no(), &sink).unwrap();

        assert_eq!(outcome, GateOutcome::Declined { planned: 2 });
        assert!(sink.calls.borrow().is_empty());
    }

    #[test]
    fn test_empty_plan_skips_prompt() {
        struct PanickingPrompt;
        impl Confirmation for PanickingPrompt {
            fn confirm(&mut self, _prompt: &str) -> Result<bool> {
                panic!("must not prompt for an empty plan");
            }
        }

        let sink = RecordingSink::default();
        let mut gate = ExecutionGate::new(RunMode::Execute);
        let outcome = gate
            .run(&ReconciliationPlan::default(), &mut PanickingPrompt, &sink)
            .unwrap();
        assert_eq!(outcome, GateOutcome::NothingToDo);
    }

    #[test]
    fn test_failure_is_isolated() {
        let plan = coffee_plan(5);
        let ids = plan.duplicates();
        let sink = RecordingSink {
            failing: vec![ids[2].clone()],
            ..Default::default()
        };
        let mut gate = ExecutionGate::new(RunMode::Execute);

        let outcome = gate.run(&plan, &mut FixedAnswer::yes(), &sink).unwrap();

        let GateOutcome::Executed(summary) = outcome else {
            panic!("expected execution");
        };
        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.succeeded(), 4);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failures[0].id, ids[2]);
        assert_eq!(*sink.calls.borrow(), ids);
    }

    #[test]
    fn test_console_prompt_answers() {
        assert!(prompt("y\n").confirm("Delete?").unwrap());
        assert!(prompt("YES\n").confirm("Delete?").unwrap());
        assert!(!prompt("n\n").confirm("Delete?").unwrap());
        assert!(!prompt("\n").confirm("Delete?").unwrap());
        assert!(!prompt("").confirm("Delete?").unwrap());
    }

    #[test]
    fn test_console_prompt_loops_on_invalid_input() {
        let mut p = prompt("maybe\nwhat\ny\n");
        assert!(p.confirm("Delete?").unwrap());
        let output = String::from_utf8(p.output).unwrap();
        assert_eq!(output.matches("Please answer 'y' or 'n'.").count(), 2);
        assert_eq!(output.matches("Delete? (y/N): ").count(), 3);
    }

    #[test]
    fn test_console_prompt_invalid_then_eof_is_no() {
        assert!(!prompt("maybe\n").confirm("Delete?").unwrap());
    }
}
