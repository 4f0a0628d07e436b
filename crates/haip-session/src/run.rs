//! Run lifecycle and concurrency cap (C4, §4.5).
//!
//! A run groups one or more transactions under a single tool-invocation
//! lifetime. The engine itself only tracks run bookkeeping and a cancellation
//! flag; the actual cooperative-cancellation signal (a `oneshot` to the task
//! driving the tool) is owned by the dispatcher in `haip-tools`, which polls
//! `Run::is_cancelled` or is handed the flag directly — the engine never
//! reaches into tool execution.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Active,
    Cancelling,
    Completed,
}

pub struct Run {
    pub id: Uuid,
    pub tool_name: String,
    state: RunState,
}

impl Run {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, RunState::Cancelling)
    }
}

#[derive(Default)]
pub struct RunRegistry {
    runs: HashMap<Uuid, Run>,
    max_concurrent: usize,
}

impl RunRegistry {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            runs: HashMap::new(),
            max_concurrent,
        }
    }

    fn active_count(&self) -> usize {
        self.runs.values().filter(|r| r.state == RunState::Active).count()
    }

    /// Start a new run, rejecting it if the negotiated concurrency cap would
    /// be exceeded (§4.5 invariant: active run count never exceeds the max).
    pub fn start(&mut self, tool_name: String) -> Result<Uuid, SessionError> {
        if self.active_count() >= self.max_concurrent {
            return Err(SessionError::RunLimitExceeded(self.max_concurrent));
        }
        let id = Uuid::new_v4();
        self.runs.insert(
            id,
            Run {
                id,
                tool_name,
                state: RunState::Active,
            },
        );
        Ok(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&Run> {
        self.runs.get(id)
    }

    /// Request cancellation; idempotent, and a no-op on a completed run.
    pub fn request_cancel(&mut self, id: &Uuid) -> Result<(), SessionError> {
        let run = self.runs.get_mut(id).ok_or(SessionError::InvalidState)?;
        if run.state == RunState::Active {
            run.state = RunState::Cancelling;
        }
        Ok(())
    }

    pub fn complete(&mut self, id: &Uuid) -> Result<(), SessionError> {
        let run = self.runs.get_mut(id).ok_or(SessionError::InvalidState)?;
        run.state = RunState::Completed;
        Ok(())
    }

    pub fn active_run_count(&self) -> usize {
        self.active_count()
    }
}
