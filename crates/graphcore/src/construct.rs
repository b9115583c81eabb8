//! Engine-visible state of loop and iteration constructs.

use crate::{ConstructError, Graph, Segment, VariableSelector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one construct instance:
/// `Pending -> Running(0) -> Running(1) -> ... -> Exited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructPhase {
    Pending,
    Running { cycle: usize },
    Exited,
}

impl fmt::Display for ConstructPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructPhase::Pending => f.write_str("pending"),
            ConstructPhase::Running { cycle } => write!(f, "running({})", cycle),
            ConstructPhase::Exited => f.write_str("exited"),
        }
    }
}

/// Cycle state owned by a single loop or iteration construct. Only the
/// construct's driver and its own start/end markers touch it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructState {
    pub index: usize,
    pub item: Option<Segment>,
    pub should_continue: bool,
    pub max_cycles: Option<usize>,
    phase: ConstructPhase,
}

impl ConstructState {
    pub fn new(max_cycles: Option<usize>) -> Self {
        Self {
            index: 0,
            item: None,
            should_continue: true,
            max_cycles,
            phase: ConstructPhase::Pending,
        }
    }

    pub fn phase(&self) -> ConstructPhase {
        self.phase
    }

    /// Enter cycle 0. Resets any state left from a previous run of the construct.
    pub fn begin(&mut self) -> Result<(), ConstructError> {
        match self.phase {
            ConstructPhase::Pending | ConstructPhase::Exited => {
                self.index = 0;
                self.item = None;
                self.should_continue = true;
                self.phase = ConstructPhase::Running { cycle: 0 };
                Ok(())
            }
            ConstructPhase::Running { .. } => Err(self.invalid("begin")),
        }
    }

    /// Whether another cycle fits under `max_cycles` after the current one.
    pub fn has_next_cycle(&self) -> bool {
        self.max_cycles.map_or(true, |max| self.index + 1 < max)
    }

    /// Record the end-of-cycle decision. `index` always counts completed
    /// cycles afterwards; the phase moves to the next cycle when
    /// `should_continue` holds, otherwise to `Exited`.
    pub fn advance(&mut self, should_continue: bool) -> Result<ConstructPhase, ConstructError> {
        let ConstructPhase::Running { cycle } = self.phase else {
            return Err(self.invalid("advance"));
        };
        self.should_continue = should_continue;
        self.index = cycle + 1;
        self.item = None;
        if should_continue {
            self.phase = ConstructPhase::Running { cycle: cycle + 1 };
        } else {
            self.phase = ConstructPhase::Exited;
        }
        Ok(self.phase)
    }

    /// Leave the construct early, e.g. after a body failure.
    pub fn exit(&mut self) {
        self.should_continue = false;
        self.phase = ConstructPhase::Exited;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, ConstructPhase::Running { .. })
    }

    fn invalid(&self, action: &'static str) -> ConstructError {
        ConstructError::InvalidTransition {
            action,
            phase: self.phase.to_string(),
        }
    }
}

impl Default for ConstructState {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Configuration of an `iteration` container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationNodeData {
    /// Array to iterate over.
    pub iterator_selector: VariableSelector,
    /// Body value collected after each cycle.
    pub output_selector: VariableSelector,
    pub body: Graph,
}

/// Configuration of a `loop` container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopNodeData {
    /// Upper bound on cycles.
    pub loop_count: usize,
    pub body: Graph,
}
