//! Undo log for multi-step GPIO reconfiguration.
//!
//! Each reversible step is recorded as soon as it succeeds. On failure the
//! log is replayed newest-first. Undo failures are logged and counted but
//! never replace the error that caused the rollback.

use super::{GpioPin, SourceControlGroup};
use crate::transport::{GpioDirection, SharedFeature, Transport};
use tracing::{debug, warn};

/// A completed step and how to reverse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoStep {
    /// Pin was released from a feature; re-acquire it.
    Reacquire {
        /// Released pin
        pin: GpioPin,
        /// Feature it was tagged with
        feature: SharedFeature,
    },
    /// Pin was acquired for a feature; release it.
    Release {
        /// Acquired pin
        pin: GpioPin,
        /// Feature it was acquired for
        feature: SharedFeature,
    },
    /// Pin direction was changed; restore it.
    Direction {
        /// Pin
        pin: GpioPin,
        /// Direction before the change
        previous: GpioDirection,
    },
    /// Source-control nibble was rewritten; restore it.
    SourceControl {
        /// Nibble group
        group: SourceControlGroup,
        /// Nibble value before the change
        previous: u8,
    },
}

/// Ordered record of reversible steps.
#[derive(Debug, Default)]
pub struct UndoLog {
    steps: Vec<UndoStep>,
}

impl UndoLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step that has just succeeded.
    pub fn record(&mut self, step: UndoStep) {
        debug!(?step, "Recorded GPIO undo step");
        self.steps.push(step);
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Recorded steps, oldest first.
    pub fn steps(&self) -> &[UndoStep] {
        &self.steps
    }

    /// Replay the log in reverse. Returns the number of steps that could not
    /// be undone.
    pub fn rollback<T: Transport>(self, transport: &mut T) -> usize {
        let mut failed = 0;
        for step in self.steps.into_iter().rev() {
            let outcome = match step {
                UndoStep::Reacquire { pin, feature } => transport
                    .shared_resource_acquire(pin, feature)
                    .map(|acquired| acquired.then_some(())),
                UndoStep::Release { pin, feature } => transport
                    .shared_resource_release(pin, feature)
                    .map(|released| released.then_some(())),
                UndoStep::Direction { pin, previous } => {
                    transport.gpio_direction_set(pin, previous).map(Some)
                }
                UndoStep::SourceControl { group, previous } => {
                    transport.gpio_source_control_set(group, previous).map(Some)
                }
            };

            match outcome {
                Ok(Some(())) => debug!(?step, "Undid GPIO step"),
                Ok(None) => {
                    failed += 1;
                    warn!(?step, "GPIO undo step refused by resource manager");
                }
                Err(err) => {
                    failed += 1;
                    warn!(?step, error = %err, "GPIO undo step failed");
                }
            }
        }
        failed
    }
}
