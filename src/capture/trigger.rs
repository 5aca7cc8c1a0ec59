//! Capture trigger and done-status state machine.
//!
//! ```text
//!  Idle --set_capture_config--> Configured --start_trigger--> Armed
//!   ^                                                           |
//!   +---- clear_done / capture_read_done <-- Done <--poll_done--+
//! ```
//!
//! Any device or transport failure moves the session to `Error`. Only
//! [`DpdSession::reset_capture_state`] or a successful
//! [`DpdSession::set_capture_config`] leaves it.

use super::codec::{self, DETAILED_STATUS_LEN};
use super::types::{CaptureDetailedStatus, CaptureType};
use crate::channel::TxChannel;
use crate::error::{DpdError, Result};
use crate::session::{Command, DpdSession};
use crate::transport::regmap::{
    object, opcode, tracking_cmd, CMD_ERROR_MASK, MAILBOX_GET, TDD_CAPTURE_TRIGGER_REG,
    TDD_CAPTURE_TRIGGER_TAG,
};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

const CAPTURE_DONE_FLAG: u8 = 0x01;

/// Host-side view of the capture lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureState {
    /// Nothing configured, or the last capture was consumed
    #[default]
    Idle,
    /// Configuration written
    Configured,
    /// Capture requested
    Armed,
    /// Capture complete and done flag cleared
    Done,
    /// A mailbox or bus failure occurred
    Error,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Configured => "configured",
            Self::Armed => "armed",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

impl<T: Transport> DpdSession<T> {
    /// Current capture state.
    pub fn capture_state(&self) -> CaptureState {
        self.capture_state
    }

    /// Leave the error state (or abandon a capture) and return to `Idle`.
    pub fn reset_capture_state(&mut self) {
        if self.capture_state != CaptureState::Idle {
            info!(from = %self.capture_state, "Capture state reset");
        }
        self.capture_state = CaptureState::Idle;
    }

    /// Move to `Error` if `result` is a device or bus failure.
    pub(crate) fn track<R>(&mut self, operation: &'static str, result: Result<R>) -> Result<R> {
        if let Err(err) = &result {
            if err.is_hardware_failure() && self.capture_state != CaptureState::Error {
                warn!(operation, error = %err, "Capture state machine entered error state");
                self.capture_state = CaptureState::Error;
            }
        }
        result
    }

    fn ensure_not_failed(&self, operation: &'static str) -> Result<()> {
        if self.capture_state == CaptureState::Error {
            return Err(DpdError::InvalidState {
                operation,
                state: self.capture_state.to_string(),
            });
        }
        Ok(())
    }

    /// Start a capture using the control record currently on the device.
    ///
    /// TDD Tx-on captures are armed through the stream debug register; every
    /// other type goes through the mailbox.
    pub fn start_trigger(&mut self) -> Result<()> {
        self.ensure_not_failed("start capture")?;
        let ctrl = self.capture_ctrl()?;

        let result = if ctrl.capture_type == CaptureType::TddTxOnSync {
            self.tdd_trigger_set(ctrl.channel)
        } else {
            self.execute(Command::set(
                "capture trigger",
                &[object::EXT_DPD_CAPTURE_TRIG],
            ))
            .map(|_| ())
        };
        self.track("start capture", result)?;

        self.capture_state = CaptureState::Armed;
        info!(channel = %ctrl.channel, capture_type = %ctrl.capture_type, "Capture armed");
        Ok(())
    }

    /// Arm a TDD Tx-on capture for `channel` without going through the mailbox.
    pub fn tdd_trigger_set(&mut self, channel: TxChannel) -> Result<()> {
        self.transport.spi_write_byte(
            TDD_CAPTURE_TRIGGER_REG,
            TDD_CAPTURE_TRIGGER_TAG | channel.bit(),
        )?;
        debug!(channel = %channel, "TDD capture trigger written");
        Ok(())
    }

    /// Query the done flag; if set, clear it on the device and return `true`.
    ///
    /// The clear is a second command. `true` is only returned once the clear
    /// has succeeded; if it fails the session enters `Error` and the flag may
    /// still be set on the device.
    pub fn poll_done(&mut self) -> Result<bool> {
        self.ensure_not_failed("poll capture done")?;
        let result = self.query_done_flag();
        let done = self.track("poll capture done", result)?;
        if !done {
            return Ok(false);
        }

        if let Err(err) = self.write_done_clear() {
            warn!(
                error = %err,
                "Capture done flag read but not cleared; it may still be set on the device"
            );
            return self.track("clear capture done", Err(err));
        }

        self.capture_state = CaptureState::Done;
        info!("Capture done");
        Ok(true)
    }

    fn query_done_flag(&mut self) -> Result<bool> {
        self.execute(Command::get(
            "capture done get",
            &[object::EXT_DPD_CAPTURE_DONE],
        ))?;
        let mut flag = [0u8; 1];
        self.transport.mem_read(MAILBOX_GET, &mut flag)?;
        Ok(flag[0] & CAPTURE_DONE_FLAG != 0)
    }

    fn write_done_clear(&mut self) -> Result<()> {
        self.execute(
            Command::set("capture done clear", &[object::EXT_DPD_CAPTURE_DONE, 0])
                .waiting_on(opcode::GET),
        )?;
        Ok(())
    }

    /// Clear the device done flag and return to `Idle`.
    pub fn clear_done(&mut self) -> Result<()> {
        let result = self.write_done_clear();
        self.track("clear capture done", result)?;
        self.capture_state = CaptureState::Idle;
        Ok(())
    }

    /// Tell the firmware the capture buffers have been consumed and return to `Idle`.
    pub fn capture_read_done(&mut self) -> Result<()> {
        let result = self.issue_read_done();
        self.track("capture read done", result)?;
        self.capture_state = CaptureState::Idle;
        Ok(())
    }

    pub(crate) fn issue_read_done(&mut self) -> Result<()> {
        self.execute(Command::tracking(
            "capture read done",
            &[
                object::TRACKING_CAL_CTRL,
                object::DPD_INIT,
                0,
                tracking_cmd::CAPTURE_READ_DONE,
            ],
        ))?;
        Ok(())
    }

    /// Detailed capture status kept by the tracking calibration for `channel`.
    pub fn detailed_status(&mut self, channel: TxChannel) -> Result<CaptureDetailedStatus> {
        let result = self.read_detailed_status(channel);
        self.track("detailed status", result)
    }

    fn read_detailed_status(&mut self, channel: TxChannel) -> Result<CaptureDetailedStatus> {
        self.execute(
            Command::get(
                "detailed status",
                &[object::CAL_STATUS, object::DPD_INIT, channel.index() as u8],
            )
            .with_error_mask(CMD_ERROR_MASK),
        )?;
        let mut record = [0u8; DETAILED_STATUS_LEN];
        self.transport.mem_read(MAILBOX_GET, &mut record)?;
        codec::decode_detailed_status(&record)
    }
}
