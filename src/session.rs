//! Session context for one DPD-capable device.
//!
//! [`DpdSession`] owns the transport, the driver settings and the small
//! host-side mirror the firmware does not report back (capture trigger pin,
//! swap-mode flag, capture state). Operations are grouped by subsystem in
//! `impl` blocks across the crate: [`crate::gpio`], [`crate::capture`],
//! [`crate::actuator`] and [`crate::monitor`].
//!
//! A session is not internally synchronised. Several operations perform
//! read-modify-write on chip-global registers, so callers that share a device
//! must serialise access themselves (e.g. a single owner behind a mutex).

use crate::capture::CaptureState;
use crate::config::DriverSettings;
use crate::error::{DeviceErrorCode, DpdError, Result};
use crate::gpio::GpioPin;
use crate::transport::regmap::{opcode, CMD_ERROR_MASK, CMD_STATUS_UPPER_MASK};
use crate::transport::Transport;
use tracing::debug;

/// Status-wait budget class for a mailbox command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Budget {
    /// `mailbox.timeout_us`
    Standard,
    /// `mailbox.lut_update_timeout_us`
    LutUpdate,
}

/// A co-processor command: opcode, extended data and status decoding rules.
#[derive(Debug, Clone)]
pub(crate) struct Command<'a> {
    pub name: &'static str,
    pub opcode: u8,
    pub wait_opcode: u8,
    pub ext_data: &'a [u8],
    pub error_mask: u8,
    pub budget: Budget,
}

impl<'a> Command<'a> {
    /// SET command whose error bits are any of status[7:1].
    pub fn set(name: &'static str, ext_data: &'a [u8]) -> Self {
        Self {
            name,
            opcode: opcode::SET,
            wait_opcode: opcode::SET,
            ext_data,
            error_mask: CMD_STATUS_UPPER_MASK,
            budget: Budget::Standard,
        }
    }

    /// GET command whose error bits are any of status[7:1].
    pub fn get(name: &'static str, ext_data: &'a [u8]) -> Self {
        Self {
            opcode: opcode::GET,
            wait_opcode: opcode::GET,
            ..Self::set(name, ext_data)
        }
    }

    /// Tracking-calibration SET; only status[3:1] flag an error.
    pub fn tracking(name: &'static str, ext_data: &'a [u8]) -> Self {
        Self {
            error_mask: CMD_ERROR_MASK,
            ..Self::set(name, ext_data)
        }
    }

    /// Wait on a different opcode than the one written.
    pub fn waiting_on(mut self, opcode: u8) -> Self {
        self.wait_opcode = opcode;
        self
    }

    /// Use a different error mask.
    pub fn with_error_mask(mut self, mask: u8) -> Self {
        self.error_mask = mask;
        self
    }

    /// Use the long LUT-update budget.
    pub fn long_running(mut self) -> Self {
        self.budget = Budget::LutUpdate;
        self
    }
}

/// Explicit context object for every DPD operation.
#[derive(Debug)]
pub struct DpdSession<T: Transport> {
    pub(crate) transport: T,
    pub(crate) settings: DriverSettings,
    pub(crate) trigger_pin: GpioPin,
    pub(crate) swap_mode_enabled: bool,
    pub(crate) capture_state: CaptureState,
}

impl<T: Transport> DpdSession<T> {
    /// Create a session over `transport`.
    pub fn new(transport: T, settings: DriverSettings) -> Self {
        debug!(
            range_check = settings.validation.range_check,
            swap_mode_source = ?settings.lut.swap_mode_source,
            "Created DPD session"
        );
        Self {
            transport,
            settings,
            trigger_pin: GpioPin::INVALID,
            swap_mode_enabled: false,
            capture_state: CaptureState::Idle,
        }
    }

    /// Create a session with default settings.
    pub fn with_defaults(transport: T) -> Self {
        Self::new(transport, DriverSettings::default())
    }

    /// Driver settings.
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Replace the driver settings.
    pub fn set_settings(&mut self, settings: DriverSettings) {
        self.settings = settings;
    }

    /// Borrow the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session and return the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Trigger pin cached by the last capture configuration.
    pub fn trigger_pin(&self) -> GpioPin {
        self.trigger_pin
    }

    pub(crate) fn range_check(&self) -> bool {
        self.settings.validation.range_check
    }

    /// Write a command, wait for completion and decode its status byte.
    pub(crate) fn execute(&mut self, cmd: Command<'_>) -> Result<u8> {
        let timeout_us = match cmd.budget {
            Budget::Standard => self.settings.mailbox.timeout_us,
            Budget::LutUpdate => self.settings.mailbox.lut_update_timeout_us,
        };
        let interval_us = self.settings.mailbox.interval_us;

        self.transport.cmd_write(cmd.opcode, cmd.ext_data)?;
        let status = self
            .transport
            .cmd_status_wait(cmd.wait_opcode, timeout_us, interval_us)?;

        let object_id = cmd.ext_data.first().copied().unwrap_or_default();
        debug!(
            command = cmd.name,
            opcode = cmd.opcode,
            object_id,
            status,
            "Mailbox command complete"
        );

        if status & cmd.error_mask != 0 {
            return Err(DpdError::DeviceCommand {
                opcode: cmd.opcode,
                object_id,
                status,
                code: DeviceErrorCode::from_command_status(cmd.wait_opcode, object_id, status),
            });
        }
        Ok(status)
    }

    /// Read a 32-bit little-endian register through the DMA port.
    pub(crate) fn read_reg32(&mut self, addr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.transport.dma_read(addr, &mut buf, false)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Write a 32-bit little-endian register through the DMA port.
    pub(crate) fn write_reg32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.transport.dma_write(addr, &value.to_le_bytes(), false)?;
        Ok(())
    }

    /// Read-modify-write: replace the bits in `mask` with `value & mask`.
    pub(crate) fn update_reg32(&mut self, addr: u32, mask: u32, value: u32) -> Result<()> {
        let current = self.read_reg32(addr)?;
        self.write_reg32(addr, (current & !mask) | (value & mask))
    }
}
