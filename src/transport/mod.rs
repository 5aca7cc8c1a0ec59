//! Register and mailbox transport.
//!
//! The DPD subsystem talks to the chip exclusively through [`Transport`]. The
//! trait covers the layers below this crate: co-processor command dispatch and
//! status wait, config-object and mailbox memory access, bulk DMA, single SPI
//! writes, stream triggers, GPIO direction and shared-resource bookkeeping, and
//! the two bit-fields the actuator code reads.
//!
//! Every method is blocking. Implementations are not required to be thread
//! safe; [`crate::DpdSession`] owns its transport exclusively.
//!
//! [`SimDevice`] is a simulated chip used by the test-suite and for offline
//! development.

pub mod regmap;
pub mod sim;

pub use sim::{SimDevice, SimEvent, SimFault, SimOp};

use crate::channel::TxChannel;
use crate::gpio::{GpioPin, SourceControlGroup};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the transport collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// A status wait exceeded its budget
    #[error("{operation} timed out after {timeout_us} us")]
    Timeout {
        operation: &'static str,
        timeout_us: u64,
    },

    /// The co-processor error handler returned a decoded code
    #[error("device error 0x{code:04X} (opcode 0x{opcode:02X}, object 0x{object_id:02X})")]
    Device {
        opcode: u8,
        object_id: u8,
        code: u32,
    },

    /// Only a chip reset can recover
    #[error("reset required: {reason}")]
    ResetRequired { reason: String },

    /// Low-level bus failure
    #[error("bus error: {message}")]
    Bus { message: String },
}

/// Result type for transport calls.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Electrical direction of a GPIO pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GpioDirection {
    /// Pin is an input (the reset state)
    #[default]
    Input,
    /// Pin is driven by the chip
    Output,
}

/// Feature tag recorded against a GPIO in the shared-resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SharedFeature {
    /// Pin is free
    #[default]
    Unused,
    /// Pin signals external DPD capture completion
    ExtDpdCaptureDone,
    /// Pin is owned by some other feature
    Other(u8),
}

/// ARM GPIO signals used by the actuator model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmGpioSignal {
    /// Model select bit 0
    ModelSel0,
    /// Model select bit 1
    ModelSel1,
}

/// Pin polarity for an ARM GPIO signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GpioPolarity {
    /// Active high
    #[default]
    Normal,
    /// Active low
    Inverted,
}

/// ARM GPIO signal assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArmGpioPin {
    /// Assigned pin, or [`GpioPin::INVALID`] when unassigned
    pub pin: GpioPin,
    /// Signal polarity
    pub polarity: GpioPolarity,
    /// Whether the signal is routed
    pub enable: bool,
}

impl ArmGpioPin {
    /// Assignment for `pin`, enabled iff the pin is valid, with normal polarity.
    pub fn for_pin(pin: GpioPin) -> Self {
        Self {
            pin,
            polarity: GpioPolarity::Normal,
            enable: pin.is_valid(),
        }
    }
}

impl Default for ArmGpioPin {
    fn default() -> Self {
        Self::for_pin(GpioPin::INVALID)
    }
}

/// Blocking access to the chip below the DPD layer.
pub trait Transport {
    /// Write a co-processor command with its extended data bytes.
    fn cmd_write(&mut self, opcode: u8, ext_data: &[u8]) -> TransportResult<()>;

    /// Wait for the pending command and return its status byte.
    fn cmd_status_wait(
        &mut self,
        opcode: u8,
        timeout_us: u64,
        interval_us: u64,
    ) -> TransportResult<u8>;

    /// Write bytes into a firmware config object.
    fn config_write(&mut self, object_id: u8, offset: u16, data: &[u8]) -> TransportResult<()>;

    /// Read bytes from a firmware config object.
    fn config_read(&mut self, object_id: u8, offset: u16, buf: &mut [u8]) -> TransportResult<()>;

    /// Write co-processor memory (mailbox scratch areas).
    fn mem_write(&mut self, addr: u32, data: &[u8]) -> TransportResult<()>;

    /// Read co-processor memory (mailbox scratch areas).
    fn mem_read(&mut self, addr: u32, buf: &mut [u8]) -> TransportResult<()>;

    /// Bulk write through the DMA port.
    fn dma_write(&mut self, addr: u32, data: &[u8], auto_increment: bool) -> TransportResult<()>;

    /// Bulk read through the DMA port.
    fn dma_read(&mut self, addr: u32, buf: &mut [u8], auto_increment: bool) -> TransportResult<()>;

    /// Single-byte SPI register write.
    fn spi_write_byte(&mut self, addr: u16, value: u8) -> TransportResult<()>;

    /// Kick a stream processor sequence.
    fn stream_trigger(&mut self, stream_id: u8) -> TransportResult<()>;

    /// Read the actuator clock-enable status bit-field for a channel.
    fn actuator_clock_enabled(&mut self, channel: TxChannel) -> TransportResult<bool>;

    /// Read a GPIO source-control nibble.
    fn gpio_source_control_get(&mut self, group: SourceControlGroup) -> TransportResult<u8>;

    /// Write a GPIO source-control nibble.
    fn gpio_source_control_set(&mut self, group: SourceControlGroup, value: u8)
        -> TransportResult<()>;

    /// Set the electrical direction of a pin.
    fn gpio_direction_set(&mut self, pin: GpioPin, direction: GpioDirection) -> TransportResult<()>;

    /// Feature currently tagged on a pin in the shared-resource table.
    fn shared_resource_feature(&mut self, pin: GpioPin) -> TransportResult<SharedFeature>;

    /// Claim a pin for a feature. Returns `false` if another feature owns it.
    fn shared_resource_acquire(&mut self, pin: GpioPin, feature: SharedFeature)
        -> TransportResult<bool>;

    /// Release a pin held by a feature. Returns `false` if the feature did not own it.
    fn shared_resource_release(&mut self, pin: GpioPin, feature: SharedFeature)
        -> TransportResult<bool>;

    /// Route a stream-processor GPIO input.
    fn stream_gpio_pin_set(&mut self, signal_id: u8, pin: GpioPin) -> TransportResult<()>;

    /// Assign an ARM GPIO signal.
    fn arm_gpio_pin_set(&mut self, signal: ArmGpioSignal, pin: ArmGpioPin) -> TransportResult<()>;

    /// Read an ARM GPIO signal assignment.
    fn arm_gpio_pin_get(&mut self, signal: ArmGpioSignal) -> TransportResult<ArmGpioPin>;
}
