//! # ADRV9025 DPD Capture and Actuator Control
//!
//! Host-side driver for the external digital pre-distortion (DPD) support of
//! the ADRV9025 transceiver. It captures time-aligned Tx/ORx I/Q samples for
//! an adaptation engine running off-chip, and programs the on-chip actuator
//! (model records, LUTs, swap mode, gain monitor, hard clipper) with its
//! results.
//!
//! All chip access goes through the [`Transport`] trait. The crate ships a
//! simulated device, [`SimDevice`], that models the firmware mailbox and
//! memories closely enough to drive every operation in tests.
//!
//! ## Crate Structure
//!
//! - **`session`**: [`DpdSession`], the context object owning the transport,
//!   the settings and the host-side mirror of firmware state. Every operation
//!   is a method on it.
//! - **`capture`**: capture records and their byte codec, the trigger and done
//!   state machine, buffer read-back.
//! - **`gpio`**: trigger/done pin arbitration over shared GPIO resources,
//!   with rollback on partial failure.
//! - **`actuator`**: model records, LUT addressing and access, actuator clock
//!   gating, swap mode and multi-model staging.
//! - **`monitor`**: gain monitor autoswitching and the hard clipper.
//! - **`config`**: [`DriverSettings`] loaded with figment from TOML and the
//!   environment.
//! - **`logging`**: tracing-subscriber setup for applications.
//! - **`error`**: [`DpdError`] and the decoded firmware error codes.
//!
//! ## Example
//!
//! ```no_run
//! use adrv9025_dpd::capture::{CaptureConfig, CaptureSize, CaptureType};
//! use adrv9025_dpd::{DpdSession, DriverSettings, SimDevice, TxChannel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = DriverSettings::default();
//! adrv9025_dpd::logging::init_from_settings(&settings)?;
//!
//! let mut session = DpdSession::new(SimDevice::new(), settings);
//!
//! let mut config = CaptureConfig::default();
//! config.ctrl.channel = TxChannel::Tx1;
//! config.ctrl.capture_type = CaptureType::Immediate;
//! config.ctrl.size = CaptureSize::Samples256;
//! session.set_capture_config(&config)?;
//!
//! session.start_trigger()?;
//! while !session.poll_done()? {}
//! let data = session.capture_data()?;
//! println!("captured {} Tx samples", data.tx.len());
//! # Ok(())
//! # }
//! ```

pub mod actuator;
pub mod capture;
pub mod channel;
pub mod config;
pub mod error;
pub mod gpio;
pub mod logging;
pub mod monitor;
pub mod session;
pub mod transport;

pub use channel::{TxChannel, TxChannelMask};
pub use config::DriverSettings;
pub use error::{DeviceErrorCode, DpdError, Result};
pub use gpio::GpioPin;
pub use session::DpdSession;
pub use transport::{SimDevice, Transport, TransportError};
