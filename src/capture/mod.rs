//! DPD sample capture: configuration, trigger/done handling and buffer read-back.
//!
//! A typical cycle on a session:
//!
//! 1. [`DpdSession::set_capture_config`] assigns the GPIOs and writes the
//!    58-byte capture record.
//! 2. [`DpdSession::start_trigger`] arms the capture.
//! 3. [`DpdSession::poll_done`] until it returns `true`.
//! 4. [`DpdSession::capture_data`] reads all buffers and hands them back to
//!    the firmware.
//!
//! [`DpdSession`]: crate::DpdSession
//! [`DpdSession::set_capture_config`]: crate::DpdSession::set_capture_config
//! [`DpdSession::start_trigger`]: crate::DpdSession::start_trigger
//! [`DpdSession::poll_done`]: crate::DpdSession::poll_done
//! [`DpdSession::capture_data`]: crate::DpdSession::capture_data

pub mod codec;
pub mod data;
pub mod manager;
pub mod trigger;
pub mod types;

pub use data::{capture_extent, CaptureBuffer, CaptureData, IqBuffer, MAX_CAPTURE_SAMPLES};
pub use manager::{
    validate_capture_config, validate_capture_ctrl, validate_path_delay, validate_pwr_thresh,
};
pub use trigger::CaptureState;
pub use types::{
    BandDirection, CaptureConfig, CaptureCtrl, CaptureDetailedStatus, CaptureLevel,
    CapturePathDelay, CapturePwrThresh, CaptureSize, CaptureType, PeakConfig, PeakInputSel,
    PowerBand, PulseWidthRes, ThresholdBand, TxAltObsSel, TxObsSel,
};
