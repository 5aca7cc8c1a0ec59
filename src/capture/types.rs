//! Capture configuration and status types.

use crate::channel::TxChannel;
use crate::error::{DeviceErrorCode, DpdError, Result};
use crate::gpio::GpioPin;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture trigger policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureType {
    /// Capture as soon as triggered
    #[default]
    Immediate,
    /// Capture on a power-band transition
    PowerLevel,
    /// Capture around the detected signal peak
    PeakDetection,
    /// Capture synchronised to the TDD Tx-on edge
    TddTxOnSync,
    /// Peak search over an extended window; samples land in LUT memory
    ExtendedPeakSearch,
}

impl CaptureType {
    /// Firmware enumeration value.
    pub fn raw(self) -> u8 {
        match self {
            Self::Immediate => 0,
            Self::PowerLevel => 1,
            Self::PeakDetection => 2,
            Self::TddTxOnSync => 4,
            Self::ExtendedPeakSearch => 8,
        }
    }

    /// Whether peak-search fields apply.
    pub fn is_peak(self) -> bool {
        matches!(self, Self::PeakDetection | Self::ExtendedPeakSearch)
    }
}

impl fmt::Display for CaptureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Immediate => "immediate",
            Self::PowerLevel => "power-level",
            Self::PeakDetection => "peak-detection",
            Self::TddTxOnSync => "tdd-tx-on",
            Self::ExtendedPeakSearch => "extended-peak-search",
        };
        f.write_str(name)
    }
}

/// Tx observation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TxObsSel {
    /// After the actuator
    #[default]
    PostActuator,
    /// Before the actuator
    PreActuator,
}

/// Tx alternate observation point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TxAltObsSel {
    /// Actuator output
    #[default]
    Actuator,
    /// Before crest-factor reduction
    PreCfr,
}

/// Number of samples per capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaptureSize {
    /// 4096 samples
    #[default]
    Samples4096,
    /// 2048 samples
    Samples2048,
    /// 1024 samples
    Samples1024,
    /// 512 samples
    Samples512,
    /// 256 samples
    Samples256,
    /// 128 samples
    Samples128,
    /// 64 samples
    Samples64,
    /// 32 samples
    Samples32,
}

impl CaptureSize {
    const TABLE: [(CaptureSize, usize); 8] = [
        (Self::Samples4096, 4096),
        (Self::Samples2048, 2048),
        (Self::Samples1024, 1024),
        (Self::Samples512, 512),
        (Self::Samples256, 256),
        (Self::Samples128, 128),
        (Self::Samples64, 64),
        (Self::Samples32, 32),
    ];

    /// Firmware size code (0 = 4096 ... 7 = 32).
    pub fn code(self) -> u8 {
        Self::TABLE
            .iter()
            .position(|(size, _)| *size == self)
            .unwrap_or(0) as u8
    }

    /// Size from its firmware code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::TABLE.get(usize::from(code)).map(|(size, _)| *size)
    }

    /// Samples per capture.
    pub fn samples(self) -> usize {
        Self::TABLE[usize::from(self.code())].1
    }

    /// Size for an exact sample count.
    pub fn from_samples(samples: usize) -> Result<Self> {
        Self::TABLE
            .iter()
            .find(|(_, n)| *n == samples)
            .map(|(size, _)| *size)
            .ok_or_else(|| {
                DpdError::invalid("captureSize", samples, "must be a power of two in 32..=4096")
            })
    }
}

/// Peak detector input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PeakInputSel {
    /// DPD input
    #[default]
    Dpd,
    /// CFR output
    Cfr,
}

impl PeakInputSel {
    /// Firmware value.
    pub fn raw(self) -> u8 {
        match self {
            Self::Dpd => 0,
            Self::Cfr => 1,
        }
    }

    /// Decode a firmware value.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Dpd),
            1 => Ok(Self::Cfr),
            other => Err(DpdError::invalid("peakInputSel", other, "must be DPD (0) or CFR (1)")),
        }
    }
}

/// Peak-search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeakConfig {
    /// Peak decay, 0..=15
    pub decay: u8,
    /// Window length in samples, 24 bits
    pub window_count: u32,
    /// Detector input
    pub input_sel: PeakInputSel,
    /// Enable the IIR filter
    pub iir_enable: bool,
    /// Bypass the IIR filter
    pub iir_bypass: bool,
    /// Extended search window in microseconds
    pub extended_window_us: u32,
}

/// Capture control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureCtrl {
    /// Target channel
    pub channel: TxChannel,
    /// Trigger policy
    pub capture_type: CaptureType,
    /// Tx observation point
    pub tx_obs_sel: TxObsSel,
    /// Tx alternate observation point
    pub tx_alt_obs_sel: TxAltObsSel,
    /// Samples per capture
    pub size: CaptureSize,
    /// Peak-search parameters
    pub peak: PeakConfig,
    /// Tx/ORx alignment delay, 0..=8191
    pub align_delay: u16,
    /// Delay from trigger to capture, 24 bits
    pub capture_delay: u32,
}

impl Default for CaptureCtrl {
    fn default() -> Self {
        Self {
            channel: TxChannel::Tx1,
            capture_type: CaptureType::default(),
            tx_obs_sel: TxObsSel::default(),
            tx_alt_obs_sel: TxAltObsSel::default(),
            size: CaptureSize::default(),
            peak: PeakConfig::default(),
            align_delay: 0,
            capture_delay: 0,
        }
    }
}

/// Pulse-width resolution multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PulseWidthRes {
    /// 1x
    #[default]
    X1,
    /// 256x
    X256,
    /// 65536x
    X65536,
    /// 16777216x
    X16777216,
}

impl PulseWidthRes {
    /// Firmware value.
    pub fn raw(self) -> u8 {
        match self {
            Self::X1 => 0,
            Self::X256 => 1,
            Self::X65536 => 2,
            Self::X16777216 => 3,
        }
    }

    /// Decode a firmware value.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::X1),
            1 => Ok(Self::X256),
            2 => Ok(Self::X65536),
            3 => Ok(Self::X16777216),
            other => Err(DpdError::invalid("pulseWidthRes", other, "must be 0..=3")),
        }
    }
}

/// Power-band transition thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapturePwrThresh {
    /// Low-to-high transition limit
    pub low_to_high_limit: u8,
    /// High-to-low transition limit
    pub high_to_low_limit: u8,
    /// Pulse-width resolution
    pub pulse_width_res: PulseWidthRes,
    /// Minimum low-to-high pulse width, 0..=4096
    pub low_to_high_pulse_width: u16,
    /// Minimum high-to-low pulse width, 0..=4096
    pub high_to_low_pulse_width: u16,
}

/// Which band boundary a threshold record applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdBand {
    /// Between bands 0 and 1
    Band01,
    /// Between bands 1 and 2
    Band12,
    /// Between bands 2 and 3
    Band23,
}

impl ThresholdBand {
    /// All boundaries in record order.
    pub const ALL: [ThresholdBand; 3] = [Self::Band01, Self::Band12, Self::Band23];

    /// Position in the threshold table.
    pub fn index(self) -> usize {
        match self {
            Self::Band01 => 0,
            Self::Band12 => 1,
            Self::Band23 => 2,
        }
    }
}

/// Power band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PowerBand {
    /// Band 0
    #[default]
    Band0,
    /// Band 1
    Band1,
    /// Band 2
    Band2,
    /// Band 3
    Band3,
}

impl PowerBand {
    /// Firmware value.
    pub fn raw(self) -> u8 {
        match self {
            Self::Band0 => 0,
            Self::Band1 => 1,
            Self::Band2 => 2,
            Self::Band3 => 3,
        }
    }

    /// Decode a firmware value.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Band0),
            1 => Ok(Self::Band1),
            2 => Ok(Self::Band2),
            3 => Ok(Self::Band3),
            other => Err(DpdError::invalid("bandSel", other, "must be 0..=3")),
        }
    }
}

/// Direction of the band transition that triggers a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BandDirection {
    /// Either direction
    #[default]
    Any,
    /// Rising power
    Ascending,
    /// Falling power
    Descending,
}

impl BandDirection {
    /// Firmware value.
    pub fn raw(self) -> u8 {
        match self {
            Self::Any => 0,
            Self::Ascending => 2,
            Self::Descending => 3,
        }
    }

    /// Decode a firmware value.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Any),
            2 => Ok(Self::Ascending),
            3 => Ok(Self::Descending),
            other => Err(DpdError::invalid("bandDir", other, "must be 0, 2 or 3")),
        }
    }
}

/// Power-level trigger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureLevel {
    /// Trigger timeout
    pub timeout: u16,
    /// Band to watch
    pub band_sel: PowerBand,
    /// Transition direction
    pub band_dir: BandDirection,
}

/// Path delay record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapturePathDelay {
    /// FIFO delay
    pub fifo_delay: u8,
    /// Interpolation index, 0..=15
    pub interpolation_index: u8,
}

/// Complete capture configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// GPIO that triggers a capture (GPIO00..15) or invalid
    pub trigger_pin: GpioPin,
    /// GPIO that signals capture completion (GPIO00..18) or invalid
    pub done_pin: GpioPin,
    /// Tx/ORx path delay
    pub path_delay: CapturePathDelay,
    /// Control record
    pub ctrl: CaptureCtrl,
    /// Power-level trigger
    pub level: CaptureLevel,
    /// Thresholds for band boundaries 01, 12, 23
    pub pwr_thresh: [CapturePwrThresh; 3],
    /// Envelope power decay
    pub envelope_decay: u16,
}

impl CaptureConfig {
    /// Threshold record for a band boundary.
    pub fn thresh(&self, band: ThresholdBand) -> &CapturePwrThresh {
        &self.pwr_thresh[band.index()]
    }
}

/// Detailed capture status from the tracking calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDetailedStatus {
    /// Decoded firmware error
    pub error_code: DeviceErrorCode,
    /// Non-zero if the capture timed out
    pub timeout: u8,
    /// Number of band transitions seen
    pub band_transition_count: u8,
    /// Current power band
    pub power_band_status: u8,
    /// Captures completed
    pub capture_count: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_table() {
        assert_eq!(CaptureSize::Samples4096.code(), 0);
        assert_eq!(CaptureSize::Samples32.code(), 7);
        assert_eq!(CaptureSize::Samples256.samples(), 256);
        assert_eq!(CaptureSize::from_code(3), Some(CaptureSize::Samples512));
        assert_eq!(CaptureSize::from_code(8), None);
        assert_eq!(
            CaptureSize::from_samples(1024).unwrap(),
            CaptureSize::Samples1024
        );
        assert!(CaptureSize::from_samples(1000).is_err());
    }

    #[test]
    fn test_band_direction_codes() {
        assert_eq!(BandDirection::from_raw(2).unwrap(), BandDirection::Ascending);
        assert!(BandDirection::from_raw(1).is_err());
    }

    #[test]
    fn test_capture_type_raw() {
        let raws: Vec<u8> = [
            CaptureType::Immediate,
            CaptureType::PowerLevel,
            CaptureType::PeakDetection,
            CaptureType::TddTxOnSync,
            CaptureType::ExtendedPeakSearch,
        ]
        .iter()
        .map(|t| t.raw())
        .collect();
        assert_eq!(raws, vec![0, 1, 2, 4, 8]);
        assert!(CaptureType::ExtendedPeakSearch.is_peak());
        assert!(!CaptureType::TddTxOnSync.is_peak());
    }
}
