//! Gain monitor: firmware-driven model switching on gain threshold violations.
//!
//! Each channel owns a 12-byte slot in the gain monitor object:
//!
//! | Bytes | Field |
//! |---|---|
//! | 0..2 | qualifying threshold (u16 LE) |
//! | 2 | lower threshold |
//! | 3 | upper threshold |
//! | 4 | channel index |
//! | 5..8 | reserved |
//! | 8 | enable |
//! | 9 | lower-violation model |
//! | 10 | upper-violation model |
//! | 11 | IIR decay |

use crate::actuator::ModelSel;
use crate::channel::{TxChannel, TxChannelMask};
use crate::error::{DpdError, Result};
use crate::session::DpdSession;
use crate::transport::regmap::object;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Bytes per channel in the gain monitor object.
pub const GAIN_MONITOR_RECORD_LEN: usize = 12;
/// Largest IIR decay exponent.
pub const MAX_IIR_DECAY: u8 = 15;

/// Gain monitor settings for the channels in `channel_mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GainMonitorConfig {
    /// Channels this entry applies to
    pub channel_mask: TxChannelMask,
    /// Enable autoswitching
    pub enable: bool,
    /// Sample count a violation must persist before it qualifies
    pub qual_thresh: u16,
    /// Lower gain threshold
    pub lower_thresh: u8,
    /// Upper gain threshold
    pub upper_thresh: u8,
    /// Model switched to on a lower-threshold violation
    pub lower_model: ModelSel,
    /// Model switched to on an upper-threshold violation
    pub upper_model: ModelSel,
    /// Gain estimate IIR decay exponent
    pub iir_decay: u8,
}

impl GainMonitorConfig {
    /// Range check. Disabled entries are written as given.
    pub fn validate(&self) -> Result<()> {
        if self.channel_mask.is_empty() {
            return Err(DpdError::invalid(
                "gainMonitor.txChannelMask",
                "0x00",
                "at least one channel required",
            ));
        }
        if !self.enable {
            return Ok(());
        }
        if self.iir_decay > MAX_IIR_DECAY {
            return Err(DpdError::invalid(
                "gainMonitor.iirDecay",
                self.iir_decay,
                format!("must be <= {MAX_IIR_DECAY}"),
            ));
        }
        if self.lower_thresh > self.upper_thresh {
            return Err(DpdError::invalid(
                "gainMonitor.lowerThresh",
                self.lower_thresh,
                format!("exceeds upper threshold {}", self.upper_thresh),
            ));
        }
        Ok(())
    }

    /// Firmware record for one channel of this config.
    pub fn encode(&self, channel: TxChannel) -> [u8; GAIN_MONITOR_RECORD_LEN] {
        let mut record = [0u8; GAIN_MONITOR_RECORD_LEN];
        record[0..2].copy_from_slice(&self.qual_thresh.to_le_bytes());
        record[2] = self.lower_thresh;
        record[3] = self.upper_thresh;
        record[4] = channel.index() as u8;
        record[8] = u8::from(self.enable);
        record[9] = self.lower_model.raw();
        record[10] = self.upper_model.raw();
        record[11] = self.iir_decay;
        record
    }

    /// Parse a channel's record.
    pub fn decode(channel: TxChannel, record: &[u8]) -> Result<Self> {
        if record.len() < GAIN_MONITOR_RECORD_LEN {
            return Err(DpdError::invalid(
                "gainMonitorRecord",
                record.len(),
                format!("expected {GAIN_MONITOR_RECORD_LEN} bytes"),
            ));
        }
        Ok(Self {
            channel_mask: channel.mask(),
            enable: record[8] & 0x01 != 0,
            qual_thresh: u16::from_le_bytes([record[0], record[1]]),
            lower_thresh: record[2],
            upper_thresh: record[3],
            lower_model: ModelSel::from_raw(record[9])?,
            upper_model: ModelSel::from_raw(record[10])?,
            iir_decay: record[11],
        })
    }
}

fn record_offset(channel: TxChannel) -> u16 {
    (channel.index() * GAIN_MONITOR_RECORD_LEN) as u16
}

impl<T: Transport> DpdSession<T> {
    /// Write gain monitor settings. Every channel in each entry's mask gets
    /// its own record; later entries win where masks overlap.
    pub fn set_gain_monitor(&mut self, configs: &[GainMonitorConfig]) -> Result<()> {
        if configs.is_empty() {
            return Err(DpdError::NullInput {
                field: "gainMonitorConfigs",
            });
        }
        if self.range_check() {
            configs.iter().try_for_each(GainMonitorConfig::validate)?;
        }

        for config in configs {
            for channel in config.channel_mask.channels() {
                let record = config.encode(channel);
                self.transport.config_write(
                    object::EXT_DPD_GAIN_MONITOR,
                    record_offset(channel),
                    &record,
                )?;
                debug!(channel = %channel, enable = config.enable, "Gain monitor record written");
            }
        }
        info!(entries = configs.len(), "Gain monitor configured");
        Ok(())
    }

    /// Gain monitor settings of `channel`.
    pub fn gain_monitor_get(&mut self, channel: TxChannel) -> Result<GainMonitorConfig> {
        let mut record = [0u8; GAIN_MONITOR_RECORD_LEN];
        self.transport.config_read(
            object::EXT_DPD_GAIN_MONITOR,
            record_offset(channel),
            &mut record,
        )?;
        GainMonitorConfig::decode(channel, &record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SimDevice, SimOp};

    fn enabled() -> GainMonitorConfig {
        GainMonitorConfig {
            channel_mask: TxChannelMask::TX2,
            enable: true,
            qual_thresh: 0x1234,
            lower_thresh: 10,
            upper_thresh: 200,
            lower_model: ModelSel::Model1,
            upper_model: ModelSel::Model3,
            iir_decay: 7,
        }
    }

    #[test]
    fn test_record_layout() {
        let record = enabled().encode(TxChannel::Tx2);
        assert_eq!(
            record,
            [0x34, 0x12, 10, 200, 1, 0, 0, 0, 1, 1, 3, 7]
        );
    }

    #[test]
    fn test_validation_only_for_enabled_entries() {
        let mut config = enabled();
        config.lower_thresh = 201;
        assert!(config.validate().unwrap_err().is_invalid_parameter());

        config.enable = false;
        assert!(config.validate().is_ok());

        let mut config = enabled();
        config.iir_decay = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let err = session.set_gain_monitor(&[]).unwrap_err();
        assert!(matches!(err, DpdError::NullInput { .. }));
        assert_eq!(sim.op_count(SimOp::ConfigWrite), 0);
    }

    #[test]
    fn test_mask_writes_each_channel_slot() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let config = GainMonitorConfig {
            channel_mask: TxChannelMask::TX1 | TxChannelMask::TX4,
            ..enabled()
        };
        session.set_gain_monitor(&[config]).unwrap();
        assert_eq!(sim.op_count(SimOp::ConfigWrite), 2);

        let tx4 = session.gain_monitor_get(TxChannel::Tx4).unwrap();
        assert_eq!(tx4.channel_mask, TxChannelMask::TX4);
        assert_eq!(tx4.upper_model, ModelSel::Model3);
        assert_eq!(tx4.qual_thresh, 0x1234);
        assert!(tx4.enable);

        let slot = sim.config_object(object::EXT_DPD_GAIN_MONITOR);
        assert_eq!(slot[3 * GAIN_MONITOR_RECORD_LEN + 4], 3);
    }
}
