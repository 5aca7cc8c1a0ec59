//! Post-actuator hard clipper and its event counter.
//!
//! The threshold is a fraction of full scale carried as Q1.15, so 1.0 is
//! `0x8000`. Configuration goes through the mailbox one channel at a time:
//! the 3-byte record `[enable, threshold_lo, threshold_hi]` is staged in the
//! SET scratch area, then a tracking command applies it.

use crate::channel::{TxChannel, TxChannelMask};
use crate::error::{DpdError, Result};
use crate::session::{Command, DpdSession};
use crate::transport::regmap::{object, opcode, tracking_cmd, MAILBOX_SET};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Most entries accepted by [`DpdSession::set_hard_clipper`].
pub const MAX_HARD_CLIPPER_CONFIGS: usize = 4;
/// Width of the clip event counter.
pub const CLIPPER_COUNTER_MASK: u32 = 0x00FF_FFFF;

const Q15_SCALE: f32 = 32768.0;

/// Hard clipper settings for the channels in `channel_mask`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HardClipperConfig {
    /// Channels this entry applies to
    pub channel_mask: TxChannelMask,
    /// Clip when the actuator output exceeds the threshold
    pub enable: bool,
    /// Threshold as a fraction of full scale, 0.0..=1.0
    pub threshold: f32,
}

impl HardClipperConfig {
    /// Range check. The threshold only matters when the entry enables
    /// clipping on at least one channel.
    pub fn validate(&self) -> Result<()> {
        if self.enable && !self.channel_mask.is_empty() && !(0.0..=1.0).contains(&self.threshold) {
            return Err(DpdError::invalid(
                "hardClipper.threshold",
                self.threshold,
                "must be within 0.0..=1.0",
            ));
        }
        Ok(())
    }

    fn record(&self) -> [u8; 3] {
        let [lo, hi] = encode_threshold(self.threshold).to_le_bytes();
        [u8::from(self.enable), lo, hi]
    }
}

/// Q1.15 encoding of a normalised threshold (truncating).
pub fn encode_threshold(threshold: f32) -> u16 {
    (threshold * Q15_SCALE) as u16
}

/// Normalised threshold from its Q1.15 encoding.
pub fn decode_threshold(raw: u16) -> f32 {
    f32::from(raw) / Q15_SCALE
}

fn tracking_ext(channel_bits: u8, sub_command: u8) -> [u8; 4] {
    [
        object::TRACKING_CAL_CTRL,
        object::DPD_INIT,
        channel_bits,
        sub_command,
    ]
}

impl<T: Transport> DpdSession<T> {
    /// Program the hard clipper. Each channel in an entry's mask is staged
    /// and applied separately.
    pub fn set_hard_clipper(&mut self, configs: &[HardClipperConfig]) -> Result<()> {
        if configs.is_empty() {
            return Err(DpdError::NullInput {
                field: "hardClipperConfigs",
            });
        }
        if self.range_check() {
            if configs.len() > MAX_HARD_CLIPPER_CONFIGS {
                return Err(DpdError::invalid(
                    "numHardClipperConfigs",
                    configs.len(),
                    format!("must be 1..={MAX_HARD_CLIPPER_CONFIGS}"),
                ));
            }
            configs.iter().try_for_each(HardClipperConfig::validate)?;
        }

        for config in configs {
            let record = config.record();
            for channel in config.channel_mask.channels() {
                self.transport.mem_write(MAILBOX_SET, &record)?;
                let ext = tracking_ext(channel.bit(), tracking_cmd::HARD_CLIPPER_SET);
                self.execute(Command::tracking("hard clipper set", &ext))?;
                debug!(
                    channel = %channel,
                    enable = config.enable,
                    threshold = config.threshold,
                    "Hard clipper applied"
                );
            }
        }
        info!(entries = configs.len(), "Hard clipper configured");
        Ok(())
    }

    /// Hard clipper settings of `channel`.
    pub fn hard_clipper_get(&mut self, channel: TxChannel) -> Result<HardClipperConfig> {
        let ext = tracking_ext(channel.bit(), tracking_cmd::HARD_CLIPPER_GET);
        self.execute(Command::tracking("hard clipper get", &ext).waiting_on(opcode::GET))?;
        let mut record = [0u8; 3];
        self.transport.mem_read(MAILBOX_SET, &mut record)?;
        Ok(HardClipperConfig {
            channel_mask: channel.mask(),
            enable: record[0] != 0,
            threshold: decode_threshold(u16::from_le_bytes([record[1], record[2]])),
        })
    }

    /// Zero the clip event counter of every channel in `mask`.
    pub fn hard_clipper_counter_reset(&mut self, mask: TxChannelMask) -> Result<()> {
        if self.range_check() && mask.is_empty() {
            return Err(DpdError::invalid(
                "txChannelMask",
                "0x00",
                "at least one channel required",
            ));
        }
        for channel in mask.channels() {
            let ext = tracking_ext(channel.bit(), tracking_cmd::HARD_CLIPPER_COUNTER_RESET);
            self.execute(Command::tracking("hard clipper counter reset", &ext))?;
        }
        debug!(mask = mask.bits(), "Hard clipper counters reset");
        Ok(())
    }

    /// Clip events counted on `channel` since the last reset (24 bits).
    pub fn hard_clipper_counter_get(&mut self, channel: TxChannel) -> Result<u32> {
        let ext = tracking_ext(channel.bit(), tracking_cmd::HARD_CLIPPER_COUNTER_GET);
        self.execute(
            Command::tracking("hard clipper counter get", &ext).waiting_on(opcode::GET),
        )?;
        let mut count = [0u8; 4];
        self.transport.mem_read(MAILBOX_SET, &mut count)?;
        Ok(u32::from_le_bytes(count) & CLIPPER_COUNTER_MASK)
    }
}
