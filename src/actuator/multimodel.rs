//! Multi-model LUT staging.
//!
//! LUTs 0..=25 for the inactive model are staged in correlator memory, two
//! 512-byte rows per LUT, then promoted by the firmware on request.

use super::model::{LutBank, ModelSel};
use crate::channel::TxChannel;
use crate::error::{DpdError, Result};
use crate::session::{Command, DpdSession};
use crate::transport::regmap::{
    object, tracking_cmd, CORR_MEM_BASE, CORR_MEM_ROW_STRIDE, MAILBOX_SET,
};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// LUTs staged per multi-model update.
pub const MULTI_MODEL_LUTS: usize = 26;
/// Bytes per correlator memory row.
pub const MULTI_MODEL_ROW_BYTES: usize = 512;
/// Largest staged LUT.
pub const MULTI_MODEL_LUT_BYTES: usize = 2 * MULTI_MODEL_ROW_BYTES;

const ZERO_ROW: [u8; MULTI_MODEL_ROW_BYTES] = [0; MULTI_MODEL_ROW_BYTES];

/// Firmware report on the last multi-model promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiModelUpdateStatus {
    /// Raw update status byte
    pub update_status: u8,
    /// Bank the promoted LUTs landed in
    pub bank: LutBank,
}

/// Check a staged LUT payload.
pub fn validate_multi_model_lut(lut: usize, data: &[u8]) -> Result<()> {
    if lut >= MULTI_MODEL_LUTS {
        return Err(DpdError::invalid(
            "multiModelLut",
            lut,
            format!("must be < {MULTI_MODEL_LUTS}"),
        ));
    }
    if data.len() > MULTI_MODEL_LUT_BYTES {
        return Err(DpdError::invalid(
            "multiModelLutSize",
            data.len(),
            format!("must be <= {MULTI_MODEL_LUT_BYTES}"),
        ));
    }
    if data.len() % 4 != 0 {
        return Err(DpdError::invalid(
            "multiModelLutSize",
            data.len(),
            "must be a multiple of 4",
        ));
    }
    Ok(())
}

/// Correlator memory address of a staging row.
fn row_address(lut: usize, offset: usize) -> u32 {
    // Rows hold 64 eight-byte words
    let second_row = usize::from((offset >> 3) > 63);
    let row = (lut * 2 + second_row) as u32;
    CORR_MEM_BASE + row * CORR_MEM_ROW_STRIDE
}

impl<T: Transport> DpdSession<T> {
    /// Stage every multi-model LUT. `None` entries zero their rows.
    pub fn write_multi_model_luts(&mut self, luts: &[Option<&[u8]>; MULTI_MODEL_LUTS]) -> Result<()> {
        if self.range_check() {
            for (lut, data) in luts.iter().copied().enumerate() {
                validate_multi_model_lut(lut, data.unwrap_or_default())?;
            }
        }
        for (lut, data) in luts.iter().copied().enumerate() {
            self.stage_rows(lut, data.unwrap_or_default())?;
        }
        info!(
            staged = luts.iter().filter(|d| d.is_some()).count(),
            "Multi-model LUTs staged"
        );
        Ok(())
    }

    /// Stage one multi-model LUT.
    pub fn write_multi_model_lut(&mut self, lut: usize, data: &[u8]) -> Result<()> {
        if self.range_check() {
            validate_multi_model_lut(lut, data)?;
        }
        self.stage_rows(lut, data)
    }

    fn stage_rows(&mut self, lut: usize, data: &[u8]) -> Result<()> {
        for offset in [0, MULTI_MODEL_ROW_BYTES] {
            let addr = row_address(lut, offset);
            let remaining = data.get(offset..).unwrap_or_default();
            if remaining.len() >= MULTI_MODEL_ROW_BYTES {
                self.transport
                    .dma_write(addr, &remaining[..MULTI_MODEL_ROW_BYTES], true)?;
            } else {
                self.transport.dma_write(addr, &ZERO_ROW, true)?;
                if !remaining.is_empty() {
                    self.transport.dma_write(addr, remaining, true)?;
                }
            }
        }
        debug!(lut, bytes = data.len(), "Multi-model LUT staged");
        Ok(())
    }

    /// Ask the firmware to promote the staged LUTs into `model` on `channel`.
    pub fn multi_model_update(&mut self, channel: TxChannel, model: ModelSel) -> Result<()> {
        model.require_multi_model()?;
        self.transport.mem_write(MAILBOX_SET, &[model.raw()])?;
        self.execute(
            Command::tracking(
                "multi-model update",
                &[
                    object::TRACKING_CAL_CTRL,
                    object::DPD_INIT,
                    channel.bit(),
                    tracking_cmd::MULTIMODEL_UPDATE,
                ],
            )
            .long_running(),
        )?;
        info!(channel = %channel, model = %model, "Multi-model update requested");
        Ok(())
    }

    /// Status of the last multi-model promotion on `channel`.
    pub fn multi_model_update_status(&mut self, channel: TxChannel) -> Result<MultiModelUpdateStatus> {
        self.execute(
            Command::tracking(
                "multi-model update status",
                &[
                    object::TRACKING_CAL_CTRL,
                    object::DPD_INIT,
                    channel.bit(),
                    tracking_cmd::MULTIMODEL_UPDATE_STATUS,
                ],
            )
            .long_running(),
        )?;
        let mut record = [0u8; 2];
        self.transport.mem_read(MAILBOX_SET, &mut record)?;
        Ok(MultiModelUpdateStatus {
            update_status: record[0],
            bank: LutBank::from_raw(record[1])?,
        })
    }
}
