//! Actuator model records.
//!
//! The firmware keeps one 48-byte record per channel in `EXT_DPD_MODEL` and
//! two per channel (Model0, Model1) in `EXT_DPD_MULTIMODEL`:
//!
//! ```text
//! [0]      channel index (ignored on read)
//! [1]      model select
//! [2]      LUT bank select
//! [3]      |x|^2 gain
//! [4]      compander size (0 = 8-bit, 1 = 9-bit)
//! [5]      output shift
//! [6..8]   LUT I sum, u16 LE
//! [8..40]  I select
//! [40..48] J select
//! ```

use crate::channel::TxChannel;
use crate::error::{DpdError, Result};
use crate::session::DpdSession;
use crate::transport::regmap::object;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Bytes in one model record.
pub const MODEL_RECORD_LEN: usize = 48;
/// Stride between channels in the multi-model object.
pub const MULTI_MODEL_STRIDE: usize = 2 * MODEL_RECORD_LEN;
/// Largest actuator output shift.
pub const MAX_OUTPUT_SHIFT: u8 = 15;

/// Actuator model slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelSel {
    /// Slot 0
    #[default]
    Model0,
    /// Slot 1
    Model1,
    /// Slot 2
    Model2,
    /// Slot 3
    Model3,
}

impl ModelSel {
    /// Firmware value.
    pub fn raw(self) -> u8 {
        match self {
            Self::Model0 => 0,
            Self::Model1 => 1,
            Self::Model2 => 2,
            Self::Model3 => 3,
        }
    }

    /// Decode a firmware value.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Model0),
            1 => Ok(Self::Model1),
            2 => Ok(Self::Model2),
            3 => Ok(Self::Model3),
            other => Err(DpdError::invalid("modelSel", other, "must be Model0..Model3")),
        }
    }

    /// Whether the slot exists in multi-model mode.
    pub fn is_multi_model(self) -> bool {
        matches!(self, Self::Model0 | Self::Model1)
    }

    pub(crate) fn require_multi_model(self) -> Result<()> {
        if self.is_multi_model() {
            Ok(())
        } else {
            Err(DpdError::invalid(
                "modelSel",
                self,
                "only Model0 and Model1 are supported in multi-model mode",
            ))
        }
    }
}

impl fmt::Display for ModelSel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model{}", self.raw())
    }
}

/// One of the four 1 KiB banks of a LUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LutBank {
    /// Bytes 0x000..0x400
    #[default]
    Bank0,
    /// Bytes 0x400..0x800
    Bank1,
    /// Bytes 0x800..0xC00
    Bank2,
    /// Bytes 0xC00..0x1000
    Bank3,
}

impl LutBank {
    /// All banks in address order.
    pub const ALL: [LutBank; 4] = [Self::Bank0, Self::Bank1, Self::Bank2, Self::Bank3];

    /// Bank position within the LUT.
    pub fn index(self) -> usize {
        match self {
            Self::Bank0 => 0,
            Self::Bank1 => 1,
            Self::Bank2 => 2,
            Self::Bank3 => 3,
        }
    }

    /// Firmware value.
    pub fn raw(self) -> u8 {
        self.index() as u8
    }

    /// Decode a firmware value.
    pub fn from_raw(raw: u8) -> Result<Self> {
        Self::from_index(usize::from(raw))
    }

    /// Bank at a position.
    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| DpdError::invalid("lutBank", index, "must be Bank0..Bank3"))
    }
}

impl fmt::Display for LutBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bank{}", self.index())
    }
}

/// Actuator compander width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompanderSize {
    /// 8-bit compander: 256 entries, any bank
    #[default]
    Bits8,
    /// 9-bit compander: 512 entries spanning two banks
    Bits9,
}

impl CompanderSize {
    /// Firmware value.
    pub fn raw(self) -> u8 {
        match self {
            Self::Bits8 => 0,
            Self::Bits9 => 1,
        }
    }

    /// Decode a firmware value.
    pub fn from_raw(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Self::Bits8),
            1 => Ok(Self::Bits9),
            other => Err(DpdError::invalid(
                "companderSize",
                other,
                "must be 0 (8-bit) or 1 (9-bit)",
            )),
        }
    }

    /// Largest LUT payload accepted in swap mode.
    pub fn max_swap_lut_bytes(self) -> usize {
        match self {
            Self::Bits8 => 1024,
            Self::Bits9 => 2048,
        }
    }

    /// Holding bank the swap pass writes to.
    pub fn swap_bank(self) -> LutBank {
        match self {
            Self::Bits8 => LutBank::Bank3,
            Self::Bits9 => LutBank::Bank2,
        }
    }
}

impl fmt::Display for CompanderSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bits8 => f.write_str("8-bit"),
            Self::Bits9 => f.write_str("9-bit"),
        }
    }
}

/// GMP actuator model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtDpdModel {
    /// Model slot this record describes
    pub model: ModelSel,
    /// LUT bank the model reads
    pub bank: LutBank,
    /// |x|^2 gain
    pub mag_sq_gain: u8,
    /// Compander width
    pub compander: CompanderSize,
    /// Output shift, 0..=15
    pub output_shift: u8,
    /// Sum of I-term LUTs
    pub lut_i_sum: u16,
    /// I-term select per LUT
    pub i_sel: [u8; 32],
    /// J-term select
    pub j_sel: [u8; 8],
}

impl Default for ExtDpdModel {
    fn default() -> Self {
        Self {
            model: ModelSel::Model0,
            bank: LutBank::Bank0,
            mag_sq_gain: 0,
            compander: CompanderSize::Bits8,
            output_shift: 0,
            lut_i_sum: 0,
            i_sel: [0; 32],
            j_sel: [0; 8],
        }
    }
}

impl ExtDpdModel {
    /// Range-check the fields the type system does not constrain.
    pub fn validate(&self) -> Result<()> {
        if self.compander == CompanderSize::Bits9
            && !matches!(self.bank, LutBank::Bank0 | LutBank::Bank2)
        {
            return Err(DpdError::invalid(
                "lutBank",
                self.bank,
                "9-bit compander requires Bank0 or Bank2",
            ));
        }
        if self.output_shift > MAX_OUTPUT_SHIFT {
            return Err(DpdError::invalid(
                "outputShift",
                self.output_shift,
                format!("must be <= {MAX_OUTPUT_SHIFT}"),
            ));
        }
        Ok(())
    }

    /// Serialise for `channel`.
    pub fn encode(&self, channel: TxChannel) -> [u8; MODEL_RECORD_LEN] {
        let mut out = [0u8; MODEL_RECORD_LEN];
        out[0] = channel.index() as u8;
        out[1] = self.model.raw();
        out[2] = self.bank.raw();
        out[3] = self.mag_sq_gain;
        out[4] = self.compander.raw();
        out[5] = self.output_shift;
        out[6..8].copy_from_slice(&self.lut_i_sum.to_le_bytes());
        out[8..40].copy_from_slice(&self.i_sel);
        out[40..48].copy_from_slice(&self.j_sel);
        out
    }

    /// Parse a record. The channel byte is ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MODEL_RECORD_LEN {
            return Err(DpdError::invalid(
                "modelRecord",
                bytes.len(),
                format!("need {MODEL_RECORD_LEN} bytes"),
            ));
        }
        let mut i_sel = [0u8; 32];
        i_sel.copy_from_slice(&bytes[8..40]);
        let mut j_sel = [0u8; 8];
        j_sel.copy_from_slice(&bytes[40..48]);
        Ok(Self {
            model: ModelSel::from_raw(bytes[1])?,
            bank: LutBank::from_raw(bytes[2])?,
            mag_sq_gain: bytes[3],
            compander: CompanderSize::from_raw(bytes[4])?,
            output_shift: bytes[5],
            lut_i_sum: u16::from_le_bytes([bytes[6], bytes[7]]),
            i_sel,
            j_sel,
        })
    }
}

fn model_offset(channel: TxChannel) -> u16 {
    (channel.index() * MODEL_RECORD_LEN) as u16
}

fn multi_model_offset(channel: TxChannel, model: ModelSel) -> u16 {
    let slot = if model == ModelSel::Model1 {
        MODEL_RECORD_LEN
    } else {
        0
    };
    (channel.index() * MULTI_MODEL_STRIDE + slot) as u16
}

impl<T: Transport> DpdSession<T> {
    /// Write the actuator model for `channel`.
    pub fn configure_model(&mut self, channel: TxChannel, model: &ExtDpdModel) -> Result<()> {
        if self.range_check() {
            model.validate()?;
        }
        let record = model.encode(channel);
        self.transport
            .config_write(object::EXT_DPD_MODEL, model_offset(channel), &record)?;
        debug!(
            channel = %channel,
            model = %model.model,
            bank = %model.bank,
            compander = %model.compander,
            "Actuator model configured"
        );
        Ok(())
    }

    /// Actuator model currently configured for `channel`.
    pub fn actuator_model_get(&mut self, channel: TxChannel) -> Result<ExtDpdModel> {
        let mut record = [0u8; MODEL_RECORD_LEN];
        self.transport
            .config_read(object::EXT_DPD_MODEL, model_offset(channel), &mut record)?;
        ExtDpdModel::decode(&record)
    }

    /// Write one of the two multi-model slots of `channel`. The slot is taken
    /// from `model.model`.
    pub fn multi_model_config_set(&mut self, channel: TxChannel, model: &ExtDpdModel) -> Result<()> {
        model.model.require_multi_model()?;
        if self.range_check() {
            model.validate()?;
        }
        let record = model.encode(channel);
        self.transport.config_write(
            object::EXT_DPD_MULTIMODEL,
            multi_model_offset(channel, model.model),
            &record,
        )?;
        debug!(channel = %channel, model = %model.model, "Multi-model slot configured");
        Ok(())
    }

    /// Read one of the two multi-model slots of `channel`.
    pub fn multi_model_config_get(&mut self, channel: TxChannel, model: ModelSel) -> Result<ExtDpdModel> {
        model.require_multi_model()?;
        let mut record = [0u8; MODEL_RECORD_LEN];
        self.transport.config_read(
            object::EXT_DPD_MULTIMODEL,
            multi_model_offset(channel, model),
            &mut record,
        )?;
        ExtDpdModel::decode(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverSettings;
    use crate::transport::{SimDevice, SimOp};

    fn sample_model() -> ExtDpdModel {
        let mut model = ExtDpdModel {
            model: ModelSel::Model2,
            bank: LutBank::Bank2,
            mag_sq_gain: 0x40,
            compander: CompanderSize::Bits9,
            output_shift: 7,
            lut_i_sum: 0x1234,
            ..Default::default()
        };
        for (i, sel) in model.i_sel.iter_mut().enumerate() {
            *sel = i as u8;
        }
        model.j_sel = [9, 8, 7, 6, 5, 4, 3, 2];
        model
    }

    #[test]
    fn test_record_layout() {
        let record = sample_model().encode(TxChannel::Tx3);
        assert_eq!(&record[..8], &[2, 2, 2, 0x40, 1, 7, 0x34, 0x12]);
        assert_eq!(record[8], 0);
        assert_eq!(record[39], 31);
        assert_eq!(&record[40..48], &[9, 8, 7, 6, 5, 4, 3, 2]);
    }

    #[test]
    fn test_decode_ignores_channel_byte() {
        let model = sample_model();
        let mut record = model.encode(TxChannel::Tx1);
        record[0] = 0xAA;
        assert_eq!(ExtDpdModel::decode(&record).unwrap(), model);
    }

    #[test]
    fn test_nine_bit_bank_rule() {
        for bank in LutBank::ALL {
            let model = ExtDpdModel {
                compander: CompanderSize::Bits9,
                bank,
                ..Default::default()
            };
            let ok = matches!(bank, LutBank::Bank0 | LutBank::Bank2);
            assert_eq!(model.validate().is_ok(), ok, "{bank}");
        }
        let eight_bit = ExtDpdModel {
            bank: LutBank::Bank3,
            ..Default::default()
        };
        assert!(eight_bit.validate().is_ok());
    }

    #[test]
    fn test_output_shift_limit() {
        let model = ExtDpdModel {
            output_shift: 16,
            ..Default::default()
        };
        assert!(model.validate().unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_configure_model_offset_and_read_back() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let model = sample_model();

        session.configure_model(TxChannel::Tx4, &model).unwrap();
        assert_eq!(sim.config_object(object::EXT_DPD_MODEL).len(), 4 * 48);
        assert_eq!(session.actuator_model_get(TxChannel::Tx4).unwrap(), model);
    }

    #[test]
    fn test_invalid_model_rejected_before_hardware() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let model = ExtDpdModel {
            compander: CompanderSize::Bits9,
            bank: LutBank::Bank1,
            ..Default::default()
        };
        assert!(session.configure_model(TxChannel::Tx1, &model).is_err());
        assert_eq!(sim.op_count(SimOp::ConfigWrite), 0);

        let mut settings = DriverSettings::default();
        settings.validation.range_check = false;
        session.set_settings(settings);
        session.configure_model(TxChannel::Tx1, &model).unwrap();
    }

    #[test]
    fn test_multi_model_slots() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let slot1 = ExtDpdModel {
            model: ModelSel::Model1,
            mag_sq_gain: 3,
            ..Default::default()
        };
        session
            .multi_model_config_set(TxChannel::Tx2, &slot1)
            .unwrap();

        let object = sim.config_object(object::EXT_DPD_MULTIMODEL);
        assert_eq!(object.len(), 96 + 48 + 48);
        assert_eq!(object[96 + 48 + 3], 3);
        assert_eq!(
            session
                .multi_model_config_get(TxChannel::Tx2, ModelSel::Model1)
                .unwrap(),
            slot1
        );
    }

    #[test]
    fn test_multi_model_rejects_upper_slots() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim);
        let model = ExtDpdModel {
            model: ModelSel::Model3,
            ..Default::default()
        };
        assert!(session
            .multi_model_config_set(TxChannel::Tx1, &model)
            .is_err());
        assert!(session
            .multi_model_config_get(TxChannel::Tx1, ModelSel::Model2)
            .is_err());
    }
}
