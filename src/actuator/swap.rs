//! LUT swap mode.
//!
//! In swap mode the actuator runs from an active bank while the firmware
//! rotates content in from a holding bank. Each logical LUT `n` is written
//! twice: to LUT `n` in the requested bank, then to LUT `n + 1` in the
//! holding bank (Bank3 for an 8-bit compander, Bank2 for 9-bit). The RAM
//! select is parked on LUT31 between and after the passes.

use super::lut::Lut;
use super::model::{CompanderSize, ExtDpdModel, LutBank};
use crate::channel::TxChannel;
use crate::config::SwapModeSource;
use crate::error::{DpdError, Result};
use crate::session::DpdSession;
use crate::transport::regmap::object;
use crate::transport::Transport;
use tracing::{debug, info};

/// Entries in a swap-mode LUT table.
pub const SWAP_LUT_ENTRIES: usize = 31;
/// Highest entry index written by the swap passes.
pub const SWAP_LUT_MAX_INDEX: usize = 29;

/// Per-LUT payloads for a swap-mode write. Unset or empty entries are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapModeLuts<'a> {
    entries: [Option<&'a [u8]>; SWAP_LUT_ENTRIES],
}

impl<'a> SwapModeLuts<'a> {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the payload for entry `index`.
    pub fn set(&mut self, index: usize, data: &'a [u8]) -> Result<()> {
        let slot = self.entries.get_mut(index).ok_or_else(|| {
            DpdError::invalid(
                "swapModeLutIndex",
                index,
                format!("must be < {SWAP_LUT_ENTRIES}"),
            )
        })?;
        *slot = Some(data);
        Ok(())
    }

    /// Builder form of [`SwapModeLuts::set`].
    pub fn with(mut self, index: usize, data: &'a [u8]) -> Result<Self> {
        self.set(index, data)?;
        Ok(self)
    }

    /// Payload for entry `index`, if populated.
    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        self.entries
            .get(index)
            .copied()
            .flatten()
            .filter(|data| !data.is_empty())
    }

    /// Populated entries written by the swap passes, highest index first.
    pub fn populated(&self) -> impl Iterator<Item = (usize, &'a [u8])> + '_ {
        (0..=SWAP_LUT_MAX_INDEX)
            .rev()
            .filter_map(move |index| self.get(index).map(|data| (index, data)))
    }
}

/// Check a swap-mode write against the channel's active model.
pub fn validate_swap_mode_luts(model: &ExtDpdModel, bank: LutBank, luts: &SwapModeLuts<'_>) -> Result<()> {
    let bank_ok = match model.compander {
        CompanderSize::Bits9 => bank == LutBank::Bank0,
        CompanderSize::Bits8 => bank != LutBank::Bank3,
    };
    if !bank_ok {
        return Err(DpdError::invalid(
            "lutBank",
            bank,
            format!(
                "not a valid active bank in swap mode with a {} compander",
                model.compander
            ),
        ));
    }

    if luts.get(SWAP_LUT_ENTRIES - 1).is_some() {
        return Err(DpdError::invalid(
            "swapModeLutIndex",
            SWAP_LUT_ENTRIES - 1,
            format!("swap mode writes entries 0..={SWAP_LUT_MAX_INDEX} only"),
        ));
    }

    let max = model.compander.max_swap_lut_bytes();
    for (index, data) in luts.populated() {
        if data.len() > max {
            return Err(DpdError::invalid(
                "swapModeLutSize",
                data.len(),
                format!(
                    "entry {index} exceeds {max} bytes for a {} compander",
                    model.compander
                ),
            ));
        }
    }
    Ok(())
}

impl<T: Transport> DpdSession<T> {
    /// Turn LUT swap mode on or off in the firmware and the session cache.
    pub fn enable_swap_mode(&mut self, enable: bool) -> Result<()> {
        self.transport
            .config_write(object::EXT_DPD_SWAP_MODE_EN, 0, &[u8::from(enable)])?;
        self.swap_mode_enabled = enable;
        info!(enable, "LUT swap mode set");
        Ok(())
    }

    /// Whether swap mode is on, read from the source selected by
    /// `lut.swap_mode_source`.
    pub fn swap_mode_enable_get(&mut self) -> Result<bool> {
        match self.settings.lut.swap_mode_source {
            SwapModeSource::Cache => Ok(self.swap_mode_enabled),
            SwapModeSource::Device => {
                let mut flag = [0u8; 1];
                self.transport
                    .config_read(object::EXT_DPD_SWAP_MODE_EN, 0, &mut flag)?;
                Ok(flag[0] != 0)
            }
        }
    }

    /// Write swap-mode LUTs for `channel`: active pass into `bank`, then the
    /// shifted swap pass into the holding bank.
    pub fn write_swap_mode_luts(
        &mut self,
        channel: TxChannel,
        bank: LutBank,
        luts: &SwapModeLuts<'_>,
    ) -> Result<()> {
        let model = self.actuator_model_get(channel)?;
        if self.range_check() {
            if !self.swap_mode_enable_get()? {
                return Err(DpdError::invalid(
                    "swapMode",
                    false,
                    "LUT swap mode must be enabled first",
                ));
            }
            validate_swap_mode_luts(&model, bank, luts)?;
        }
        let swap_bank = model.compander.swap_bank();

        let mut written = 0usize;
        for (index, data) in luts.populated() {
            self.write_lut(channel, Lut::new(index as u8)?, bank, data)?;
            written += 1;
        }
        self.ram_select_set(channel, Lut::SWAP_PARK)?;
        debug!(channel = %channel, bank = %bank, luts = written, "Swap mode active pass written");

        for (index, data) in luts.populated() {
            self.write_lut(channel, Lut::new(index as u8 + 1)?, swap_bank, data)?;
        }
        self.ram_select_set(channel, Lut::SWAP_PARK)?;

        info!(
            channel = %channel,
            bank = %bank,
            swap_bank = %swap_bank,
            luts = written,
            "Swap mode LUTs written, RAM select parked on LUT31"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::resolve_address;
    use crate::config::DriverSettings;
    use crate::transport::{SimDevice, SimEvent, SimOp};

    fn nine_bit() -> ExtDpdModel {
        ExtDpdModel {
            compander: CompanderSize::Bits9,
            ..Default::default()
        }
    }

    #[test]
    fn test_populated_order_skips_empty() {
        let a = [1u8; 4];
        let luts = SwapModeLuts::new()
            .with(0, &a)
            .unwrap()
            .with(3, &[])
            .unwrap()
            .with(12, &a)
            .unwrap();
        let indices: Vec<usize> = luts.populated().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![12, 0]);
        assert!(SwapModeLuts::new().with(31, &a).is_err());
    }

    #[test]
    fn test_size_limits_by_compander() {
        let big = vec![0u8; 1025];
        let luts = SwapModeLuts::new().with(2, &big).unwrap();
        assert!(validate_swap_mode_luts(&ExtDpdModel::default(), LutBank::Bank0, &luts).is_err());
        assert!(validate_swap_mode_luts(&nine_bit(), LutBank::Bank0, &luts).is_ok());

        let huge = vec![0u8; 2049];
        let luts = SwapModeLuts::new().with(2, &huge).unwrap();
        assert!(validate_swap_mode_luts(&nine_bit(), LutBank::Bank0, &luts).is_err());
    }

    #[test]
    fn test_bank_rules() {
        let luts = SwapModeLuts::new();
        assert!(validate_swap_mode_luts(&nine_bit(), LutBank::Bank2, &luts).is_err());
        assert!(validate_swap_mode_luts(&ExtDpdModel::default(), LutBank::Bank2, &luts).is_ok());
        assert!(validate_swap_mode_luts(&ExtDpdModel::default(), LutBank::Bank3, &luts).is_err());
    }

    #[test]
    fn test_entry_thirty_rejected() {
        let a = [0u8; 4];
        let luts = SwapModeLuts::new().with(30, &a).unwrap();
        assert!(validate_swap_mode_luts(&ExtDpdModel::default(), LutBank::Bank0, &luts).is_err());
    }

    #[test]
    fn test_cache_and_device_sources() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        session.enable_swap_mode(true).unwrap();
        assert_eq!(sim.config_object(object::EXT_DPD_SWAP_MODE_EN), vec![1]);
        assert!(session.swap_mode_enable_get().unwrap());
        assert_eq!(sim.op_count(SimOp::ConfigRead), 0);

        let mut settings = DriverSettings::default();
        settings.lut.swap_mode_source = SwapModeSource::Device;
        session.set_settings(settings);
        assert!(session.swap_mode_enable_get().unwrap());
        assert_eq!(sim.op_count(SimOp::ConfigRead), 1);
    }

    #[test]
    fn test_requires_swap_mode() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let a = [0u8; 4];
        let luts = SwapModeLuts::new().with(0, &a).unwrap();
        assert!(session
            .write_swap_mode_luts(TxChannel::Tx1, LutBank::Bank0, &luts)
            .unwrap_err()
            .is_invalid_parameter());
        assert_eq!(sim.op_count(SimOp::DmaWrite), 0);
    }

    #[test]
    fn test_nine_bit_writes_swap_pass_to_bank2() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        session.configure_model(TxChannel::Tx2, &nine_bit()).unwrap();
        session.enable_swap_mode(true).unwrap();

        let data = vec![0x5Au8; 2048];
        let luts = SwapModeLuts::new().with(4, &data).unwrap();
        session
            .write_swap_mode_luts(TxChannel::Tx2, LutBank::Bank0, &luts)
            .unwrap();

        let lut = |i| Lut::new(i).unwrap();
        let writes: Vec<u32> = sim
            .journal()
            .iter()
            .filter_map(|e| match e {
                SimEvent::DmaWrite {
                    addr,
                    auto_increment: true,
                    ..
                } => Some(*addr),
                _ => None,
            })
            .collect();
        assert_eq!(
            writes,
            vec![
                resolve_address(TxChannel::Tx2, lut(4), LutBank::Bank0),
                resolve_address(TxChannel::Tx2, lut(5), LutBank::Bank2),
            ]
        );
        assert_eq!(session.ram_select_get(TxChannel::Tx2).unwrap(), Lut::SWAP_PARK);
    }
}
