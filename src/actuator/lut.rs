//! Actuator LUT addressing and access.
//!
//! Each channel owns 32 LUTs of 4 KiB, split into four 1 KiB banks. The
//! actuator only exposes a LUT's memory while it is powered, the actuator is
//! enabled, its clock runs and the RAM select points at it, so every access
//! brackets the DMA transfer with that setup and a restore.

use super::model::LutBank;
use crate::capture::{TxAltObsSel, TxObsSel};
use crate::channel::TxChannel;
use crate::error::{DpdError, Result};
use crate::session::{Command, DpdSession};
use crate::transport::regmap::{
    channel_regs, object, tracking_cmd, DPD_CFG_ENABLE, DPD_CFG_PASSTHRU, DPD_CFG_TX_ALT_OBS_SEL,
    DPD_CFG_TX_OBS_SEL, DPD_MOD_RAM_SEL_MASK,
};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Bytes in one LUT.
pub const LUT_BYTES: usize = 4096;
/// Bytes in one LUT bank.
pub const LUT_BANK_BYTES: usize = 1024;
/// Highest LUT index.
pub const MAX_LUT: u8 = 31;

/// Actuator LUT index, 0..=31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Lut(u8);

impl Lut {
    /// LUT the RAM select is parked on in swap mode.
    pub const SWAP_PARK: Lut = Lut(MAX_LUT);

    /// LUT by index.
    pub fn new(index: u8) -> Result<Self> {
        if index <= MAX_LUT {
            Ok(Self(index))
        } else {
            Err(DpdError::invalid("lut", index, "must be LUT0..LUT31"))
        }
    }

    /// LUT index.
    pub fn index(self) -> u8 {
        self.0
    }

    fn power_bit(self) -> u32 {
        1 << self.0
    }
}

impl TryFrom<u8> for Lut {
    type Error = DpdError;

    fn try_from(index: u8) -> Result<Self> {
        Self::new(index)
    }
}

impl From<Lut> for u8 {
    fn from(lut: Lut) -> Self {
        lut.0
    }
}

impl fmt::Display for Lut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LUT{}", self.0)
    }
}

/// Chip address of a LUT bank.
pub fn resolve_address(channel: TxChannel, lut: Lut, bank: LutBank) -> u32 {
    channel_regs(channel).lut_base
        + u32::from(lut.index()) * LUT_BYTES as u32
        + bank.index() as u32 * LUT_BANK_BYTES as u32
}

/// Check that `len` bytes starting at `bank` stay inside one LUT.
pub fn validate_lut_access(bank: LutBank, len: usize) -> Result<()> {
    if len == 0 {
        return Err(DpdError::NullInput { field: "lutData" });
    }
    let end = bank.index() * LUT_BANK_BYTES + len;
    if end > LUT_BYTES {
        return Err(DpdError::invalid(
            "lutDataSize",
            len,
            format!("{bank} access would end at byte {end}, past the {LUT_BYTES}-byte LUT"),
        ));
    }
    Ok(())
}

/// Actuator state saved around a LUT access.
#[derive(Debug, Clone, Copy)]
struct SavedActuator {
    powered: bool,
    enabled: bool,
    passthru: bool,
    ram_select: Lut,
}

impl<T: Transport> DpdSession<T> {
    /// Whether `lut` of `channel` is powered.
    pub fn lut_power_get(&mut self, channel: TxChannel, lut: Lut) -> Result<bool> {
        let off = self.read_reg32(channel_regs(channel).lut_off)?;
        Ok(off & lut.power_bit() == 0)
    }

    /// Power `lut` of `channel` on or off.
    pub fn lut_power_set(&mut self, channel: TxChannel, lut: Lut, powered: bool) -> Result<()> {
        let value = if powered { 0 } else { lut.power_bit() };
        self.update_reg32(channel_regs(channel).lut_off, lut.power_bit(), value)
    }

    pub(crate) fn actuator_en_passthru_get(&mut self, channel: TxChannel) -> Result<(bool, bool)> {
        let cfg = self.read_reg32(channel_regs(channel).dpd_cfg)?;
        Ok((cfg & DPD_CFG_ENABLE != 0, cfg & DPD_CFG_PASSTHRU != 0))
    }

    pub(crate) fn actuator_en_passthru_set(
        &mut self,
        channel: TxChannel,
        enabled: bool,
        passthru: bool,
    ) -> Result<()> {
        let mut value = 0;
        if enabled {
            value |= DPD_CFG_ENABLE;
        }
        if passthru {
            value |= DPD_CFG_PASSTHRU;
        }
        self.update_reg32(
            channel_regs(channel).dpd_cfg,
            DPD_CFG_ENABLE | DPD_CFG_PASSTHRU,
            value,
        )
    }

    /// LUT the actuator RAM select currently points at.
    pub fn ram_select_get(&mut self, channel: TxChannel) -> Result<Lut> {
        let value = self.read_reg32(channel_regs(channel).dpd_mod)?;
        Ok(Lut((value & DPD_MOD_RAM_SEL_MASK) as u8))
    }

    /// Point the actuator RAM select at `lut`.
    pub fn ram_select_set(&mut self, channel: TxChannel, lut: Lut) -> Result<()> {
        self.update_reg32(
            channel_regs(channel).dpd_mod,
            DPD_MOD_RAM_SEL_MASK,
            u32::from(lut.index()),
        )
    }

    /// Tx observation point routed to the capture path.
    pub fn tx_obs_select_get(&mut self, channel: TxChannel) -> Result<TxObsSel> {
        let cfg = self.read_reg32(channel_regs(channel).dpd_cfg)?;
        Ok(if cfg & DPD_CFG_TX_OBS_SEL != 0 {
            TxObsSel::PreActuator
        } else {
            TxObsSel::PostActuator
        })
    }

    /// Route a Tx observation point to the capture path.
    pub fn tx_obs_select_set(&mut self, channel: TxChannel, sel: TxObsSel) -> Result<()> {
        let value = match sel {
            TxObsSel::PreActuator => DPD_CFG_TX_OBS_SEL,
            TxObsSel::PostActuator => 0,
        };
        self.update_reg32(channel_regs(channel).dpd_cfg, DPD_CFG_TX_OBS_SEL, value)
    }

    /// Tx alternate observation point routed to the capture path.
    pub fn tx_alt_obs_select_get(&mut self, channel: TxChannel) -> Result<TxAltObsSel> {
        let cfg = self.read_reg32(channel_regs(channel).dpd_cfg)?;
        Ok(if cfg & DPD_CFG_TX_ALT_OBS_SEL != 0 {
            TxAltObsSel::PreCfr
        } else {
            TxAltObsSel::Actuator
        })
    }

    /// Route a Tx alternate observation point to the capture path.
    pub fn tx_alt_obs_select_set(&mut self, channel: TxChannel, sel: TxAltObsSel) -> Result<()> {
        let value = match sel {
            TxAltObsSel::PreCfr => DPD_CFG_TX_ALT_OBS_SEL,
            TxAltObsSel::Actuator => 0,
        };
        self.update_reg32(channel_regs(channel).dpd_cfg, DPD_CFG_TX_ALT_OBS_SEL, value)
    }

    /// Save the actuator state, then expose `lut` for DMA access.
    fn open_lut(&mut self, channel: TxChannel, lut: Lut) -> Result<SavedActuator> {
        let powered = self.lut_power_get(channel, lut)?;
        self.lut_power_set(channel, lut, true)?;

        let (enabled, passthru) = self.actuator_en_passthru_get(channel)?;
        self.actuator_en_passthru_set(channel, true, passthru)?;
        self.set_actuator_clock(channel, true)?;

        let ram_select = self.ram_select_get(channel)?;
        self.ram_select_set(channel, lut)?;

        Ok(SavedActuator {
            powered,
            enabled,
            passthru,
            ram_select,
        })
    }

    /// Program `data` into `lut` of `channel`, starting at `bank`.
    ///
    /// The actuator enable and passthru bits are restored afterwards. The RAM
    /// select is restored unless swap mode is on, in which case it is left on
    /// `lut`. The LUT's previous power state is only restored when
    /// `lut.power_restore_on_write` is set.
    pub fn write_lut(&mut self, channel: TxChannel, lut: Lut, bank: LutBank, data: &[u8]) -> Result<()> {
        if self.range_check() {
            validate_lut_access(bank, data.len())?;
        }
        let saved = self.open_lut(channel, lut)?;

        let addr = resolve_address(channel, lut, bank);
        self.transport.dma_write(addr, data, true)?;

        self.actuator_en_passthru_set(channel, saved.enabled, saved.passthru)?;
        if self.settings.lut.power_restore_on_write {
            self.lut_power_set(channel, lut, saved.powered)?;
        }
        if !self.swap_mode_enable_get()? {
            self.ram_select_set(channel, saved.ram_select)?;
        }
        self.set_actuator_clock(channel, false)?;

        debug!(channel = %channel, lut = %lut, bank = %bank, bytes = data.len(), "LUT written");
        Ok(())
    }

    /// Read `buf.len()` bytes of `lut` of `channel`, starting at `bank`.
    /// Every piece of actuator state touched is restored, including power.
    pub fn read_lut(&mut self, channel: TxChannel, lut: Lut, bank: LutBank, buf: &mut [u8]) -> Result<()> {
        if self.range_check() {
            validate_lut_access(bank, buf.len())?;
        }
        let saved = self.open_lut(channel, lut)?;

        let addr = resolve_address(channel, lut, bank);
        self.transport.dma_read(addr, buf, true)?;

        self.lut_power_set(channel, lut, saved.powered)?;
        self.actuator_en_passthru_set(channel, saved.enabled, saved.passthru)?;
        self.ram_select_set(channel, saved.ram_select)?;
        self.set_actuator_clock(channel, false)?;

        debug!(channel = %channel, lut = %lut, bank = %bank, bytes = buf.len(), "LUT read");
        Ok(())
    }

    /// Clear every actuator LUT on every channel.
    pub fn lut_clear(&mut self) -> Result<()> {
        self.execute(
            Command::tracking(
                "lut clear",
                &[
                    object::TRACKING_CAL_CTRL,
                    object::DPD_INIT,
                    1,
                    tracking_cmd::LUT_CLEAR,
                ],
            )
            .long_running(),
        )?;
        info!("Actuator LUTs cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverSettings;
    use crate::transport::{SimDevice, SimEvent, SimOp};

    fn lut(index: u8) -> Lut {
        Lut::new(index).unwrap()
    }

    #[test]
    fn test_resolve_address_formula() {
        for channel in TxChannel::ALL {
            let base = channel_regs(channel).lut_base;
            for index in [0u8, 1, 17, 31] {
                for bank in LutBank::ALL {
                    assert_eq!(
                        resolve_address(channel, lut(index), bank),
                        base + u32::from(index) * 4096 + bank.index() as u32 * 1024
                    );
                }
            }
        }
    }

    #[test]
    fn test_lut_index_bounds() {
        assert!(Lut::new(31).is_ok());
        assert!(Lut::new(32).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_access_must_fit_the_lut() {
        assert!(validate_lut_access(LutBank::Bank0, 4096).is_ok());
        assert!(validate_lut_access(LutBank::Bank2, 2048).is_ok());
        assert!(validate_lut_access(LutBank::Bank3, 1025).is_err());
        assert!(matches!(
            validate_lut_access(LutBank::Bank0, 0),
            Err(DpdError::NullInput { .. })
        ));
    }

    #[test]
    fn test_write_lut_restores_state() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let regs = channel_regs(TxChannel::Tx2);
        // LUT7 powered off, passthru set, RAM select on LUT3
        session.write_reg32(regs.lut_off, 1 << 7).unwrap();
        session.write_reg32(regs.dpd_cfg, DPD_CFG_PASSTHRU).unwrap();
        session.write_reg32(regs.dpd_mod, 3).unwrap();

        let data: Vec<u8> = (0..=255).collect();
        session
            .write_lut(TxChannel::Tx2, lut(7), LutBank::Bank1, &data)
            .unwrap();

        let addr = resolve_address(TxChannel::Tx2, lut(7), LutBank::Bank1);
        assert_eq!(sim.memory(addr, 256), data);
        assert_eq!(session.read_reg32(regs.dpd_cfg).unwrap(), DPD_CFG_PASSTHRU);
        assert_eq!(session.ram_select_get(TxChannel::Tx2).unwrap(), lut(3));
        assert!(!sim.clock_enabled(TxChannel::Tx2));
        // power left on by default
        assert!(session.lut_power_get(TxChannel::Tx2, lut(7)).unwrap());
        assert!(sim.journal().contains(&SimEvent::DmaWrite {
            addr,
            len: 256,
            auto_increment: true,
        }));
    }

    #[test]
    fn test_write_lut_power_restore_policy() {
        let sim = SimDevice::new();
        let mut settings = DriverSettings::default();
        settings.lut.power_restore_on_write = true;
        let mut session = DpdSession::new(sim, settings);
        session.lut_power_set(TxChannel::Tx1, lut(4), false).unwrap();

        session
            .write_lut(TxChannel::Tx1, lut(4), LutBank::Bank0, &[1, 2, 3, 4])
            .unwrap();
        assert!(!session.lut_power_get(TxChannel::Tx1, lut(4)).unwrap());
    }

    #[test]
    fn test_read_lut_restores_power() {
        let sim = SimDevice::new();
        let addr = resolve_address(TxChannel::Tx3, lut(30), LutBank::Bank2);
        sim.load_memory(addr, &[9, 8, 7, 6]);
        let mut session = DpdSession::with_defaults(sim.clone());
        session.lut_power_set(TxChannel::Tx3, lut(30), false).unwrap();

        let mut buf = [0u8; 4];
        session
            .read_lut(TxChannel::Tx3, lut(30), LutBank::Bank2, &mut buf)
            .unwrap();
        assert_eq!(buf, [9, 8, 7, 6]);
        assert!(!session.lut_power_get(TxChannel::Tx3, lut(30)).unwrap());
        assert!(!sim.clock_enabled(TxChannel::Tx3));
    }

    #[test]
    fn test_oversized_write_rejected_before_hardware() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        let data = vec![0u8; 2048];
        assert!(session
            .write_lut(TxChannel::Tx1, lut(0), LutBank::Bank3, &data)
            .is_err());
        assert_eq!(sim.op_count(SimOp::DmaRead), 0);
        assert_eq!(sim.op_count(SimOp::DmaWrite), 0);
    }

    #[test]
    fn test_obs_select_bits() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim);
        session
            .tx_obs_select_set(TxChannel::Tx4, TxObsSel::PreActuator)
            .unwrap();
        session
            .tx_alt_obs_select_set(TxChannel::Tx4, TxAltObsSel::PreCfr)
            .unwrap();
        let cfg = session
            .read_reg32(channel_regs(TxChannel::Tx4).dpd_cfg)
            .unwrap();
        assert_eq!(cfg, DPD_CFG_TX_OBS_SEL | DPD_CFG_TX_ALT_OBS_SEL);
        assert_eq!(
            session.tx_obs_select_get(TxChannel::Tx4).unwrap(),
            TxObsSel::PreActuator
        );

        session
            .tx_alt_obs_select_set(TxChannel::Tx4, TxAltObsSel::Actuator)
            .unwrap();
        assert_eq!(
            session.tx_alt_obs_select_get(TxChannel::Tx4).unwrap(),
            TxAltObsSel::Actuator
        );
    }

    #[test]
    fn test_lut_clear_command() {
        let sim = SimDevice::new();
        let mut session = DpdSession::with_defaults(sim.clone());
        session.lut_clear().unwrap();
        assert_eq!(sim.lut_clear_count(), 1);
        assert_eq!(sim.op_count(SimOp::MemWrite), 0);
    }
}
