//! Firmware identifiers and chip addresses consumed by the DPD layer.
//!
//! Per-channel addresses live in a single table indexed by
//! [`TxChannel::index`]; every per-channel accessor goes through
//! [`channel_regs`].

use crate::channel::TxChannel;

/// Co-processor command opcodes.
pub mod opcode {
    /// SET command
    pub const SET: u8 = 0x0A;
    /// GET command
    pub const GET: u8 = 0x0C;
}

/// Firmware object identifiers (first byte of the extended command data,
/// or the target of a config-object access).
pub mod object {
    /// Calibration status record
    pub const CAL_STATUS: u8 = 0x42;
    /// DPD initial/tracking calibration
    pub const DPD_INIT: u8 = 0x4A;
    /// Tracking calibration control
    pub const TRACKING_CAL_CTRL: u8 = 0x83;
    /// Actuator enable/disable
    pub const EXT_DPD_ENABLE_DISABLE: u8 = 0xC0;
    /// Actuator model select
    pub const EXT_DPD_MODEL_SELECT: u8 = 0xC1;
    /// Capture start trigger
    pub const EXT_DPD_CAPTURE_TRIG: u8 = 0xC2;
    /// Capture done flag
    pub const EXT_DPD_CAPTURE_DONE: u8 = 0xC3;
    /// Capture configuration object
    pub const EXT_DPD_CAPTURE: u8 = 0xC4;
    /// Actuator model object (48 bytes per channel)
    pub const EXT_DPD_MODEL: u8 = 0xC5;
    /// Gain monitor object (12 bytes per channel)
    pub const EXT_DPD_GAIN_MONITOR: u8 = 0xC6;
    /// LUT swap-mode enable flag (1 byte)
    pub const EXT_DPD_SWAP_MODE_EN: u8 = 0xC7;
    /// Multi-model object (96 bytes per channel)
    pub const EXT_DPD_MULTIMODEL: u8 = 0xC8;
}

/// Sub-commands carried in the fourth byte of a TRACKING_CAL_CTRL SET.
pub mod tracking_cmd {
    /// Read back the hard-clipper config
    pub const HARD_CLIPPER_GET: u8 = 0x00;
    /// Read the hard-clipper event counter
    pub const HARD_CLIPPER_COUNTER_GET: u8 = 0x01;
    /// Read the multi-model LUT update status
    pub const MULTIMODEL_UPDATE_STATUS: u8 = 0x04;
    /// Program the hard clipper
    pub const HARD_CLIPPER_SET: u8 = 0x10;
    /// Reset the hard-clipper event counter
    pub const HARD_CLIPPER_COUNTER_RESET: u8 = 0x11;
    /// Signal that capture data has been consumed
    pub const CAPTURE_READ_DONE: u8 = 0x12;
    /// Clear all actuator LUTs
    pub const LUT_CLEAR: u8 = 0x13;
    /// Promote multi-model LUTs from correlator memory
    pub const MULTIMODEL_UPDATE: u8 = 0x14;
}

/// Status-byte bits that flag a tracking-calibration command error.
pub const CMD_ERROR_MASK: u8 = 0x0E;
/// Status-byte bits that flag an error for the direct DPD commands.
pub const CMD_STATUS_UPPER_MASK: u8 = 0xFE;

/// Mailbox scratch area the host writes payloads to (and some GETs answer in).
pub const MAILBOX_SET: u32 = 0x2002_8000;
/// Mailbox scratch area GET responses are returned in.
pub const MAILBOX_GET: u32 = 0x2002_8100;

/// Tx capture buffer.
pub const TX_CAPTURE_ADDR: u32 = 0x6140_0000;
/// Tx alternate-observation capture buffer.
pub const ALT_TX_CAPTURE_ADDR: u32 = 0x6144_0000;
/// ORx capture buffer.
pub const ORX_CAPTURE_ADDR: u32 = 0x6148_0000;

/// Correlator memory used as the multi-model LUT staging area.
pub const CORR_MEM_BASE: u32 = 0x6202_0000;
/// Address stride between correlator memory rows.
pub const CORR_MEM_ROW_STRIDE: u32 = 1024;

/// Debug register written to arm a TDD Tx-on capture without the mailbox.
pub const TDD_CAPTURE_TRIGGER_REG: u16 = 0x00EE;
/// Tag OR-ed with the channel bit when arming a TDD capture.
pub const TDD_CAPTURE_TRIGGER_TAG: u8 = 0x10;

/// Scratch register selecting the channel for the actuator clock stream.
pub const ACT_CLK_CHANNEL_REG: u16 = 0x15B7;
/// Scratch register selecting the actuator clock stream action.
pub const ACT_CLK_STREAM_REG: u16 = 0x17B7;
/// Stream that applies the actuator clock request.
pub const ACT_CLK_STREAM_ID: u8 = 0x9C;
/// Stream action: enable the actuator clock.
pub const ACT_CLK_ENABLE: u8 = 0x02;
/// Stream action: disable the actuator clock.
pub const ACT_CLK_DISABLE: u8 = 0x01;

/// DPD_CFG bit: actuator enable.
pub const DPD_CFG_ENABLE: u32 = 1 << 0;
/// DPD_CFG bit: actuator passthru.
pub const DPD_CFG_PASSTHRU: u32 = 1 << 1;
/// DPD_CFG bit: Tx observation select.
pub const DPD_CFG_TX_OBS_SEL: u32 = 1 << 16;
/// DPD_CFG bit: Tx alternate observation select.
pub const DPD_CFG_TX_ALT_OBS_SEL: u32 = 1 << 21;
/// DPD_MOD RAM-select field.
pub const DPD_MOD_RAM_SEL_MASK: u32 = 0x1F;

/// Per-channel DPD register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRegs {
    /// Base of the channel's actuator LUT memory (32 LUTs x 4 banks x 1 KiB)
    pub lut_base: u32,
    /// Actuator configuration register
    pub dpd_cfg: u32,
    /// Actuator mode register (RAM select)
    pub dpd_mod: u32,
    /// LUT power-off register, one bit per LUT
    pub lut_off: u32,
    /// Actuator status register (active model in byte 1)
    pub act_stat: u32,
}

const CHANNEL_REGS: [ChannelRegs; 4] = [
    ChannelRegs {
        lut_base: 0x6180_0000,
        dpd_cfg: 0x4908_0000,
        dpd_mod: 0x4908_0004,
        lut_off: 0x4908_0010,
        act_stat: 0x4908_0020,
    },
    ChannelRegs {
        lut_base: 0x6190_0000,
        dpd_cfg: 0x4918_0000,
        dpd_mod: 0x4918_0004,
        lut_off: 0x4918_0010,
        act_stat: 0x4918_0020,
    },
    ChannelRegs {
        lut_base: 0x61A0_0000,
        dpd_cfg: 0x4928_0000,
        dpd_mod: 0x4928_0004,
        lut_off: 0x4928_0010,
        act_stat: 0x4928_0020,
    },
    ChannelRegs {
        lut_base: 0x61B0_0000,
        dpd_cfg: 0x4938_0000,
        dpd_mod: 0x4938_0004,
        lut_off: 0x4938_0010,
        act_stat: 0x4938_0020,
    },
];

/// Register block for a channel.
pub fn channel_regs(channel: TxChannel) -> &'static ChannelRegs {
    &CHANNEL_REGS[channel.index()]
}
