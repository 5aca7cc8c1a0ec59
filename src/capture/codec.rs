//! Byte layout of the EXT_DPD_CAPTURE object.
//!
//! The object is a single 58-byte little-endian record. The control, level
//! and threshold sub-records are also written on their own at fixed offsets,
//! so each has its own encoder and the full record is composed from them.
//!
//! ```text
//!  0      fifoDelay            36..40 extendedWindowUs   48 channel index
//!  1      interpolationIndex   40     isPeak             49 packed flags
//!  2..4   envelopeDecay        41     peakDecay          50 size code
//!  4..12  band01 threshold     42     peakInputSel       51 reserved
//! 12..20  band12 threshold     43     iir enable/bypass  52..56 captureDelay
//! 20..28  band23 threshold     44..48 peakWindowCount    56..58 alignDelay
//! 28..30  timeout  30 bandDir  31 bandSel  32..36 reserved
//! ```

use super::types::{
    BandDirection, CaptureConfig, CaptureCtrl, CaptureDetailedStatus, CaptureLevel,
    CapturePathDelay, CapturePwrThresh, CaptureSize, CaptureType, PeakConfig, PeakInputSel,
    PowerBand, PulseWidthRes, ThresholdBand, TxAltObsSel, TxObsSel,
};
use crate::channel::TxChannel;
use crate::error::{DeviceErrorCode, DpdError, Result};
use crate::gpio::GpioPin;

/// Full capture record length.
pub const CAPTURE_RECORD_LEN: usize = 58;
/// Offset of the control sub-record.
pub const CTRL_OFFSET: u16 = 0x24;
/// Control sub-record length.
pub const CTRL_LEN: usize = 22;
/// Offset of the level sub-record.
pub const LEVEL_OFFSET: u16 = 0x1C;
/// Level sub-record length.
pub const LEVEL_LEN: usize = 4;
/// Threshold sub-record length.
pub const THRESH_LEN: usize = 8;
/// Detailed status record length.
pub const DETAILED_STATUS_LEN: usize = 26;

/// Offset of a threshold sub-record.
pub fn thresh_offset(band: ThresholdBand) -> u16 {
    match band {
        ThresholdBand::Band01 => 0x04,
        ThresholdBand::Band12 => 0x0C,
        ThresholdBand::Band23 => 0x14,
    }
}

// Packed flag byte (record byte 49).
const FLAG_TYPE_BIT0: u8 = 1 << 0;
const FLAG_TX_OBS: u8 = 1 << 1;
const FLAG_TX_ALT_OBS: u8 = 1 << 2;
const FLAG_NOT_TDD: u8 = 1 << 3;
const FLAG_EXT_PEAK: u8 = 1 << 6;

// IIR byte (record byte 43).
const IIR_ENABLE: u8 = 1 << 0;
const IIR_BYPASS: u8 = 1 << 1;

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Pack capture type and observation selects into the flag byte.
pub fn pack_capture_flags(
    capture_type: CaptureType,
    tx_obs_sel: TxObsSel,
    tx_alt_obs_sel: TxAltObsSel,
) -> u8 {
    let mut flags = capture_type.raw() & FLAG_TYPE_BIT0;
    if tx_obs_sel == TxObsSel::PreActuator {
        flags |= FLAG_TX_OBS;
    }
    if tx_alt_obs_sel == TxAltObsSel::PreCfr {
        flags |= FLAG_TX_ALT_OBS;
    }
    if capture_type != CaptureType::TddTxOnSync {
        flags |= FLAG_NOT_TDD;
    }
    if capture_type == CaptureType::ExtendedPeakSearch {
        flags |= FLAG_EXT_PEAK;
    }
    flags
}

/// Observation selects from the flag byte.
pub fn unpack_obs_sel(flags: u8) -> (TxObsSel, TxAltObsSel) {
    let tx = if flags & FLAG_TX_OBS != 0 {
        TxObsSel::PreActuator
    } else {
        TxObsSel::PostActuator
    };
    let alt = if flags & FLAG_TX_ALT_OBS != 0 {
        TxAltObsSel::PreCfr
    } else {
        TxAltObsSel::Actuator
    };
    (tx, alt)
}

/// Capture type from the peak flag and the packed flag byte.
///
/// Precedence: extended-peak bit, then peak flag, then the TDD bit, then bit 0.
pub fn decode_capture_type(is_peak: u8, flags: u8) -> CaptureType {
    if flags & FLAG_EXT_PEAK != 0 {
        CaptureType::ExtendedPeakSearch
    } else if is_peak == 1 {
        CaptureType::PeakDetection
    } else if flags & FLAG_NOT_TDD == 0 {
        CaptureType::TddTxOnSync
    } else if flags & FLAG_TYPE_BIT0 != 0 {
        CaptureType::PowerLevel
    } else {
        CaptureType::Immediate
    }
}

/// Pack the IIR enable/bypass byte.
pub fn pack_iir(enable: bool, bypass: bool) -> u8 {
    let mut byte = 0;
    if enable {
        byte |= IIR_ENABLE;
    }
    if bypass {
        byte |= IIR_BYPASS;
    }
    byte
}

/// Unpack the IIR enable/bypass byte.
pub fn unpack_iir(byte: u8) -> (bool, bool) {
    (byte & IIR_ENABLE != 0, byte & IIR_BYPASS != 0)
}

/// Encode a threshold sub-record.
pub fn encode_pwr_thresh(thresh: &CapturePwrThresh) -> [u8; THRESH_LEN] {
    let l2h = thresh.low_to_high_pulse_width.to_le_bytes();
    let h2l = thresh.high_to_low_pulse_width.to_le_bytes();
    [
        thresh.low_to_high_limit,
        thresh.high_to_low_limit,
        thresh.pulse_width_res.raw(),
        0,
        l2h[0],
        l2h[1],
        h2l[0],
        h2l[1],
    ]
}

/// Decode a threshold sub-record.
pub fn decode_pwr_thresh(bytes: &[u8]) -> Result<CapturePwrThresh> {
    check_len(bytes, THRESH_LEN, "pwrThresh")?;
    Ok(CapturePwrThresh {
        low_to_high_limit: bytes[0],
        high_to_low_limit: bytes[1],
        pulse_width_res: PulseWidthRes::from_raw(bytes[2])?,
        low_to_high_pulse_width: le16(bytes, 4),
        high_to_low_pulse_width: le16(bytes, 6),
    })
}

/// Encode the level sub-record.
pub fn encode_level(level: &CaptureLevel) -> [u8; LEVEL_LEN] {
    let timeout = level.timeout.to_le_bytes();
    [timeout[0], timeout[1], level.band_dir.raw(), level.band_sel.raw()]
}

/// Decode the level sub-record.
pub fn decode_level(bytes: &[u8]) -> Result<CaptureLevel> {
    check_len(bytes, LEVEL_LEN, "captureLevel")?;
    Ok(CaptureLevel {
        timeout: le16(bytes, 0),
        band_dir: BandDirection::from_raw(bytes[2])?,
        band_sel: PowerBand::from_raw(bytes[3])?,
    })
}

/// Encode the control sub-record.
pub fn encode_ctrl(ctrl: &CaptureCtrl) -> [u8; CTRL_LEN] {
    let mut out = [0u8; CTRL_LEN];
    out[0..4].copy_from_slice(&ctrl.peak.extended_window_us.to_le_bytes());
    out[4] = u8::from(ctrl.capture_type.is_peak());
    out[5] = ctrl.peak.decay;
    out[6] = ctrl.peak.input_sel.raw();
    out[7] = pack_iir(ctrl.peak.iir_enable, ctrl.peak.iir_bypass);
    out[8..12].copy_from_slice(&ctrl.peak.window_count.to_le_bytes());
    out[12] = ctrl.channel.index() as u8;
    out[13] = pack_capture_flags(ctrl.capture_type, ctrl.tx_obs_sel, ctrl.tx_alt_obs_sel);
    out[14] = ctrl.size.code();
    out[16..20].copy_from_slice(&ctrl.capture_delay.to_le_bytes());
    out[20..22].copy_from_slice(&ctrl.align_delay.to_le_bytes());
    out
}

/// Decode the control sub-record.
pub fn decode_ctrl(bytes: &[u8]) -> Result<CaptureCtrl> {
    check_len(bytes, CTRL_LEN, "captureCtrl")?;
    let (iir_enable, iir_bypass) = unpack_iir(bytes[7]);
    let (tx_obs_sel, tx_alt_obs_sel) = unpack_obs_sel(bytes[13]);
    let size = CaptureSize::from_code(bytes[14])
        .ok_or_else(|| DpdError::invalid("captureSize", bytes[14], "unknown size code"))?;

    Ok(CaptureCtrl {
        channel: TxChannel::from_index(bytes[12])?,
        capture_type: decode_capture_type(bytes[4], bytes[13]),
        tx_obs_sel,
        tx_alt_obs_sel,
        size,
        peak: PeakConfig {
            decay: bytes[5],
            window_count: le32(bytes, 8),
            input_sel: PeakInputSel::from_raw(bytes[6])?,
            iir_enable,
            iir_bypass,
            extended_window_us: le32(bytes, 0),
        },
        align_delay: le16(bytes, 20),
        capture_delay: le32(bytes, 16),
    })
}

/// Encode the full capture record. Pins are not part of the record.
pub fn encode_config(config: &CaptureConfig) -> [u8; CAPTURE_RECORD_LEN] {
    let mut out = [0u8; CAPTURE_RECORD_LEN];
    out[0] = config.path_delay.fifo_delay;
    out[1] = config.path_delay.interpolation_index;
    out[2..4].copy_from_slice(&config.envelope_decay.to_le_bytes());
    for band in ThresholdBand::ALL {
        let at = usize::from(thresh_offset(band));
        out[at..at + THRESH_LEN].copy_from_slice(&encode_pwr_thresh(config.thresh(band)));
    }
    let level_at = usize::from(LEVEL_OFFSET);
    out[level_at..level_at + LEVEL_LEN].copy_from_slice(&encode_level(&config.level));
    let ctrl_at = usize::from(CTRL_OFFSET);
    out[ctrl_at..ctrl_at + CTRL_LEN].copy_from_slice(&encode_ctrl(&config.ctrl));
    out
}

/// Decode the full capture record, attaching the pins supplied by the caller.
pub fn decode_config(
    bytes: &[u8],
    trigger_pin: GpioPin,
    done_pin: GpioPin,
) -> Result<CaptureConfig> {
    check_len(bytes, CAPTURE_RECORD_LEN, "captureConfig")?;
    let mut pwr_thresh = [CapturePwrThresh::default(); 3];
    for band in ThresholdBand::ALL {
        let at = usize::from(thresh_offset(band));
        pwr_thresh[band.index()] = decode_pwr_thresh(&bytes[at..at + THRESH_LEN])?;
    }
    let level_at = usize::from(LEVEL_OFFSET);
    let ctrl_at = usize::from(CTRL_OFFSET);

    Ok(CaptureConfig {
        trigger_pin,
        done_pin,
        path_delay: CapturePathDelay {
            fifo_delay: bytes[0],
            interpolation_index: bytes[1],
        },
        ctrl: decode_ctrl(&bytes[ctrl_at..ctrl_at + CTRL_LEN])?,
        level: decode_level(&bytes[level_at..level_at + LEVEL_LEN])?,
        pwr_thresh,
        envelope_decay: le16(bytes, 2),
    })
}

/// Decode the detailed status record.
pub fn decode_detailed_status(bytes: &[u8]) -> Result<CaptureDetailedStatus> {
    check_len(bytes, DETAILED_STATUS_LEN, "detailedStatus")?;
    Ok(CaptureDetailedStatus {
        error_code: DeviceErrorCode::from_raw(le32(bytes, 0)),
        timeout: bytes[20],
        band_transition_count: bytes[21],
        power_band_status: bytes[22],
        capture_count: le16(bytes, 24),
    })
}

/// De-interleave 4-byte groups laid out as Q-low, Q-high, I-low, I-high.
///
/// Returns `(i, q)`; trailing bytes that do not form a full group are ignored.
pub fn decode_iq(bytes: &[u8]) -> (Vec<i16>, Vec<i16>) {
    let n = bytes.len() / 4;
    let mut i = Vec::with_capacity(n);
    let mut q = Vec::with_capacity(n);
    for group in bytes.chunks_exact(4) {
        q.push(i16::from_le_bytes([group[0], group[1]]));
        i.push(i16::from_le_bytes([group[2], group[3]]));
    }
    (i, q)
}

fn check_len(bytes: &[u8], expected: usize, field: &'static str) -> Result<()> {
    if bytes.len() < expected {
        return Err(DpdError::invalid(
            field,
            bytes.len(),
            format!("record needs {expected} bytes"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> CaptureConfig {
        CaptureConfig {
            trigger_pin: GpioPin::new(4).unwrap(),
            done_pin: GpioPin::new(17).unwrap(),
            path_delay: CapturePathDelay {
                fifo_delay: 0x21,
                interpolation_index: 9,
            },
            ctrl: CaptureCtrl {
                channel: TxChannel::Tx3,
                capture_type: CaptureType::PeakDetection,
                tx_obs_sel: TxObsSel::PreActuator,
                tx_alt_obs_sel: TxAltObsSel::PreCfr,
                size: CaptureSize::Samples512,
                peak: PeakConfig {
                    decay: 7,
                    window_count: 0x00AB_CDEF,
                    input_sel: PeakInputSel::Cfr,
                    iir_enable: true,
                    iir_bypass: false,
                    extended_window_us: 0,
                },
                align_delay: 8191,
                capture_delay: 0x0012_3456,
            },
            level: CaptureLevel {
                timeout: 0xBEEF,
                band_sel: PowerBand::Band2,
                band_dir: BandDirection::Descending,
            },
            pwr_thresh: [
                CapturePwrThresh {
                    low_to_high_limit: 10,
                    high_to_low_limit: 8,
                    pulse_width_res: PulseWidthRes::X256,
                    low_to_high_pulse_width: 4096,
                    high_to_low_pulse_width: 1,
                },
                CapturePwrThresh::default(),
                CapturePwrThresh {
                    low_to_high_limit: 200,
                    high_to_low_limit: 190,
                    pulse_width_res: PulseWidthRes::X16777216,
                    low_to_high_pulse_width: 300,
                    high_to_low_pulse_width: 400,
                },
            ],
            envelope_decay: 0x1234,
        }
    }

    #[test]
    fn test_record_offsets() {
        let bytes = encode_config(&sample_config());
        assert_eq!(bytes.len(), 58);
        assert_eq!(bytes[0], 0x21);
        assert_eq!(bytes[1], 9);
        assert_eq!(&bytes[2..4], &[0x34, 0x12]);
        // band01 threshold
        assert_eq!(&bytes[4..12], &[10, 8, 1, 0, 0x00, 0x10, 0x01, 0x00]);
        // band23 threshold
        assert_eq!(&bytes[20..24], &[200, 190, 3, 0]);
        assert_eq!(&bytes[28..30], &[0xEF, 0xBE]);
        assert_eq!(bytes[30], 3);
        assert_eq!(bytes[31], 2);
        assert_eq!(&bytes[32..36], &[0, 0, 0, 0]);
        assert_eq!(bytes[40], 1);
        assert_eq!(bytes[41], 7);
        assert_eq!(bytes[42], 1);
        assert_eq!(bytes[43], 0b01);
        assert_eq!(&bytes[44..48], &[0xEF, 0xCD, 0xAB, 0x00]);
        assert_eq!(bytes[48], 2);
        assert_eq!(bytes[49], FLAG_TX_OBS | FLAG_TX_ALT_OBS | FLAG_NOT_TDD);
        assert_eq!(bytes[50], 3);
        assert_eq!(bytes[51], 0);
        assert_eq!(&bytes[52..56], &[0x56, 0x34, 0x12, 0x00]);
        assert_eq!(&bytes[56..58], &[0xFF, 0x1F]);
    }

    #[test]
    fn test_config_round_trip() {
        let config = sample_config();
        let bytes = encode_config(&config);
        let decoded = decode_config(&bytes, config.trigger_pin, config.done_pin).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_each_capture_type_round_trips() {
        for capture_type in [
            CaptureType::Immediate,
            CaptureType::PowerLevel,
            CaptureType::PeakDetection,
            CaptureType::TddTxOnSync,
            CaptureType::ExtendedPeakSearch,
        ] {
            let ctrl = CaptureCtrl {
                capture_type,
                ..Default::default()
            };
            assert_eq!(decode_ctrl(&encode_ctrl(&ctrl)).unwrap(), ctrl);
        }
    }

    #[test]
    fn test_capture_type_decode_table() {
        // (byte40, byte49) literal pairs
        assert_eq!(decode_capture_type(0, 0x40), CaptureType::ExtendedPeakSearch);
        assert_eq!(decode_capture_type(1, 0x49), CaptureType::ExtendedPeakSearch);
        assert_eq!(decode_capture_type(0, 0x4F), CaptureType::ExtendedPeakSearch);
        assert_eq!(decode_capture_type(1, 0x08), CaptureType::PeakDetection);
        assert_eq!(decode_capture_type(1, 0x00), CaptureType::PeakDetection);
        assert_eq!(decode_capture_type(0, 0x00), CaptureType::TddTxOnSync);
        assert_eq!(decode_capture_type(0, 0x01), CaptureType::TddTxOnSync);
        assert_eq!(decode_capture_type(0, 0x09), CaptureType::PowerLevel);
        assert_eq!(decode_capture_type(0, 0x08), CaptureType::Immediate);
    }

    #[test]
    fn test_flag_helpers() {
        assert_eq!(
            pack_capture_flags(CaptureType::Immediate, TxObsSel::PostActuator, TxAltObsSel::Actuator),
            0x08
        );
        assert_eq!(
            pack_capture_flags(CaptureType::TddTxOnSync, TxObsSel::PostActuator, TxAltObsSel::Actuator),
            0x00
        );
        assert_eq!(
            pack_capture_flags(
                CaptureType::ExtendedPeakSearch,
                TxObsSel::PostActuator,
                TxAltObsSel::Actuator
            ),
            0x48
        );
        assert_eq!(pack_iir(true, true), 0x03);
        assert_eq!(unpack_iir(0x02), (false, true));
        assert_eq!(
            unpack_obs_sel(0x06),
            (TxObsSel::PreActuator, TxAltObsSel::PreCfr)
        );
    }

    #[test]
    fn test_decode_rejects_bad_channel() {
        let mut bytes = encode_ctrl(&CaptureCtrl::default());
        bytes[12] = 4;
        assert!(decode_ctrl(&bytes).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_decode_iq_q_first() {
        // Q = 0x0102, I = -2
        let bytes = [0x02, 0x01, 0xFE, 0xFF, 0x00, 0x80, 0xFF, 0x7F];
        let (i, q) = decode_iq(&bytes);
        assert_eq!(q, vec![0x0102, i16::MIN]);
        assert_eq!(i, vec![-2, i16::MAX]);
    }

    #[test]
    fn test_detailed_status_layout() {
        let mut record = [0u8; DETAILED_STATUS_LEN];
        record[0..4].copy_from_slice(&0x1403u32.to_le_bytes());
        record[20] = 1;
        record[21] = 5;
        record[22] = 2;
        record[24..26].copy_from_slice(&300u16.to_le_bytes());
        let status = decode_detailed_status(&record).unwrap();
        assert_eq!(status.error_code, DeviceErrorCode::CaptureError);
        assert_eq!(status.timeout, 1);
        assert_eq!(status.band_transition_count, 5);
        assert_eq!(status.power_band_status, 2);
        assert_eq!(status.capture_count, 300);
    }

    #[test]
    fn test_short_record_rejected() {
        assert!(decode_level(&[0, 0, 0]).is_err());
        assert!(decode_config(&[0u8; 57], GpioPin::INVALID, GpioPin::INVALID).is_err());
    }
}
