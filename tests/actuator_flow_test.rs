//! Actuator programming flows: swap mode, multi-model staging, protection.

use adrv9025_dpd::actuator::{
    resolve_address, CompanderSize, ExtDpdModel, Lut, LutBank, ModelSel, SwapModeLuts,
    MULTI_MODEL_LUTS,
};
use adrv9025_dpd::monitor::{GainMonitorConfig, HardClipperConfig};
use adrv9025_dpd::transport::regmap::{object, opcode, tracking_cmd, MAILBOX_SET};
use adrv9025_dpd::transport::{SimEvent, SimOp};
use adrv9025_dpd::{DpdSession, SimDevice, TxChannel, TxChannelMask};

fn lut(index: u8) -> Lut {
    Lut::new(index).unwrap()
}

fn lut_writes(sim: &SimDevice) -> Vec<(u32, usize)> {
    sim.journal()
        .into_iter()
        .filter_map(|event| match event {
            SimEvent::DmaWrite {
                addr,
                len,
                auto_increment: true,
            } => Some((addr, len)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_swap_mode_writes_active_then_shifted_pass() -> anyhow::Result<()> {
    let sim = SimDevice::new();
    let mut session = DpdSession::with_defaults(sim.clone());
    session.configure_model(TxChannel::Tx1, &ExtDpdModel::default())?;
    session.enable_swap_mode(true)?;

    let lut0 = vec![0x11u8; 512];
    let lut5 = vec![0x55u8; 1024];
    let luts = SwapModeLuts::new().with(0, &lut0)?.with(5, &lut5)?;
    session.write_swap_mode_luts(TxChannel::Tx1, LutBank::Bank0, &luts)?;

    let ch = TxChannel::Tx1;
    assert_eq!(
        lut_writes(&sim),
        vec![
            (resolve_address(ch, lut(5), LutBank::Bank0), 1024),
            (resolve_address(ch, lut(0), LutBank::Bank0), 512),
            (resolve_address(ch, lut(6), LutBank::Bank3), 1024),
            (resolve_address(ch, lut(1), LutBank::Bank3), 512),
        ]
    );
    assert_eq!(session.ram_select_get(ch)?, Lut::SWAP_PARK);
    assert_eq!(
        sim.memory(resolve_address(ch, lut(6), LutBank::Bank3), 4),
        vec![0x55; 4]
    );
    assert!(!sim.clock_enabled(ch), "clock gated off after the writes");
    Ok(())
}

#[test]
fn test_swap_mode_rejects_oversized_payload_before_io() -> anyhow::Result<()> {
    let sim = SimDevice::new();
    let mut session = DpdSession::with_defaults(sim.clone());
    session.enable_swap_mode(true)?;

    let big = vec![0u8; 1028];
    let luts = SwapModeLuts::new().with(3, &big)?;
    let err = session
        .write_swap_mode_luts(TxChannel::Tx2, LutBank::Bank1, &luts)
        .unwrap_err();
    assert!(err.is_invalid_parameter());
    assert_eq!(sim.op_count(SimOp::DmaWrite), 0);
    Ok(())
}

#[test]
fn test_multi_model_stage_and_promote() -> anyhow::Result<()> {
    let sim = SimDevice::new();
    let mut session = DpdSession::with_defaults(sim.clone());

    let model = ExtDpdModel {
        model: ModelSel::Model1,
        bank: LutBank::Bank1,
        compander: CompanderSize::Bits8,
        ..Default::default()
    };
    session.multi_model_config_set(TxChannel::Tx2, &model)?;
    assert_eq!(
        session.multi_model_config_get(TxChannel::Tx2, ModelSel::Model1)?,
        model
    );

    let payload: Vec<u8> = (0..1024).map(|n| (n % 200) as u8).collect();
    let mut luts: [Option<&[u8]>; MULTI_MODEL_LUTS] = [None; MULTI_MODEL_LUTS];
    luts[4] = Some(&payload);
    luts[25] = Some(&payload[..64]);
    session.write_multi_model_luts(&luts)?;

    session.multi_model_update(TxChannel::Tx2, ModelSel::Model1)?;
    let status = session.multi_model_update_status(TxChannel::Tx2)?;
    assert_eq!(status.update_status, 1);
    assert_eq!(status.bank, LutBank::Bank1);
    Ok(())
}

#[test]
fn test_multi_model_rejects_unaligned_lut() {
    let sim = SimDevice::new();
    let mut session = DpdSession::with_defaults(sim.clone());
    let payload = [0u8; 10];
    let mut luts: [Option<&[u8]>; MULTI_MODEL_LUTS] = [None; MULTI_MODEL_LUTS];
    luts[2] = Some(&payload);

    assert!(session
        .write_multi_model_luts(&luts)
        .unwrap_err()
        .is_invalid_parameter());
    assert_eq!(sim.op_count(SimOp::DmaWrite), 0);
}

#[test]
fn test_hard_clipper_mask_0101_issues_two_sequences() -> anyhow::Result<()> {
    let sim = SimDevice::new();
    let mut session = DpdSession::with_defaults(sim.clone());
    session.set_hard_clipper(&[HardClipperConfig {
        channel_mask: TxChannelMask::from_raw(0b0101)?,
        enable: true,
        threshold: 1.0,
    }])?;

    let set_commands: Vec<u8> = sim
        .journal()
        .into_iter()
        .filter_map(|event| match event {
            SimEvent::Command { opcode: op, ext_data }
                if op == opcode::SET
                    && ext_data.first() == Some(&object::TRACKING_CAL_CTRL)
                    && ext_data.get(3) == Some(&tracking_cmd::HARD_CLIPPER_SET) =>
            {
                ext_data.get(2).copied()
            }
            _ => None,
        })
        .collect();
    assert_eq!(set_commands, vec![0x01, 0x04]);
    assert_eq!(sim.op_count(SimOp::MemWrite), 2);
    assert!(sim.journal().contains(&SimEvent::MemWrite {
        addr: MAILBOX_SET,
        data: vec![1, 0x00, 0x80],
    }));
    assert_eq!(sim.hard_clipper_raw(TxChannel::Tx1), [1, 0x00, 0x80]);
    assert_eq!(sim.hard_clipper_raw(TxChannel::Tx3), [1, 0x00, 0x80]);
    Ok(())
}

#[test]
fn test_gain_monitor_round_trip_per_channel() -> anyhow::Result<()> {
    let sim = SimDevice::new();
    let mut session = DpdSession::with_defaults(sim);
    let enabled = GainMonitorConfig {
        channel_mask: TxChannelMask::TX1 | TxChannelMask::TX3,
        enable: true,
        qual_thresh: 500,
        lower_thresh: 20,
        upper_thresh: 90,
        lower_model: ModelSel::Model2,
        upper_model: ModelSel::Model1,
        iir_decay: 4,
    };
    let disabled = GainMonitorConfig {
        channel_mask: TxChannelMask::TX2,
        ..Default::default()
    };
    session.set_gain_monitor(&[enabled, disabled])?;

    let tx3 = session.gain_monitor_get(TxChannel::Tx3)?;
    assert_eq!(
        tx3,
        GainMonitorConfig {
            channel_mask: TxChannelMask::TX3,
            ..enabled
        }
    );
    assert!(!session.gain_monitor_get(TxChannel::Tx2)?.enable);
    Ok(())
}

#[test]
fn test_actuator_enable_and_model_select() -> anyhow::Result<()> {
    let sim = SimDevice::new();
    let mut session = DpdSession::with_defaults(sim.clone());

    session.actuator_enable_set(TxChannelMask::TX1 | TxChannelMask::TX2, true)?;
    session.model_select_set(TxChannelMask::TX2, ModelSel::Model1)?;

    assert!(session.actuator_enable_get(TxChannel::Tx2)?);
    assert_eq!(session.model_select_get(TxChannel::Tx2)?, ModelSel::Model1);
    assert_eq!(sim.model_select(TxChannel::Tx1), 0);

    session.lut_clear()?;
    assert_eq!(sim.lut_clear_count(), 1);
    Ok(())
}
