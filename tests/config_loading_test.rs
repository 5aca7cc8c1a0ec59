//! Loading driver settings from TOML files and the environment.

use adrv9025_dpd::config::{DriverSettings, SwapModeSource};
use adrv9025_dpd::{DpdSession, SimDevice, TxChannelMask};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_toml(contents: &str) -> anyhow::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
#[serial]
fn test_shipped_config_loads_and_validates() -> anyhow::Result<()> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/dpd.toml");
    let settings = DriverSettings::load_from(path)?;
    assert!(settings.validate().is_ok());
    assert_eq!(settings, DriverSettings::default());
    Ok(())
}

#[test]
#[serial]
fn test_file_overrides_defaults() -> anyhow::Result<()> {
    let file = write_toml(
        r#"
        log_level = "warn"

        [validation]
        range_check = false

        [lut]
        power_restore_on_write = true
        swap_mode_source = "device"

        [clock]
        poll_attempts = 5
        "#,
    )?;

    let settings = DriverSettings::load_from(file.path())?;
    assert_eq!(settings.log_level, "warn");
    assert!(!settings.validation.range_check);
    assert!(settings.lut.power_restore_on_write);
    assert_eq!(settings.lut.swap_mode_source, SwapModeSource::Device);
    assert_eq!(settings.clock.poll_attempts, 5);
    assert_eq!(settings.clock.poll_interval_ms, 1);
    assert_eq!(settings.mailbox.timeout_us, 1_000_000);
    Ok(())
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let settings = DriverSettings::load_from(dir.path().join("absent.toml"))?;
    assert_eq!(settings, DriverSettings::default());
    Ok(())
}

#[test]
#[serial]
fn test_environment_overrides_file() -> anyhow::Result<()> {
    let file = write_toml(
        r#"
        [mailbox]
        timeout_us = 500000
        "#,
    )?;

    std::env::set_var("ADRV_DPD_MAILBOX__TIMEOUT_US", "250000");
    std::env::set_var("ADRV_DPD_LOG_LEVEL", "debug");
    let result = DriverSettings::load_from(file.path());
    std::env::remove_var("ADRV_DPD_MAILBOX__TIMEOUT_US");
    std::env::remove_var("ADRV_DPD_LOG_LEVEL");

    let settings = result?;
    assert_eq!(settings.mailbox.timeout_us, 250_000);
    assert_eq!(settings.log_level, "debug");
    Ok(())
}

#[test]
#[serial]
fn test_malformed_value_is_an_error() -> anyhow::Result<()> {
    let file = write_toml(
        r#"
        [lut]
        swap_mode_source = "sometimes"
        "#,
    )?;
    assert!(DriverSettings::load_from(file.path()).is_err());
    Ok(())
}

#[test]
fn test_disabled_range_check_reaches_device() -> anyhow::Result<()> {
    let settings = DriverSettings::from_toml_str(
        r#"
        [validation]
        range_check = false
        initialized_tx_mask = 0x01
        "#,
    )?;
    let sim = SimDevice::new();
    let mut session = DpdSession::new(sim.clone(), settings);

    // Tx4 is outside the initialized mask, but checks are off
    session.actuator_enable_set(TxChannelMask::TX4, true)?;
    assert!(sim.actuator_enabled(adrv9025_dpd::TxChannel::Tx4));
    Ok(())
}
