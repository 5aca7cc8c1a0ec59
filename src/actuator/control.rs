//! Actuator enable, passthru and model selection.

use super::model::ModelSel;
use crate::channel::{TxChannel, TxChannelMask};
use crate::error::{DpdError, Result};
use crate::gpio::GpioPin;
use crate::session::{Command, DpdSession};
use crate::transport::regmap::{channel_regs, object, CMD_ERROR_MASK, MAILBOX_GET};
use crate::transport::{ArmGpioPin, ArmGpioSignal, Transport};
use tracing::{debug, info};

const ACTUATOR_ENABLE_FLAG: u8 = 0x80;
const MODEL_SELECT_MASK: u8 = 0x03;
const ACTIVE_MODEL_SHIFT: u32 = 8;

impl<T: Transport> DpdSession<T> {
    /// Enable or disable the actuator on every channel in `mask`.
    ///
    /// Enabling is refused for channels outside `validation.initialized_tx_mask`.
    pub fn actuator_enable_set(&mut self, mask: TxChannelMask, enable: bool) -> Result<()> {
        if self.range_check() {
            if mask.is_empty() {
                return Err(DpdError::invalid(
                    "txChannelMask",
                    "0x00",
                    "at least one channel required",
                ));
            }
            let initialized = self.settings.validation.initialized_tx_mask;
            if enable && mask.bits() & !initialized != 0 {
                return Err(DpdError::invalid(
                    "txChannelMask",
                    format!("0x{:02X}", mask.bits()),
                    format!("channels outside the initialized mask 0x{initialized:02X}"),
                ));
            }
        }

        let flag = if enable { ACTUATOR_ENABLE_FLAG } else { 0 };
        self.execute(Command::set(
            "actuator enable",
            &[object::EXT_DPD_ENABLE_DISABLE, flag | mask.bits()],
        ))?;
        info!(mask = mask.bits(), enable, "Actuator enable set");
        Ok(())
    }

    /// Whether the firmware has the actuator of `channel` enabled.
    pub fn actuator_enable_get(&mut self, channel: TxChannel) -> Result<bool> {
        self.execute(Command::get(
            "actuator enable get",
            &[object::EXT_DPD_ENABLE_DISABLE, channel.bit()],
        ))?;
        let mut flag = [0u8; 1];
        self.transport.mem_read(MAILBOX_GET, &mut flag)?;
        Ok(flag[0] != 0)
    }

    /// Set the passthru bit on every channel in `mask`, keeping the enable bit.
    pub fn actuator_passthru_set(&mut self, mask: TxChannelMask, passthru: bool) -> Result<()> {
        if self.range_check() && mask.is_empty() {
            return Err(DpdError::invalid(
                "txChannelMask",
                "0x00",
                "at least one channel required",
            ));
        }
        for channel in mask.channels() {
            let (enabled, _) = self.actuator_en_passthru_get(channel)?;
            self.actuator_en_passthru_set(channel, enabled, passthru)?;
        }
        debug!(mask = mask.bits(), passthru, "Actuator passthru set");
        Ok(())
    }

    /// Whether the actuator of `channel` is in passthru.
    pub fn actuator_passthru_get(&mut self, channel: TxChannel) -> Result<bool> {
        let (_, passthru) = self.actuator_en_passthru_get(channel)?;
        Ok(passthru)
    }

    /// Select the active model on every channel in `mask`.
    pub fn model_select_set(&mut self, mask: TxChannelMask, model: ModelSel) -> Result<()> {
        if self.range_check() && mask.is_empty() {
            return Err(DpdError::invalid(
                "txChannelMask",
                "0x00",
                "at least one channel required",
            ));
        }
        self.execute(
            Command::set(
                "model select",
                &[object::EXT_DPD_MODEL_SELECT, (model.raw() << 4) | mask.bits()],
            )
            .with_error_mask(CMD_ERROR_MASK),
        )?;
        info!(mask = mask.bits(), model = %model, "Actuator model selected");
        Ok(())
    }

    /// Model the firmware has selected for `channel`.
    pub fn model_select_get(&mut self, channel: TxChannel) -> Result<ModelSel> {
        self.execute(Command::get(
            "model select get",
            &[object::EXT_DPD_MODEL_SELECT, channel.bit()],
        ))?;
        let mut value = [0u8; 1];
        self.transport.mem_read(MAILBOX_GET, &mut value)?;
        ModelSel::from_raw(value[0] & MODEL_SELECT_MASK)
    }

    /// Route the two model-select ARM GPIO signals. Pass [`GpioPin::INVALID`]
    /// to unassign a signal.
    pub fn model_sel_gpios_set(&mut self, pin0: GpioPin, pin1: GpioPin) -> Result<()> {
        if self.range_check() && pin0.is_valid() && pin0 == pin1 {
            return Err(DpdError::ResourceConflict {
                pin: pin0.raw(),
                message: "both model-select signals assigned to the same pin".to_string(),
            });
        }
        self.transport
            .arm_gpio_pin_set(ArmGpioSignal::ModelSel0, ArmGpioPin::for_pin(pin0))?;
        self.transport
            .arm_gpio_pin_set(ArmGpioSignal::ModelSel1, ArmGpioPin::for_pin(pin1))?;
        debug!(pin0 = %pin0, pin1 = %pin1, "Model-select GPIOs routed");
        Ok(())
    }

    /// Pins routed to the model-select signals.
    pub fn model_sel_gpios_get(&mut self) -> Result<(GpioPin, GpioPin)> {
        let pin0 = self.transport.arm_gpio_pin_get(ArmGpioSignal::ModelSel0)?;
        let pin1 = self.transport.arm_gpio_pin_get(ArmGpioSignal::ModelSel1)?;
        Ok((pin0.pin, pin1.pin))
    }

    /// Model the actuator of `channel` is running right now.
    pub fn active_model_status(&mut self, channel: TxChannel) -> Result<ModelSel> {
        let status = self.read_reg32(channel_regs(channel).act_stat)?;
        ModelSel::from_raw((status >> ACTIVE_MODEL_SHIFT) as u8 & MODEL_SELECT_MASK)
    }
}
