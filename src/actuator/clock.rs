//! Actuator clock gating through the stream processor.

use crate::channel::TxChannel;
use crate::error::{DpdError, Result};
use crate::session::DpdSession;
use crate::transport::regmap::{
    ACT_CLK_CHANNEL_REG, ACT_CLK_DISABLE, ACT_CLK_ENABLE, ACT_CLK_STREAM_ID, ACT_CLK_STREAM_REG,
};
use crate::transport::Transport;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

impl<T: Transport> DpdSession<T> {
    /// Gate the actuator clock of `channel` and wait for the status bit to follow.
    ///
    /// Polls `clock.poll_attempts` times, `clock.poll_interval_ms` apart.
    pub fn set_actuator_clock(&mut self, channel: TxChannel, enable: bool) -> Result<()> {
        let action = if enable {
            ACT_CLK_ENABLE
        } else {
            ACT_CLK_DISABLE
        };
        self.transport
            .spi_write_byte(ACT_CLK_CHANNEL_REG, channel.bit())?;
        self.transport.spi_write_byte(ACT_CLK_STREAM_REG, action)?;
        self.transport.stream_trigger(ACT_CLK_STREAM_ID)?;

        let attempts = self.settings.clock.poll_attempts;
        let interval_ms = self.settings.clock.poll_interval_ms;
        for attempt in 0..attempts {
            if self.transport.actuator_clock_enabled(channel)? == enable {
                debug!(channel = %channel, enable, attempt, "Actuator clock settled");
                return Ok(());
            }
            thread::sleep(Duration::from_millis(interval_ms));
        }

        warn!(channel = %channel, enable, attempts, "Actuator clock did not settle");
        Err(DpdError::Timeout {
            operation: "actuator clock",
            timeout_us: u64::from(attempts) * interval_ms * 1000,
        })
    }
}
