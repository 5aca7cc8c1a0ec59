//! Simulated ADRV9025 for tests and offline development.
//!
//! `SimDevice` models just enough firmware behaviour for the DPD layer:
//! mailbox commands and their responses, config objects, a sparse byte
//! memory behind the DMA and mailbox ports, the GPIO shared-resource table
//! and the actuator clock stream. Every transaction is appended to a journal
//! so tests can assert on exact command sequences.
//!
//! Clones share state, so a test can keep a handle while a
//! [`crate::DpdSession`] owns another.
//!
//! # Example
//! ```
//! use adrv9025_dpd::transport::{SimDevice, SimFault, SimOp};
//!
//! let sim = SimDevice::new();
//! sim.inject(SimFault::FailAfterN { op: SimOp::DmaWrite, count: 3 });
//! sim.set_auto_complete(true);
//! ```

use super::regmap::{self, object, opcode, tracking_cmd};
use super::{
    ArmGpioPin, ArmGpioSignal, GpioDirection, SharedFeature, Transport, TransportError,
    TransportResult,
};
use crate::channel::TxChannel;
use crate::gpio::{GpioPin, SourceControlGroup, GPIO_MAX};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

const NUM_PINS: usize = GPIO_MAX as usize + 1;

/// Transport operations that faults can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOp {
    /// `cmd_write`
    CmdWrite,
    /// `cmd_status_wait`
    CmdStatusWait,
    /// `config_write`
    ConfigWrite,
    /// `config_read`
    ConfigRead,
    /// `mem_write`
    MemWrite,
    /// `mem_read`
    MemRead,
    /// `dma_write`
    DmaWrite,
    /// `dma_read`
    DmaRead,
    /// `spi_write_byte`
    SpiWrite,
    /// `stream_trigger`
    StreamTrigger,
    /// `actuator_clock_enabled`
    ClockStatus,
    /// `gpio_source_control_get`
    SourceControlGet,
    /// `gpio_source_control_set`
    SourceControlSet,
    /// `gpio_direction_set`
    GpioDirection,
    /// `shared_resource_feature`
    ResourceFeature,
    /// `shared_resource_acquire`
    ResourceAcquire,
    /// `shared_resource_release`
    ResourceRelease,
    /// `stream_gpio_pin_set`
    StreamGpio,
    /// `arm_gpio_pin_set`
    ArmGpioSet,
    /// `arm_gpio_pin_get`
    ArmGpioGet,
}

/// Injected failure scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum SimFault {
    /// Let `count` calls of `op` succeed, then fail every later call with a bus error
    FailAfterN {
        /// Targeted operation
        op: SimOp,
        /// Successful calls before failing
        count: u32,
    },
    /// Every call of `op` times out
    Timeout {
        /// Targeted operation
        op: SimOp,
    },
    /// Every call of `op` reports that a reset is required
    ResetRequired {
        /// Targeted operation
        op: SimOp,
    },
    /// Commands for `object_id` are not executed and report `status`
    CommandStatus {
        /// First extended-data byte to match
        object_id: u8,
        /// Status byte returned by the wait
        status: u8,
    },
    /// The status wait for `object_id` returns a decoded device error
    DeviceError {
        /// First extended-data byte to match
        object_id: u8,
        /// Raw firmware error code
        code: u32,
    },
    /// The actuator clock never changes state
    ClockStuck,
}

/// Journal entry for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// Command written
    Command {
        /// Opcode
        opcode: u8,
        /// Extended data
        ext_data: Vec<u8>,
    },
    /// Config object written
    ConfigWrite {
        /// Object id
        object_id: u8,
        /// Byte offset
        offset: u16,
        /// Payload
        data: Vec<u8>,
    },
    /// Config object read
    ConfigRead {
        /// Object id
        object_id: u8,
        /// Byte offset
        offset: u16,
        /// Length
        len: usize,
    },
    /// Mailbox memory written
    MemWrite {
        /// Address
        addr: u32,
        /// Payload
        data: Vec<u8>,
    },
    /// Mailbox memory read
    MemRead {
        /// Address
        addr: u32,
        /// Length
        len: usize,
    },
    /// DMA write
    DmaWrite {
        /// Address
        addr: u32,
        /// Length
        len: usize,
        /// Auto-increment flag
        auto_increment: bool,
    },
    /// DMA read
    DmaRead {
        /// Address
        addr: u32,
        /// Length
        len: usize,
        /// Auto-increment flag
        auto_increment: bool,
    },
    /// SPI register write
    SpiWrite {
        /// Register address
        addr: u16,
        /// Value
        value: u8,
    },
    /// Stream triggered
    StreamTrigger {
        /// Stream id
        stream_id: u8,
    },
    /// Source-control nibble written
    SourceControlSet {
        /// Group
        group: SourceControlGroup,
        /// Value
        value: u8,
    },
    /// Pin direction set
    GpioDirection {
        /// Pin number
        pin: u8,
        /// Direction
        direction: GpioDirection,
    },
    /// Shared resource acquire attempted
    ResourceAcquire {
        /// Pin number
        pin: u8,
    },
    /// Shared resource release attempted
    ResourceRelease {
        /// Pin number
        pin: u8,
    },
    /// Stream GPIO routed
    StreamGpio {
        /// Stream signal id
        signal_id: u8,
        /// Raw pin value
        pin: u8,
    },
    /// ARM GPIO signal assigned
    ArmGpio {
        /// Signal
        signal: ArmGpioSignal,
        /// Assignment
        pin: ArmGpioPin,
    },
}

#[derive(Debug)]
struct SimState {
    memory: HashMap<u32, u8>,
    objects: HashMap<u8, Vec<u8>>,
    spi: HashMap<u16, u8>,
    last_status: u8,
    last_object: u8,
    clock: [bool; 4],
    capture_done: bool,
    auto_complete: bool,
    capture_triggers: u32,
    read_done_count: u32,
    lut_clear_count: u32,
    actuator_enabled: [bool; 4],
    model_select: [u8; 4],
    hard_clipper: [[u8; 3]; 4],
    clipper_counter: [u32; 4],
    multimodel_status: [[u8; 2]; 4],
    detailed_status: [[u8; 26]; 4],
    source_control: HashMap<SourceControlGroup, u8>,
    directions: [GpioDirection; NUM_PINS],
    features: [SharedFeature; NUM_PINS],
    stream_gpio: HashMap<u8, GpioPin>,
    arm_gpio: HashMap<ArmGpioSignal, ArmGpioPin>,
    faults: Vec<SimFault>,
    op_counts: HashMap<SimOp, u32>,
    journal: Vec<SimEvent>,
    rng: StdRng,
}

impl SimState {
    fn new(seed: u64) -> Self {
        Self {
            memory: HashMap::new(),
            objects: HashMap::new(),
            spi: HashMap::new(),
            last_status: 0,
            last_object: 0,
            clock: [false; 4],
            capture_done: false,
            auto_complete: false,
            capture_triggers: 0,
            read_done_count: 0,
            lut_clear_count: 0,
            actuator_enabled: [false; 4],
            model_select: [0; 4],
            hard_clipper: [[0; 3]; 4],
            clipper_counter: [0; 4],
            multimodel_status: [[0; 2]; 4],
            detailed_status: [[0; 26]; 4],
            source_control: HashMap::new(),
            directions: [GpioDirection::Input; NUM_PINS],
            features: [SharedFeature::Unused; NUM_PINS],
            stream_gpio: HashMap::new(),
            arm_gpio: HashMap::new(),
            faults: Vec::new(),
            op_counts: HashMap::new(),
            journal: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Apply any fault scenario for `op`. Counts every call.
    fn check(&mut self, op: SimOp, name: &'static str) -> TransportResult<()> {
        let calls = {
            let entry = self.op_counts.entry(op).or_insert(0);
            *entry += 1;
            *entry
        };
        for fault in &self.faults {
            match fault {
                SimFault::FailAfterN { op: target, count } if *target == op && calls > *count => {
                    return Err(TransportError::Bus {
                        message: format!("injected failure on {name} after {count} calls"),
                    });
                }
                SimFault::Timeout { op: target } if *target == op => {
                    return Err(TransportError::Timeout {
                        operation: name,
                        timeout_us: 0,
                    });
                }
                SimFault::ResetRequired { op: target } if *target == op => {
                    return Err(TransportError::ResetRequired {
                        reason: format!("injected reset on {name}"),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read_bytes(&self, addr: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                self.memory
                    .get(&addr.wrapping_add(i as u32))
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }

    fn write_bytes(&mut self, addr: u32, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.memory.insert(addr.wrapping_add(i as u32), *byte);
        }
    }

    fn channels_in(mask: u8) -> impl Iterator<Item = usize> {
        (0..4).filter(move |i| mask & (1 << i) != 0)
    }

    fn channel_index(bit: u8) -> Option<usize> {
        TxChannel::from_mask(bit).ok().map(TxChannel::index)
    }

    /// Firmware side of a command.
    fn execute(&mut self, op: u8, ext: &[u8]) {
        let obj = ext.first().copied().unwrap_or_default();
        match (op, obj) {
            (opcode::SET, object::EXT_DPD_CAPTURE_TRIG) => {
                self.capture_triggers += 1;
                if self.auto_complete {
                    self.capture_done = true;
                }
            }
            (opcode::SET, object::EXT_DPD_CAPTURE_DONE) => {
                if ext.get(1) == Some(&0) {
                    self.capture_done = false;
                }
            }
            (opcode::GET, object::EXT_DPD_CAPTURE_DONE) => {
                let flag = u8::from(self.capture_done);
                self.write_bytes(regmap::MAILBOX_GET, &[flag]);
            }
            (opcode::SET, object::EXT_DPD_ENABLE_DISABLE) => {
                let value = ext.get(1).copied().unwrap_or_default();
                for i in Self::channels_in(value & 0x0F) {
                    self.actuator_enabled[i] = value & 0x80 != 0;
                }
            }
            (opcode::GET, object::EXT_DPD_ENABLE_DISABLE) => {
                if let Some(i) = ext.get(1).copied().and_then(Self::channel_index) {
                    let flag = u8::from(self.actuator_enabled[i]);
                    self.write_bytes(regmap::MAILBOX_GET, &[flag]);
                }
            }
            (opcode::SET, object::EXT_DPD_MODEL_SELECT) => {
                let value = ext.get(1).copied().unwrap_or_default();
                for i in Self::channels_in(value & 0x0F) {
                    self.model_select[i] = value >> 4;
                }
            }
            (opcode::GET, object::EXT_DPD_MODEL_SELECT) => {
                if let Some(i) = ext.get(1).copied().and_then(Self::channel_index) {
                    let model = self.model_select[i];
                    self.write_bytes(regmap::MAILBOX_GET, &[model]);
                }
            }
            (opcode::GET, object::CAL_STATUS) => {
                if let Some(&idx) = ext.get(2) {
                    if let Some(status) = self.detailed_status.get(usize::from(idx)).copied() {
                        self.write_bytes(regmap::MAILBOX_GET, &status);
                    }
                }
            }
            (opcode::SET, object::TRACKING_CAL_CTRL) => self.tracking_command(ext),
            _ => trace!(opcode = op, object_id = obj, "Unhandled simulated command"),
        }
    }

    fn tracking_command(&mut self, ext: &[u8]) {
        let channel = ext.get(2).copied().unwrap_or_default();
        let sub = ext.get(3).copied().unwrap_or_default();
        match sub {
            tracking_cmd::HARD_CLIPPER_SET => {
                let data = self.read_bytes(regmap::MAILBOX_SET, 3);
                for i in Self::channels_in(channel) {
                    self.hard_clipper[i].copy_from_slice(&data);
                }
            }
            tracking_cmd::HARD_CLIPPER_GET => {
                if let Some(i) = Self::channel_index(channel) {
                    let data = self.hard_clipper[i];
                    self.write_bytes(regmap::MAILBOX_SET, &data);
                }
            }
            tracking_cmd::HARD_CLIPPER_COUNTER_RESET => {
                for i in Self::channels_in(channel) {
                    self.clipper_counter[i] = 0;
                }
            }
            tracking_cmd::HARD_CLIPPER_COUNTER_GET => {
                if let Some(i) = Self::channel_index(channel) {
                    let data = self.clipper_counter[i].to_le_bytes();
                    self.write_bytes(regmap::MAILBOX_SET, &data);
                }
            }
            tracking_cmd::CAPTURE_READ_DONE => self.read_done_count += 1,
            tracking_cmd::LUT_CLEAR => self.lut_clear_count += 1,
            tracking_cmd::MULTIMODEL_UPDATE => {
                let model = self.read_bytes(regmap::MAILBOX_SET, 1)[0];
                if let Some(i) = Self::channel_index(channel) {
                    self.multimodel_status[i] = [0x01, model];
                }
            }
            tracking_cmd::MULTIMODEL_UPDATE_STATUS => {
                if let Some(i) = Self::channel_index(channel) {
                    let data = self.multimodel_status[i];
                    self.write_bytes(regmap::MAILBOX_SET, &data);
                }
            }
            other => trace!(sub_command = other, "Unhandled tracking command"),
        }
    }
}

/// Simulated chip implementing [`Transport`].
#[derive(Debug, Clone)]
pub struct SimDevice {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SimDevice {
    /// Fresh device with a fixed RNG seed.
    pub fn new() -> Self {
        Self::with_seed(0x0D9D_9025)
    }

    /// Fresh device with a specific RNG seed for generated capture data.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(seed))),
        }
    }

    /// Add a fault scenario.
    pub fn inject(&self, fault: SimFault) {
        self.state.lock().faults.push(fault);
    }

    /// Remove all fault scenarios and reset operation counters.
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.faults.clear();
        state.op_counts.clear();
    }

    /// Transactions recorded so far.
    pub fn journal(&self) -> Vec<SimEvent> {
        self.state.lock().journal.clone()
    }

    /// Drop the recorded transactions.
    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn op_count(&self, op: SimOp) -> u32 {
        self.state.lock().op_counts.get(&op).copied().unwrap_or(0)
    }

    /// Make capture triggers complete immediately.
    pub fn set_auto_complete(&self, enabled: bool) {
        self.state.lock().auto_complete = enabled;
    }

    /// Force the firmware capture-done flag.
    pub fn set_capture_done(&self, done: bool) {
        self.state.lock().capture_done = done;
    }

    /// Current firmware capture-done flag.
    pub fn capture_done(&self) -> bool {
        self.state.lock().capture_done
    }

    /// Number of mailbox capture triggers received.
    pub fn capture_triggers(&self) -> u32 {
        self.state.lock().capture_triggers
    }

    /// Number of capture-read-done commands received.
    pub fn read_done_count(&self) -> u32 {
        self.state.lock().read_done_count
    }

    /// Number of LUT clear commands received.
    pub fn lut_clear_count(&self) -> u32 {
        self.state.lock().lut_clear_count
    }

    /// Read simulated memory.
    pub fn memory(&self, addr: u32, len: usize) -> Vec<u8> {
        self.state.lock().read_bytes(addr, len)
    }

    /// Write simulated memory without journaling.
    pub fn load_memory(&self, addr: u32, data: &[u8]) {
        self.state.lock().write_bytes(addr, data);
    }

    /// Load a capture buffer with (I, Q) samples in the chip's Q-first layout.
    pub fn load_capture(&self, addr: u32, samples: &[(i16, i16)]) {
        let bytes: Vec<u8> = samples
            .iter()
            .flat_map(|(i, q)| {
                let q = q.to_le_bytes();
                let i = i.to_le_bytes();
                [q[0], q[1], i[0], i[1]]
            })
            .collect();
        self.load_memory(addr, &bytes);
    }

    /// Fill all three capture buffers with pseudo-random samples.
    pub fn fill_capture_noise(&self, samples: usize) {
        let mut state = self.state.lock();
        for addr in [
            regmap::TX_CAPTURE_ADDR,
            regmap::ALT_TX_CAPTURE_ADDR,
            regmap::ORX_CAPTURE_ADDR,
        ] {
            let bytes: Vec<u8> = (0..samples * 4)
                .map(|_| state.rng.gen_range(0..=u8::MAX))
                .collect();
            state.write_bytes(addr, &bytes);
        }
    }

    /// Raw contents of a config object.
    pub fn config_object(&self, object_id: u8) -> Vec<u8> {
        self.state
            .lock()
            .objects
            .get(&object_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Last value written to an SPI register.
    pub fn spi_register(&self, addr: u16) -> Option<u8> {
        self.state.lock().spi.get(&addr).copied()
    }

    /// Actuator clock state for a channel.
    pub fn clock_enabled(&self, channel: TxChannel) -> bool {
        self.state.lock().clock[channel.index()]
    }

    /// Firmware actuator-enable state for a channel.
    pub fn actuator_enabled(&self, channel: TxChannel) -> bool {
        self.state.lock().actuator_enabled[channel.index()]
    }

    /// Firmware model select for a channel.
    pub fn model_select(&self, channel: TxChannel) -> u8 {
        self.state.lock().model_select[channel.index()]
    }

    /// Raw hard-clipper record held for a channel.
    pub fn hard_clipper_raw(&self, channel: TxChannel) -> [u8; 3] {
        self.state.lock().hard_clipper[channel.index()]
    }

    /// Set the hard-clipper event counter for a channel.
    pub fn set_clipper_counter(&self, channel: TxChannel, value: u32) {
        self.state.lock().clipper_counter[channel.index()] = value;
    }

    /// Set the 26-byte detailed status record for a channel.
    pub fn set_detailed_status(&self, channel: TxChannel, record: [u8; 26]) {
        self.state.lock().detailed_status[channel.index()] = record;
    }

    /// Tag a pin in the shared-resource table.
    pub fn claim_pin(&self, pin: GpioPin, feature: SharedFeature) {
        if let Some(n) = pin.number() {
            self.state.lock().features[usize::from(n)] = feature;
        }
    }

    /// Feature tagged on a pin.
    pub fn feature(&self, pin: GpioPin) -> SharedFeature {
        pin.number()
            .map(|n| self.state.lock().features[usize::from(n)])
            .unwrap_or_default()
    }

    /// Direction of a pin.
    pub fn direction(&self, pin: GpioPin) -> GpioDirection {
        pin.number()
            .map(|n| self.state.lock().directions[usize::from(n)])
            .unwrap_or_default()
    }

    /// Source-control nibble of a group.
    pub fn source_control(&self, group: SourceControlGroup) -> u8 {
        self.state
            .lock()
            .source_control
            .get(&group)
            .copied()
            .unwrap_or(0)
    }

    /// Preload a source-control nibble.
    pub fn set_source_control(&self, group: SourceControlGroup, value: u8) {
        self.state.lock().source_control.insert(group, value);
    }

    /// Pin routed to a stream signal.
    pub fn stream_gpio(&self, signal_id: u8) -> Option<GpioPin> {
        self.state.lock().stream_gpio.get(&signal_id).copied()
    }
}

impl Transport for SimDevice {
    fn cmd_write(&mut self, opcode: u8, ext_data: &[u8]) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::CmdWrite, "cmd_write")?;
        state.journal.push(SimEvent::Command {
            opcode,
            ext_data: ext_data.to_vec(),
        });

        let object_id = ext_data.first().copied().unwrap_or_default();
        state.last_object = object_id;
        let forced = state.faults.iter().find_map(|f| match f {
            SimFault::CommandStatus {
                object_id: target,
                status,
            } if *target == object_id => Some(*status),
            _ => None,
        });
        match forced {
            Some(status) => state.last_status = status,
            None => {
                state.last_status = 0;
                state.execute(opcode, ext_data);
            }
        }
        Ok(())
    }

    fn cmd_status_wait(
        &mut self,
        opcode: u8,
        _timeout_us: u64,
        _interval_us: u64,
    ) -> TransportResult<u8> {
        let mut state = self.state.lock();
        state.check(SimOp::CmdStatusWait, "cmd_status_wait")?;
        let object_id = state.last_object;
        let device_error = state.faults.iter().find_map(|f| match f {
            SimFault::DeviceError {
                object_id: target,
                code,
            } if *target == object_id => Some(*code),
            _ => None,
        });
        if let Some(code) = device_error {
            return Err(TransportError::Device {
                opcode,
                object_id,
                code,
            });
        }
        Ok(state.last_status)
    }

    fn config_write(&mut self, object_id: u8, offset: u16, data: &[u8]) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::ConfigWrite, "config_write")?;
        state.journal.push(SimEvent::ConfigWrite {
            object_id,
            offset,
            data: data.to_vec(),
        });
        let obj = state.objects.entry(object_id).or_default();
        let end = usize::from(offset) + data.len();
        if obj.len() < end {
            obj.resize(end, 0);
        }
        obj[usize::from(offset)..end].copy_from_slice(data);
        Ok(())
    }

    fn config_read(&mut self, object_id: u8, offset: u16, buf: &mut [u8]) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::ConfigRead, "config_read")?;
        state.journal.push(SimEvent::ConfigRead {
            object_id,
            offset,
            len: buf.len(),
        });
        let obj = state.objects.get(&object_id);
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = obj
                .and_then(|o| o.get(usize::from(offset) + i))
                .copied()
                .unwrap_or(0);
        }
        Ok(())
    }

    fn mem_write(&mut self, addr: u32, data: &[u8]) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::MemWrite, "mem_write")?;
        state.journal.push(SimEvent::MemWrite {
            addr,
            data: data.to_vec(),
        });
        state.write_bytes(addr, data);
        Ok(())
    }

    fn mem_read(&mut self, addr: u32, buf: &mut [u8]) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::MemRead, "mem_read")?;
        state.journal.push(SimEvent::MemRead {
            addr,
            len: buf.len(),
        });
        buf.copy_from_slice(&state.read_bytes(addr, buf.len()));
        Ok(())
    }

    fn dma_write(&mut self, addr: u32, data: &[u8], auto_increment: bool) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::DmaWrite, "dma_write")?;
        state.journal.push(SimEvent::DmaWrite {
            addr,
            len: data.len(),
            auto_increment,
        });
        state.write_bytes(addr, data);
        Ok(())
    }

    fn dma_read(&mut self, addr: u32, buf: &mut [u8], auto_increment: bool) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::DmaRead, "dma_read")?;
        state.journal.push(SimEvent::DmaRead {
            addr,
            len: buf.len(),
            auto_increment,
        });
        buf.copy_from_slice(&state.read_bytes(addr, buf.len()));
        Ok(())
    }

    fn spi_write_byte(&mut self, addr: u16, value: u8) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::SpiWrite, "spi_write_byte")?;
        state.journal.push(SimEvent::SpiWrite { addr, value });
        state.spi.insert(addr, value);
        Ok(())
    }

    fn stream_trigger(&mut self, stream_id: u8) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::StreamTrigger, "stream_trigger")?;
        state.journal.push(SimEvent::StreamTrigger { stream_id });
        if stream_id == regmap::ACT_CLK_STREAM_ID
            && !state.faults.contains(&SimFault::ClockStuck)
        {
            let mask = state
                .spi
                .get(&regmap::ACT_CLK_CHANNEL_REG)
                .copied()
                .unwrap_or(0);
            let action = state.spi.get(&regmap::ACT_CLK_STREAM_REG).copied();
            let enable = match action {
                Some(regmap::ACT_CLK_ENABLE) => Some(true),
                Some(regmap::ACT_CLK_DISABLE) => Some(false),
                _ => None,
            };
            if let Some(enable) = enable {
                for i in SimState::channels_in(mask) {
                    state.clock[i] = enable;
                }
            }
        }
        Ok(())
    }

    fn actuator_clock_enabled(&mut self, channel: TxChannel) -> TransportResult<bool> {
        let mut state = self.state.lock();
        state.check(SimOp::ClockStatus, "actuator_clock_enabled")?;
        Ok(state.clock[channel.index()])
    }

    fn gpio_source_control_get(&mut self, group: SourceControlGroup) -> TransportResult<u8> {
        let mut state = self.state.lock();
        state.check(SimOp::SourceControlGet, "gpio_source_control_get")?;
        Ok(state.source_control.get(&group).copied().unwrap_or(0))
    }

    fn gpio_source_control_set(
        &mut self,
        group: SourceControlGroup,
        value: u8,
    ) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::SourceControlSet, "gpio_source_control_set")?;
        state.journal.push(SimEvent::SourceControlSet { group, value });
        state.source_control.insert(group, value);
        Ok(())
    }

    fn gpio_direction_set(&mut self, pin: GpioPin, direction: GpioDirection) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::GpioDirection, "gpio_direction_set")?;
        state.journal.push(SimEvent::GpioDirection {
            pin: pin.raw(),
            direction,
        });
        if let Some(n) = pin.number() {
            state.directions[usize::from(n)] = direction;
        }
        Ok(())
    }

    fn shared_resource_feature(&mut self, pin: GpioPin) -> TransportResult<SharedFeature> {
        let mut state = self.state.lock();
        state.check(SimOp::ResourceFeature, "shared_resource_feature")?;
        Ok(pin
            .number()
            .map(|n| state.features[usize::from(n)])
            .unwrap_or_default())
    }

    fn shared_resource_acquire(
        &mut self,
        pin: GpioPin,
        feature: SharedFeature,
    ) -> TransportResult<bool> {
        let mut state = self.state.lock();
        state.check(SimOp::ResourceAcquire, "shared_resource_acquire")?;
        state.journal.push(SimEvent::ResourceAcquire { pin: pin.raw() });
        let Some(n) = pin.number() else {
            return Ok(false);
        };
        let slot = &mut state.features[usize::from(n)];
        if *slot == SharedFeature::Unused || *slot == feature {
            *slot = feature;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn shared_resource_release(
        &mut self,
        pin: GpioPin,
        feature: SharedFeature,
    ) -> TransportResult<bool> {
        let mut state = self.state.lock();
        state.check(SimOp::ResourceRelease, "shared_resource_release")?;
        state.journal.push(SimEvent::ResourceRelease { pin: pin.raw() });
        let Some(n) = pin.number() else {
            return Ok(false);
        };
        let slot = &mut state.features[usize::from(n)];
        if *slot == feature {
            *slot = SharedFeature::Unused;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn stream_gpio_pin_set(&mut self, signal_id: u8, pin: GpioPin) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::StreamGpio, "stream_gpio_pin_set")?;
        state.journal.push(SimEvent::StreamGpio {
            signal_id,
            pin: pin.raw(),
        });
        state.stream_gpio.insert(signal_id, pin);
        Ok(())
    }

    fn arm_gpio_pin_set(&mut self, signal: ArmGpioSignal, pin: ArmGpioPin) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.check(SimOp::ArmGpioSet, "arm_gpio_pin_set")?;
        state.journal.push(SimEvent::ArmGpio { signal, pin });
        state.arm_gpio.insert(signal, pin);
        Ok(())
    }

    fn arm_gpio_pin_get(&mut self, signal: ArmGpioSignal) -> TransportResult<ArmGpioPin> {
        let mut state = self.state.lock();
        state.check(SimOp::ArmGpioGet, "arm_gpio_pin_get")?;
        Ok(state.arm_gpio.get(&signal).copied().unwrap_or_default())
    }
}
