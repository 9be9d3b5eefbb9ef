//! progmem-dummy - In-memory FTFC emulator for testing
//!
//! This crate provides a [`HardwarePort`] that emulates the FTFC flash
//! controller, its command register block and the memory-mapped flash array.
//! It's useful for testing drivers without real hardware: completion can be
//! delayed or stalled forever, and status faults can be injected per command.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::collections::VecDeque;
#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use progmem_core::command::decode_address;
use progmem_core::regs::{self, *};
use progmem_core::{FlashGeometry, HardwarePort, Opcode};

/// Configuration for the dummy controller
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Geometry of the emulated region
    pub geometry: FlashGeometry,
    /// FSTAT reads that report busy after each launch
    pub busy_polls: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            geometry: FlashGeometry::S32K1XX_DFLASH,
            busy_polls: 2,
        }
    }
}

/// A command the emulator accepted and executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    /// Raw FCCOB0 value
    pub opcode: u8,
    /// FCCOB1..FCCOB3 decoded as an address
    pub address: u32,
    /// Snapshot of the whole command register block at launch
    pub fccob: [u8; FCCOB_COUNT],
    /// FSTAT error bits the command produced
    pub status: u8,
}

impl ExecutedCommand {
    /// Decoded opcode, if known
    pub fn op(&self) -> Option<Opcode> {
        Opcode::from_code(self.opcode)
    }

    /// `N` bytes of the register block starting at register offset `offset`
    ///
    /// Unlike `fccob`, this is in bus address order, the order flash data
    /// is loaded in.
    pub fn registers<const N: usize>(&self, offset: u32) -> [u8; N] {
        core::array::from_fn(|j| fccob_at(&self.fccob, offset + j as u32))
    }
}

/// FCCOB byte at a register offset from the FTFC base, 0 outside the block
fn fccob_at(fccob: &[u8; FCCOB_COUNT], offset: u32) -> u8 {
    regs::fccob_index(offset).map_or(0, |index| fccob[index])
}

/// Dummy FTFC controller
///
/// Emulates the controller registers at [`FTFC_BASE`], the cache-control
/// register in the MSCM and the flash array at the geometry's base address.
#[cfg(feature = "alloc")]
pub struct DummyFtfc {
    config: DummyConfig,
    data: Vec<u8>,
    fstat: u8,
    fccob: [u8; FCCOB_COUNT],
    busy_remaining: u32,
    stalled: bool,
    stall_next_launch: bool,
    faults: VecDeque<(Option<Opcode>, u8)>,
    protected_blocks: Vec<u32>,
    partition: Option<[u8; 5]>,
    dflash_cache_control: Option<u32>,
    history: Vec<ExecutedCommand>,
    register_writes: usize,
    fstat_reads: usize,
    delay_total_us: u64,
}

#[cfg(feature = "alloc")]
impl DummyFtfc {
    /// Create a new dummy controller with erased flash
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.geometry.total_size() as usize];
        Self {
            config,
            data,
            fstat: FSTAT_CCIF,
            fccob: [0; FCCOB_COUNT],
            busy_remaining: 0,
            stalled: false,
            stall_next_launch: false,
            faults: VecDeque::new(),
            protected_blocks: Vec::new(),
            partition: None,
            dflash_cache_control: None,
            history: Vec::new(),
            register_writes: 0,
            fstat_reads: 0,
            delay_total_us: 0,
        }
    }

    /// Create a new dummy controller with the S32K1xx data flash geometry
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy controller with pre-filled flash contents
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut ftfc = Self::new(config);
        let len = core::cmp::min(initial_data.len(), ftfc.data.len());
        ftfc.data[..len].copy_from_slice(&initial_data[..len]);
        ftfc
    }

    /// Get a reference to the flash contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Commands executed so far, oldest first
    pub fn history(&self) -> &[ExecutedCommand] {
        &self.history
    }

    /// Number of register writes seen
    pub fn register_writes(&self) -> usize {
        self.register_writes
    }

    /// Number of FSTAT reads seen
    pub fn fstat_reads(&self) -> usize {
        self.fstat_reads
    }

    /// Total time requested through `delay_us`
    pub fn delay_total_us(&self) -> u64 {
        self.delay_total_us
    }

    /// Last value written to the data flash cache-control register
    pub fn dflash_cache_control(&self) -> Option<u32> {
        self.dflash_cache_control
    }

    /// FCCOB1..FCCOB5 of the accepted partition command
    pub fn partition(&self) -> Option<[u8; 5]> {
        self.partition
    }

    /// Mark an erase block as protected; erase and program report FPVIOL
    pub fn protect_block(&mut self, block: u32) {
        self.protected_blocks.push(block);
    }

    /// Make the next matching command fail with `status_bits` without executing
    ///
    /// `None` matches any opcode. Faults are consumed in the order queued.
    pub fn fail_next(&mut self, opcode: Option<Opcode>, status_bits: u8) {
        self.faults.push_back((opcode, status_bits & !FSTAT_CCIF));
    }

    /// Never reassert CCIF after the next launch
    pub fn stall_next_command(&mut self) {
        self.stall_next_launch = true;
    }

    /// Drop CCIF now and never reassert it
    pub fn stall_now(&mut self) {
        self.fstat &= !FSTAT_CCIF;
        self.stalled = true;
    }

    /// Controller-side address to array offset, if inside the region
    fn array_offset(&self, controller_addr: u32, len: usize) -> Option<usize> {
        let g = &self.config.geometry;
        let offset = controller_addr.checked_sub(g.data_flash_offset)? as usize;
        if offset + len > self.data.len() {
            return None;
        }
        Some(offset)
    }

    fn is_protected(&self, offset: usize) -> bool {
        let block = offset as u32 / self.config.geometry.block_size;
        self.protected_blocks.contains(&block)
    }

    fn launch(&mut self) {
        let opcode = self.fccob[FCCOB0];
        let address = decode_address([self.fccob[FCCOB1], self.fccob[FCCOB2], self.fccob[FCCOB3]]);

        let fault = self
            .faults
            .iter()
            .position(|(op, _)| op.map_or(true, |op| op.code() == opcode));
        let injected = fault.and_then(|i| self.faults.remove(i));
        let status = match injected {
            Some((_, bits)) => bits,
            None => self.execute(opcode, address),
        };

        log::trace!(
            "dummy ftfc: opcode {:#04x} addr {:#08x} -> status {:#04x}",
            opcode,
            address,
            status
        );

        self.history.push(ExecutedCommand {
            opcode,
            address,
            fccob: self.fccob,
            status,
        });

        self.fstat = (self.fstat & FSTAT_CLEARABLE) | status;
        if self.stall_next_launch {
            self.stall_next_launch = false;
            self.stalled = true;
        } else if self.config.busy_polls == 0 {
            self.fstat |= FSTAT_CCIF;
        } else {
            self.busy_remaining = self.config.busy_polls;
        }
    }

    fn execute(&mut self, opcode: u8, address: u32) -> u8 {
        match Opcode::from_code(opcode) {
            Some(Opcode::EraseSector) => self.erase_sector(address),
            Some(Opcode::ProgramPhrase) => self.program_phrase(address),
            Some(Opcode::VerifySection) => self.verify_section(address),
            Some(Opcode::ProgramCheck) => self.program_check(address),
            Some(Opcode::ProgramPartition) => self.program_partition(),
            None => FSTAT_ACCERR,
        }
    }

    fn erase_sector(&mut self, address: u32) -> u8 {
        let size = self.config.geometry.block_size as usize;
        let Some(offset) = self.array_offset(address, size) else {
            return FSTAT_ACCERR;
        };
        if offset % size != 0 {
            return FSTAT_ACCERR;
        }
        if self.is_protected(offset) {
            return FSTAT_FPVIOL;
        }
        self.data[offset..offset + size].fill(0xFF);
        0
    }

    fn program_phrase(&mut self, address: u32) -> u8 {
        let unit = self.config.geometry.write_unit_size as usize;
        let Some(offset) = self.array_offset(address, unit) else {
            return FSTAT_ACCERR;
        };
        if offset % unit != 0 {
            return FSTAT_ACCERR;
        }
        if self.is_protected(offset) {
            return FSTAT_FPVIOL;
        }
        // Programming can only clear bits
        for i in 0..unit {
            self.data[offset + i] &= fccob_at(&self.fccob, FTFC_REG_PHRASE_DATA + i as u32);
        }
        0
    }

    fn verify_section(&mut self, address: u32) -> u8 {
        let unit = self.config.geometry.write_unit_size as usize;
        let phrases = ((self.fccob[FCCOB4] as usize) << 8) | self.fccob[FCCOB5] as usize;
        let len = phrases * unit;
        if phrases == 0 {
            return FSTAT_ACCERR;
        }
        let Some(offset) = self.array_offset(address, len) else {
            return FSTAT_ACCERR;
        };
        if offset % unit != 0 || self.fccob[FCCOB6] > MARGIN_FACTORY {
            return FSTAT_ACCERR;
        }
        if self.data[offset..offset + len].iter().all(|&b| b == 0xFF) {
            0
        } else {
            FSTAT_MGSTAT0
        }
    }

    fn program_check(&mut self, address: u32) -> u8 {
        let Some(offset) = self.array_offset(address, PROGRAM_CHECK_UNIT) else {
            return FSTAT_ACCERR;
        };
        if offset % PROGRAM_CHECK_UNIT != 0 || self.fccob[FCCOB4] > MARGIN_FACTORY {
            return FSTAT_ACCERR;
        }
        let matches = self.data[offset..offset + PROGRAM_CHECK_UNIT]
            .iter()
            .enumerate()
            .all(|(j, &byte)| byte == fccob_at(&self.fccob, FTFC_REG_CHECK_DATA + j as u32));
        if matches {
            0
        } else {
            FSTAT_MGSTAT0
        }
    }

    fn program_partition(&mut self) -> u8 {
        if self.partition.is_some() {
            // Partitioning is one-time; the controller refuses a second attempt
            return FSTAT_ACCERR;
        }
        let mut params = [0u8; 5];
        params.copy_from_slice(&self.fccob[FCCOB1..=FCCOB5]);
        self.partition = Some(params);
        0
    }

    fn flash_window(&self, addr: u32) -> Option<usize> {
        let base = self.config.geometry.base_address;
        let offset = addr.checked_sub(base)? as usize;
        (offset < self.data.len()).then_some(offset)
    }
}

#[cfg(feature = "alloc")]
impl HardwarePort for DummyFtfc {
    fn read8(&mut self, addr: u32) -> u8 {
        if addr == FTFC_BASE + FTFC_REG_FSTAT {
            self.fstat_reads += 1;
            if !self.stalled && self.busy_remaining > 0 {
                self.busy_remaining -= 1;
                if self.busy_remaining == 0 {
                    self.fstat |= FSTAT_CCIF;
                }
            }
            return self.fstat;
        }
        if let Some(index) = addr.checked_sub(FTFC_BASE).and_then(regs::fccob_index) {
            return self.fccob[index];
        }
        if let Some(offset) = self.flash_window(addr) {
            return self.data[offset];
        }
        log::warn!("dummy ftfc: read from unmapped address {:#010x}", addr);
        0
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.register_writes += 1;

        if addr == FTFC_BASE + FTFC_REG_FSTAT {
            // Error flags are write-1-to-clear
            self.fstat &= !(value & FSTAT_CLEARABLE);
            if value & FSTAT_CCIF != 0 && self.fstat & FSTAT_CCIF != 0 {
                self.fstat &= !FSTAT_CCIF;
                self.launch();
            }
            return;
        }
        if let Some(index) = addr.checked_sub(FTFC_BASE).and_then(regs::fccob_index) {
            // The block is locked while a command runs
            if self.fstat & FSTAT_CCIF != 0 {
                self.fccob[index] = value;
            }
            return;
        }
        log::warn!(
            "dummy ftfc: write {:#04x} to unmapped address {:#010x}",
            value,
            addr
        );
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.register_writes += 1;

        if addr == MSCM_BASE + MSCM_REG_OCMDR_DFLASH {
            self.dflash_cache_control = Some(value);
            return;
        }
        log::warn!(
            "dummy ftfc: write {:#010x} to unmapped address {:#010x}",
            value,
            addr
        );
    }

    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) {
        match self.flash_window(addr) {
            Some(offset) if offset + buf.len() <= self.data.len() => {
                buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
            }
            _ => {
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = self.read8(addr.wrapping_add(i as u32));
                }
            }
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.delay_total_us += us as u64;
    }
}
