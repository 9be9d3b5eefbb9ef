//! FTFC flash controller register definitions
//!
//! Register offsets and bit definitions for the S32K1xx FTFC module and the
//! one MSCM register the driver touches during initialization.
//!
//! # Command register block
//!
//! The twelve FCCOB staging registers are packed big-endian inside three
//! 32-bit words starting at offset 0x04, so FCCOB0 (the opcode) sits at
//! 0x07 and FCCOB3 at 0x04. [`fccob_offset`] performs that mapping; callers
//! address single-byte parameters by FCCOB index. Data destined for flash
//! is the exception: it is loaded in address order at
//! [`FTFC_REG_PHRASE_DATA`] / [`FTFC_REG_CHECK_DATA`].

// ============================================================================
// Module base addresses
// ============================================================================

/// FTFC register block base address
pub const FTFC_BASE: u32 = 0x4002_0000;
/// MSCM register block base address
pub const MSCM_BASE: u32 = 0x4000_1000;

// ============================================================================
// FTFC registers
// ============================================================================

/// Flash Status Register (8 bits)
pub const FTFC_REG_FSTAT: u32 = 0x00;
/// First byte of the FCCOB register block
pub const FTFC_REG_FCCOB_BASE: u32 = 0x04;
/// Number of FCCOB registers
pub const FCCOB_COUNT: usize = 12;

// FSTAT bits
/// Command Complete Interrupt Flag (write 1 to launch)
pub const FSTAT_CCIF: u8 = 0x80;
/// Read Collision Error Flag (W1C)
pub const FSTAT_RDCOLERR: u8 = 0x40;
/// Flash Access Error Flag (W1C)
pub const FSTAT_ACCERR: u8 = 0x20;
/// Flash Protection Violation Flag (W1C)
pub const FSTAT_FPVIOL: u8 = 0x10;
/// Memory Controller Command Completion Status
pub const FSTAT_MGSTAT0: u8 = 0x01;
/// Error flags cleared before every command
pub const FSTAT_CLEARABLE: u8 = FSTAT_FPVIOL | FSTAT_ACCERR | FSTAT_RDCOLERR;

// FCCOB indices used by the driver
/// Command opcode
pub const FCCOB0: usize = 0;
/// Address bits [23:16] / first command parameter
pub const FCCOB1: usize = 1;
/// Address bits [15:8]
pub const FCCOB2: usize = 2;
/// Address bits [7:0]
pub const FCCOB3: usize = 3;
/// First payload slot of phrase, section and partition commands
pub const FCCOB4: usize = 4;
/// Second payload slot
pub const FCCOB5: usize = 5;
/// Third payload slot
pub const FCCOB6: usize = 6;

/// Register offset of the first program phrase data byte
///
/// Phrase data is stored in address order from here to 0x0F, so the byte
/// landing at the lowest flash address goes to the lowest register offset.
pub const FTFC_REG_PHRASE_DATA: u32 = 0x08;
/// Register offset of the first program check expected-data byte (address order)
pub const FTFC_REG_CHECK_DATA: u32 = 0x0C;

/// Byte offset of FCCOB register `index` from [`FTFC_BASE`]
///
/// # Panics
///
/// Panics in debug builds if `index >= FCCOB_COUNT`.
#[inline]
pub const fn fccob_offset(index: usize) -> u32 {
    debug_assert!(index < FCCOB_COUNT);
    FTFC_REG_FCCOB_BASE + (index & !3) as u32 + (3 - (index & 3)) as u32
}

/// FCCOB index held at byte offset `offset` from [`FTFC_BASE`], if any
#[inline]
pub const fn fccob_index(offset: u32) -> Option<usize> {
    if offset < FTFC_REG_FCCOB_BASE || offset >= FTFC_REG_FCCOB_BASE + FCCOB_COUNT as u32 {
        return None;
    }
    let rel = (offset - FTFC_REG_FCCOB_BASE) as usize;
    Some((rel & !3) + (3 - (rel & 3)))
}

// ============================================================================
// Command parameters
// ============================================================================

/// Margin level "user" used by the verify commands
pub const MARGIN_USER: u8 = 0x01;
/// Margin level "factory"
pub const MARGIN_FACTORY: u8 = 0x02;
/// Width of the data compared by one program check command
pub const PROGRAM_CHECK_UNIT: usize = 4;
/// Largest payload any command carries (FCCOB4..FCCOBB)
pub const MAX_PAYLOAD: usize = 8;

/// Controller-side address of the FlexNVM data flash
pub const DFLASH_CONTROLLER_OFFSET: u32 = 0x0080_0000;
/// Mask of the 24-bit address loaded into FCCOB1..FCCOB3
pub const CONTROLLER_ADDR_MASK: u32 = 0x00ff_ffff;

// ============================================================================
// MSCM
// ============================================================================

/// MSCM On-Chip Memory Descriptor register covering the data flash
pub const MSCM_REG_OCMDR_DFLASH: u32 = 0x404;
/// OCMDR value that disables the data flash read cache
pub const MSCM_OCMDR_DFLASH_CACHE_OFF: u32 = 0xc706_b030;
