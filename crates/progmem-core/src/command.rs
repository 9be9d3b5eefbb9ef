//! FTFC command request and status types
//!
//! A [`CommandRequest`] is the complete contents of the command register
//! block for one controller command: the opcode in FCCOB0, three address (or
//! parameter) bytes in FCCOB1..FCCOB3, an optional parameter payload starting
//! at a caller-chosen FCCOB slot and optional flash data loaded in address
//! order at a raw register offset. Requests are built fresh for every command
//! and consumed by the executor.

use bitflags::bitflags;
use heapless::Vec;

use crate::error::{Error, Result};
use crate::regs::{self, FCCOB_COUNT, FTFC_REG_FCCOB_BASE, MAX_PAYLOAD};

/// FTFC command opcodes used by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Read 1s Section - checks that a run of phrases is erased
    VerifySection = 0x01,
    /// Program Check - compares a longword against the given data at a margin level
    ProgramCheck = 0x02,
    /// Program Phrase - programs 8 bytes
    ProgramPhrase = 0x07,
    /// Erase Flash Sector
    EraseSector = 0x09,
    /// Program Partition - configures FlexNVM/EEPROM partitioning
    ProgramPartition = 0x80,
}

impl Opcode {
    /// Raw opcode byte written to FCCOB0
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decode an opcode byte
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::VerifySection),
            0x02 => Some(Self::ProgramCheck),
            0x07 => Some(Self::ProgramPhrase),
            0x09 => Some(Self::EraseSector),
            0x80 => Some(Self::ProgramPartition),
            _ => None,
        }
    }

    /// Human-readable name
    pub const fn name(self) -> &'static str {
        match self {
            Self::VerifySection => "verify section",
            Self::ProgramCheck => "program check",
            Self::ProgramPhrase => "program phrase",
            Self::EraseSector => "erase sector",
            Self::ProgramPartition => "program partition",
        }
    }
}

/// Encode a controller address into FCCOB1..FCCOB3 (most significant first)
///
/// Only the low 24 bits are representable; higher bits are dropped the same
/// way the controller would.
pub const fn encode_address(address: u32) -> [u8; 3] {
    [
        (address >> 16) as u8,
        (address >> 8) as u8,
        address as u8,
    ]
}

/// Decode FCCOB1..FCCOB3 back into a 24-bit controller address
pub const fn decode_address(bytes: [u8; 3]) -> u32 {
    (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32
}

/// One command for the FTFC command register block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// The opcode byte
    pub opcode: Opcode,
    /// FCCOB1..FCCOB3, an encoded address for most commands
    pub address: [u8; 3],
    /// Bytes loaded after the address, before launch
    pub payload: Vec<u8, MAX_PAYLOAD>,
    /// FCCOB index receiving `payload[0]`
    pub payload_offset: usize,
    /// Flash data, loaded after the payload in address order
    pub data: Vec<u8, MAX_PAYLOAD>,
    /// Register offset (from the FTFC base) receiving `data[0]`
    pub data_offset: u32,
}

impl CommandRequest {
    /// Create a command targeting a controller address, with no payload
    pub fn addressed(opcode: Opcode, address: u32) -> Self {
        Self {
            opcode,
            address: encode_address(address),
            payload: Vec::new(),
            payload_offset: regs::FCCOB4,
            data: Vec::new(),
            data_offset: regs::FTFC_REG_PHRASE_DATA,
        }
    }

    /// Create a command whose FCCOB1..FCCOB3 carry parameters rather than an address
    pub fn with_parameters(opcode: Opcode, parameters: [u8; 3]) -> Self {
        Self {
            opcode,
            address: parameters,
            payload: Vec::new(),
            payload_offset: regs::FCCOB4,
            data: Vec::new(),
            data_offset: regs::FTFC_REG_PHRASE_DATA,
        }
    }

    /// Attach a payload that starts at FCCOB slot `offset`
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if the payload does not fit the register block;
    /// this only happens when the geometry's write unit exceeds the
    /// controller's phrase size.
    pub fn with_payload(mut self, offset: usize, payload: &[u8]) -> Result<Self> {
        if offset <= regs::FCCOB3 || offset + payload.len() > FCCOB_COUNT {
            return Err(Error::InvalidGeometry("payload exceeds FCCOB register block"));
        }
        self.payload = Vec::from_slice(payload)
            .map_err(|_| Error::InvalidGeometry("payload exceeds FCCOB register block"))?;
        self.payload_offset = offset;
        Ok(self)
    }

    /// Attach flash data stored byte for byte from register offset `offset`
    ///
    /// `data[j]` lands at `offset + j`, so the data reaches flash in the same
    /// order it has in memory. Only the two parameter-free words of the
    /// register block (0x08..0x0F) may carry data.
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if the data does not fit those registers.
    pub fn with_data(mut self, offset: u32, data: &[u8]) -> Result<Self> {
        let end = FTFC_REG_FCCOB_BASE + FCCOB_COUNT as u32;
        if offset < regs::FTFC_REG_PHRASE_DATA || offset as usize + data.len() > end as usize {
            return Err(Error::InvalidGeometry("data exceeds FCCOB register block"));
        }
        self.data = Vec::from_slice(data)
            .map_err(|_| Error::InvalidGeometry("data exceeds FCCOB register block"))?;
        self.data_offset = offset;
        Ok(self)
    }

    /// Controller address held in FCCOB1..FCCOB3
    pub fn target_address(&self) -> u32 {
        decode_address(self.address)
    }
}

bitflags! {
    /// FSTAT register as read after a command completes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommandStatus: u8 {
        /// Command complete / controller idle
        const CCIF = regs::FSTAT_CCIF;
        /// Read collision error
        const RDCOLERR = regs::FSTAT_RDCOLERR;
        /// Access error
        const ACCERR = regs::FSTAT_ACCERR;
        /// Protection violation
        const FPVIOL = regs::FSTAT_FPVIOL;
        /// Command completion status (set on failure)
        const MGSTAT0 = regs::FSTAT_MGSTAT0;

        /// Every bit that signals failure
        const ERRORS = Self::RDCOLERR.bits()
            | Self::ACCERR.bits()
            | Self::FPVIOL.bits()
            | Self::MGSTAT0.bits();
    }
}

impl CommandStatus {
    /// Decode a raw FSTAT value, ignoring reserved bits
    pub fn from_fstat(fstat: u8) -> Self {
        Self::from_bits_truncate(fstat)
    }

    /// Controller is idle and ready for (or finished with) a command
    pub fn completed(&self) -> bool {
        self.contains(Self::CCIF)
    }

    /// FPVIOL is set
    pub fn protection_violation(&self) -> bool {
        self.contains(Self::FPVIOL)
    }

    /// ACCERR is set
    pub fn access_error(&self) -> bool {
        self.contains(Self::ACCERR)
    }

    /// RDCOLERR is set
    pub fn read_collision_error(&self) -> bool {
        self.contains(Self::RDCOLERR)
    }

    /// MGSTAT0 is set
    pub fn operation_error(&self) -> bool {
        self.contains(Self::MGSTAT0)
    }

    /// True when none of the four failure bits is set
    pub fn is_success(&self) -> bool {
        !self.intersects(Self::ERRORS)
    }

    /// Map the status to a result for the command `opcode`
    pub fn check(self, opcode: Opcode) -> Result<Self> {
        use crate::error::CommandFailure;

        let failure = if self.protection_violation() {
            CommandFailure::ProtectionViolation
        } else if self.access_error() {
            CommandFailure::AccessError
        } else if self.read_collision_error() {
            CommandFailure::ReadCollision
        } else if self.operation_error() {
            CommandFailure::OperationFailed
        } else {
            return Ok(self);
        };

        Err(Error::Io { opcode, failure })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandFailure;

    #[test]
    fn address_is_encoded_msb_first() {
        assert_eq!(encode_address(0x0080_1234), [0x80, 0x12, 0x34]);
        assert_eq!(encode_address(0x1080_0800), [0x80, 0x08, 0x00]);
        assert_eq!(decode_address([0x80, 0x12, 0x34]), 0x0080_1234);
    }

    #[test]
    fn payload_must_fit_register_block() {
        let req = CommandRequest::with_parameters(Opcode::ProgramPartition, [0; 3])
            .with_payload(regs::FCCOB4, &[0u8; 8])
            .unwrap();
        assert_eq!(req.payload.len(), 8);

        let too_far = CommandRequest::addressed(Opcode::ProgramCheck, 0)
            .with_payload(8, &[0u8; 8]);
        assert!(matches!(too_far, Err(Error::InvalidGeometry(_))));

        let over_address = CommandRequest::addressed(Opcode::ProgramCheck, 0)
            .with_payload(regs::FCCOB2, &[0u8; 2]);
        assert!(over_address.is_err());
    }

    #[test]
    fn data_is_limited_to_the_data_words() {
        let phrase = CommandRequest::addressed(Opcode::ProgramPhrase, 0x80_0000)
            .with_data(regs::FTFC_REG_PHRASE_DATA, &[1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();
        assert_eq!(phrase.data.as_slice(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(phrase.data_offset, 0x08);
        assert!(phrase.payload.is_empty());
        assert_eq!(phrase.target_address(), 0x80_0000);

        let check = CommandRequest::addressed(Opcode::ProgramCheck, 0)
            .with_payload(regs::FCCOB4, &[regs::MARGIN_USER])
            .unwrap()
            .with_data(regs::FTFC_REG_CHECK_DATA, &[9, 8, 7, 6])
            .unwrap();
        assert_eq!(check.payload.as_slice(), &[regs::MARGIN_USER]);
        assert_eq!(check.data_offset, 0x0c);

        // Past the last FCCOB register
        let too_long = CommandRequest::addressed(Opcode::ProgramCheck, 0)
            .with_data(regs::FTFC_REG_CHECK_DATA, &[0u8; 8]);
        assert!(matches!(too_long, Err(Error::InvalidGeometry(_))));

        // Over the opcode and address word
        let too_low = CommandRequest::addressed(Opcode::ProgramPhrase, 0)
            .with_data(0x06, &[0u8; 8]);
        assert!(too_low.is_err());
    }

    #[test]
    fn status_decoding() {
        let ok = CommandStatus::from_fstat(0x80);
        assert!(ok.completed());
        assert!(ok.is_success());
        assert!(ok.check(Opcode::EraseSector).is_ok());

        let busy = CommandStatus::from_fstat(0x00);
        assert!(!busy.completed());

        let both = CommandStatus::from_fstat(0x80 | 0x20 | 0x10);
        assert!(both.protection_violation());
        assert!(both.access_error());
        assert_eq!(
            both.check(Opcode::ProgramPhrase),
            Err(Error::Io {
                opcode: Opcode::ProgramPhrase,
                failure: CommandFailure::ProtectionViolation,
            })
        );

        let mgstat = CommandStatus::from_fstat(0x81);
        assert!(mgstat.operation_error());
        assert!(!mgstat.is_success());
    }

    #[test]
    fn opcode_round_trip() {
        for op in [
            Opcode::VerifySection,
            Opcode::ProgramCheck,
            Opcode::ProgramPhrase,
            Opcode::EraseSector,
            Opcode::ProgramPartition,
        ] {
            assert_eq!(Opcode::from_code(op.code()), Some(op));
        }
        assert_eq!(Opcode::from_code(0x44), None);
    }
}
