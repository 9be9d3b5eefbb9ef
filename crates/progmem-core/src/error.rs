//! Error types for progmem-core
//!
//! This module provides a no_std compatible error type shared by every
//! driver crate. Errors are `Copy` so they can be returned from the
//! innermost polling loop without allocation.

use core::fmt;

use crate::command::Opcode;

/// Details about a rejected caller argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// Byte count is not a multiple of the write-alignment unit
    Misaligned {
        /// Requested byte count
        count: usize,
        /// Write-alignment unit of the geometry
        unit: u32,
    },
    /// Page index beyond the end of the flash region
    PageOutOfRange {
        /// Requested page
        page: u32,
        /// Number of pages in the region
        page_count: u32,
    },
    /// Byte range does not lie inside the flash region
    AddressOutOfRange {
        /// Base-relative start offset
        offset: u32,
        /// Length of the access
        len: usize,
    },
}

/// Failure condition reported by the controller status register
///
/// When several error bits are set at once, the first in declaration order
/// wins: a protection violation is more specific than an access error, which
/// is more specific than a generic operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFailure {
    /// FPVIOL: the target lies in a protected region
    ProtectionViolation,
    /// ACCERR: illegal command, address or parameter
    AccessError,
    /// RDCOLERR: flash was read while the command was running
    ReadCollision,
    /// MGSTAT0: the command ran but did not complete successfully
    OperationFailed,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A caller-supplied size, count or index violated a precondition.
    /// Rejected before any hardware access.
    InvalidArgument(ArgumentError),
    /// The controller reported a failure after a command was launched
    Io {
        /// Command that failed
        opcode: Opcode,
        /// Decoded failure condition
        failure: CommandFailure,
    },
    /// The controller never reasserted its completion flag
    Timeout {
        /// Command that was being waited on (`None` for the initial ready-wait
        /// of an idle controller)
        opcode: Option<Opcode>,
    },
    /// The geometry description violates one of its invariants
    InvalidGeometry(&'static str),
}

impl Error {
    /// Returns true for failures reported by the controller status register
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true for rejected caller arguments
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Negative errno value for MTD-style callers
    ///
    /// Controller failures keep their distinct meaning: a protected region is
    /// `-EROFS`, an access error `-EACCES`, a read collision `-EPERM` and a
    /// generic failure `-EIO`.
    pub fn errno(&self) -> i32 {
        const EPERM: i32 = 1;
        const EIO: i32 = 5;
        const EACCES: i32 = 13;
        const EFAULT: i32 = 14;
        const EINVAL: i32 = 22;
        const EROFS: i32 = 30;
        const ETIMEDOUT: i32 = 110;

        -match self {
            Self::InvalidArgument(ArgumentError::Misaligned { .. }) => EINVAL,
            Self::InvalidArgument(_) => EFAULT,
            Self::Io { failure, .. } => match failure {
                CommandFailure::ProtectionViolation => EROFS,
                CommandFailure::AccessError => EACCES,
                CommandFailure::ReadCollision => EPERM,
                CommandFailure::OperationFailed => EIO,
            },
            Self::Timeout { .. } => ETIMEDOUT,
            Self::InvalidGeometry(_) => EINVAL,
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Misaligned { count, unit } => {
                write!(f, "length {} is not a multiple of {} bytes", count, unit)
            }
            Self::PageOutOfRange { page, page_count } => {
                write!(f, "page {} out of range (page count {})", page, page_count)
            }
            Self::AddressOutOfRange { offset, len } => {
                write!(f, "{} bytes at offset 0x{:08X} out of range", len, offset)
            }
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtectionViolation => write!(f, "protection violation"),
            Self::AccessError => write!(f, "access error"),
            Self::ReadCollision => write!(f, "read collision"),
            Self::OperationFailed => write!(f, "operation failed"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => write!(f, "invalid argument: {}", e),
            Self::Io { opcode, failure } => {
                write!(f, "{} command failed: {}", opcode.name(), failure)
            }
            Self::Timeout { opcode: Some(op) } => {
                write!(f, "timed out waiting for {} command", op.name())
            }
            Self::Timeout { opcode: None } => {
                write!(f, "timed out waiting for flash controller")
            }
            Self::InvalidGeometry(msg) => write!(f, "invalid flash geometry: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
