//! progmem-core - Core library for on-chip flash drivers
//!
//! This crate provides the pieces shared by the FTFC driver, the emulator
//! and the CLI: the error taxonomy, the flash geometry model, the FTFC
//! register map, the command request/status types and the traits that
//! separate the driver from the hardware it talks to. It is `no_std`
//! compatible so the same types build for the target MCU.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), TOML
//!   geometry loading and `std::error::Error` impls
//! - `alloc` - Enable heap allocation
//!
//! # Example
//!
//! ```ignore
//! use progmem_core::{FlashGeometry, Progmem};
//!
//! fn wipe_first_block<P: Progmem>(dev: &mut P) -> progmem_core::Result<()> {
//!     let erased = dev.erase_block(0)?;
//!     assert_eq!(erased, dev.erase_size(0) as usize);
//!     assert_eq!(dev.is_page_erased(0)?, 0);
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod command;
#[cfg(feature = "std")]
pub mod config;
pub mod device;
pub mod error;
pub mod geometry;
pub mod port;
pub mod regs;

pub use command::{encode_address, CommandRequest, CommandStatus, Opcode};
pub use device::Progmem;
pub use error::{ArgumentError, CommandFailure, Error, Result};
pub use geometry::FlashGeometry;
pub use port::HardwarePort;
