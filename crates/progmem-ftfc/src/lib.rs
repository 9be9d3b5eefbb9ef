//! progmem-ftfc - S32K1xx FTFC on-chip flash driver
//!
//! This crate drives the FTFC flash controller found on NXP S32K1xx
//! microcontrollers and exposes the FlexNVM data flash through the
//! [`progmem_core::Progmem`] interface.
//!
//! # Overview
//!
//! All hardware interaction goes through [`executor::Ftfc`], which runs the
//! controller's command protocol over a [`progmem_core::HardwarePort`]. The
//! driver proper, [`FtfcProgmem`], builds erase, program, verify and
//! partition commands on top of it.
//!
//! On the target, pair the driver with [`mmio::Mmio`]. On the host, use the
//! `progmem-dummy` emulator.
//!
//! # Example
//!
//! ```ignore
//! use progmem_core::Progmem;
//! use progmem_ftfc::{FtfcProgmem, Mmio};
//!
//! let mut flash = FtfcProgmem::s32k1xx(unsafe { Mmio::new() });
//! flash.initialize();
//! flash.erase_block(0)?;
//! flash.write(0x1000_0000, &[0u8; 8])?;
//! ```
//!
//! # References
//!
//! - S32K1xx Reference Manual, chapter "Flash Memory Module (FTFC)"

#![cfg_attr(not(feature = "std"), no_std)]

pub mod executor;
pub mod mmio;
pub mod options;
pub mod progmem;
#[cfg(feature = "std")]
pub mod shared;

pub use executor::Ftfc;
pub use mmio::Mmio;
pub use options::{
    OptionError, PartitionConfig, ProgmemOptions, WriteVerifyPolicy, DEFAULT_POLL_LIMIT,
};
pub use progmem::FtfcProgmem;
#[cfg(feature = "std")]
pub use shared::SharedProgmem;
