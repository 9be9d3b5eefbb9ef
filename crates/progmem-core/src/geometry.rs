//! Flash geometry model
//!
//! A [`FlashGeometry`] describes one uniform flash region: where it is
//! mapped, how it is divided into pages and erase blocks, the program
//! granularity and where the controller sees it. It is built once and never
//! mutated.
//!
//! The address translation functions do not range-check their input. Callers
//! that accept untrusted indices must validate them against
//! [`FlashGeometry::page_count`] / [`FlashGeometry::block_count`] first; an
//! out-of-range input yields an out-of-range result.

use crate::error::{ArgumentError, Error, Result};
use crate::regs::{self, PROGRAM_CHECK_UNIT};

/// Static description of a uniform flash region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    /// Bus address of the first byte
    pub base_address: u32,
    /// Read/write page size in bytes
    pub page_size: u32,
    /// Erase block (sector) size in bytes
    pub block_size: u32,
    /// Number of pages
    pub page_count: u32,
    /// Number of erase blocks
    pub block_count: u32,
    /// Program granularity in bytes
    pub write_unit_size: u32,
    /// Controller-side address of the first byte
    pub data_flash_offset: u32,
}

impl FlashGeometry {
    /// S32K1xx FlexNVM data flash: 64 KiB of 2 KiB sectors at 0x1000_0000
    pub const S32K1XX_DFLASH: Self = Self {
        base_address: 0x1000_0000,
        page_size: 2048,
        block_size: 2048,
        page_count: 32,
        block_count: 32,
        write_unit_size: 8,
        data_flash_offset: regs::DFLASH_CONTROLLER_OFFSET,
    };

    /// Check the geometry invariants
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` naming the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0
            || self.block_size == 0
            || self.write_unit_size == 0
            || self.page_count == 0
            || self.block_count == 0
        {
            return Err(Error::InvalidGeometry("sizes and counts must be non-zero"));
        }
        if self.block_size % self.page_size != 0 {
            return Err(Error::InvalidGeometry(
                "block size must be a multiple of the page size",
            ));
        }
        if self.page_size % self.write_unit_size != 0 {
            return Err(Error::InvalidGeometry(
                "write unit must divide the page size",
            ));
        }
        if self.write_unit_size as usize > regs::MAX_PAYLOAD
            || self.write_unit_size as usize % PROGRAM_CHECK_UNIT != 0
        {
            return Err(Error::InvalidGeometry(
                "write unit must be 4 or 8 bytes",
            ));
        }
        let pages = self.page_count as u64 * self.page_size as u64;
        let blocks = self.block_count as u64 * self.block_size as u64;
        if pages != blocks {
            return Err(Error::InvalidGeometry(
                "pages and blocks must cover the same region",
            ));
        }
        if self.data_flash_offset as u64 + blocks > regs::CONTROLLER_ADDR_MASK as u64 + 1 {
            return Err(Error::InvalidGeometry(
                "region exceeds the 24-bit controller address space",
            ));
        }
        if self.base_address as u64 + blocks > u32::MAX as u64 + 1 {
            return Err(Error::InvalidGeometry("region exceeds the address space"));
        }
        Ok(())
    }

    /// Total size of the region in bytes
    pub const fn total_size(&self) -> u32 {
        self.block_count * self.block_size
    }

    /// Number of erase blocks
    pub const fn erase_block_count(&self) -> u32 {
        self.block_count
    }

    /// Base-relative offset of `address`
    ///
    /// Addresses at or above the base are treated as absolute; anything
    /// below it is already relative.
    pub const fn relative_offset(&self, address: u32) -> u32 {
        if address >= self.base_address {
            address - self.base_address
        } else {
            address
        }
    }

    /// Page containing `address` (absolute or base-relative)
    pub const fn page_of(&self, address: u32) -> u32 {
        self.relative_offset(address) / self.page_size
    }

    /// Absolute address of the first byte of `page`
    pub const fn address_of(&self, page: u32) -> u32 {
        self.base_address
            .wrapping_add(page.wrapping_mul(self.page_size))
    }

    /// Erase block containing `address` (absolute or base-relative)
    pub const fn block_of(&self, address: u32) -> u32 {
        self.relative_offset(address) / self.block_size
    }

    /// Absolute address of the first byte of `block`
    pub const fn block_address(&self, block: u32) -> u32 {
        self.base_address
            .wrapping_add(block.wrapping_mul(self.block_size))
    }

    /// Controller-side address for a base-relative offset
    pub const fn controller_address(&self, offset: u32) -> u32 {
        self.data_flash_offset.wrapping_add(offset) & regs::CONTROLLER_ADDR_MASK
    }

    /// Check that `len` bytes at base-relative `offset` lie inside the region
    pub fn check_range(&self, offset: u32, len: usize) -> Result<()> {
        let end = offset as u64 + len as u64;
        if end > self.total_size() as u64 {
            return Err(Error::InvalidArgument(ArgumentError::AddressOutOfRange {
                offset,
                len,
            }));
        }
        Ok(())
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self::S32K1XX_DFLASH
    }
}
