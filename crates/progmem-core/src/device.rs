//! Program memory device trait
//!
//! [`Progmem`] is the interface storage layers program against. The
//! geometry queries are total functions provided from [`FlashGeometry`];
//! implementors supply the data-moving operations.

use crate::error::Result;
use crate::geometry::FlashGeometry;

/// Byte value of an erased flash cell
pub const ERASED_VALUE: u8 = 0xFF;

/// On-chip program/data flash
///
/// Byte counts are returned on success so callers written against the
/// classic progmem interface can keep their "bytes processed" bookkeeping.
///
/// # Example
///
/// ```ignore
/// use progmem_core::Progmem;
///
/// fn store<P: Progmem>(dev: &mut P, data: &[u8]) -> progmem_core::Result<()> {
///     let block = dev.geometry().block_of(0);
///     dev.erase_block(block)?;
///     dev.write(0, data)?;
///     Ok(())
/// }
/// ```
pub trait Progmem {
    /// Geometry of the region this device drives
    fn geometry(&self) -> &FlashGeometry;

    /// Number of erase blocks
    fn erase_block_count(&self) -> u32 {
        self.geometry().block_count
    }

    /// Whether every page and block has the same size (always true here)
    fn is_uniform(&self) -> bool {
        true
    }

    /// Size of `page` in bytes; the index is ignored
    fn page_size(&self, _page: u32) -> u32 {
        self.geometry().page_size
    }

    /// Size of erase block `block` in bytes; the index is ignored
    fn erase_size(&self, _block: u32) -> u32 {
        self.geometry().block_size
    }

    /// Page containing `addr` (absolute or base-relative), unchecked
    fn page_of(&self, addr: u32) -> u32 {
        self.geometry().page_of(addr)
    }

    /// Absolute address of `page`, unchecked
    fn address_of(&self, page: u32) -> u32 {
        self.geometry().address_of(page)
    }

    /// Value read back from an erased cell
    fn erase_state(&self) -> u8 {
        ERASED_VALUE
    }

    /// Erase one block, returning the number of bytes erased
    ///
    /// The block index is not validated; passing an index outside the region
    /// is the caller's responsibility.
    fn erase_block(&mut self, block: u32) -> Result<usize>;

    /// Number of bytes of `page` that are not erased
    ///
    /// Zero means the whole page is erased; otherwise the result is
    /// `page_size - offset_of_first_programmed_byte`.
    ///
    /// # Errors
    /// * `InvalidArgument` - If `page >= page_count`
    fn is_page_erased(&mut self, page: u32) -> Result<usize>;

    /// Program `data` at `addr`, returning the number of bytes written
    ///
    /// The target should be erased. The write may span pages and blocks.
    ///
    /// # Errors
    /// * `InvalidArgument` - If `data.len()` is not a multiple of the write unit
    /// * `Io` - If the controller reports a failure
    /// * `Timeout` - If the controller stops responding
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<usize>;

    /// Read memory-mapped flash at `addr` into `buf`
    ///
    /// # Errors
    /// * `InvalidArgument` - If the range is not inside the region
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<usize>;
}
