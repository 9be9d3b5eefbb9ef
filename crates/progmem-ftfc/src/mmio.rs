//! Volatile MMIO hardware port
//!
//! [`Mmio`] turns bus addresses into volatile pointer accesses. On the
//! target the mapping is the identity. A host-side mapping (a `/dev/mem`
//! window or a test buffer) is expressed as a fixed pointer offset.
//!
//! # Safety
//!
//! Every access dereferences a raw pointer derived from the bus address.
//! Constructing an [`Mmio`] is `unsafe`: the caller guarantees that every
//! address the driver touches (FTFC and MSCM registers and the flash window)
//! is mapped and valid for volatile access for the lifetime of the port.

use progmem_core::HardwarePort;

/// Memory-mapped register and flash access
#[derive(Debug)]
pub struct Mmio {
    /// Added to a bus address to form the pointer
    offset: usize,
}

impl Mmio {
    /// Access the bus directly
    ///
    /// # Safety
    ///
    /// Must run on the target with the FTFC, MSCM and flash mapped at their
    /// bus addresses, and no other code may drive the FTFC concurrently.
    pub unsafe fn new() -> Self {
        Self { offset: 0 }
    }

    /// Access the bus through a window mapped `offset` bytes away
    ///
    /// # Safety
    ///
    /// `addr.wrapping_add(offset)` must be valid for volatile reads and
    /// writes for every address the driver uses.
    pub unsafe fn with_offset(offset: usize) -> Self {
        Self { offset }
    }

    #[inline]
    fn ptr(&self, addr: u32) -> *mut u8 {
        (addr as usize).wrapping_add(self.offset) as *mut u8
    }
}

impl HardwarePort for Mmio {
    #[inline]
    fn read8(&mut self, addr: u32) -> u8 {
        // SAFETY: validity of the mapping is guaranteed by the constructor
        unsafe { core::ptr::read_volatile(self.ptr(addr)) }
    }

    #[inline]
    fn write8(&mut self, addr: u32, value: u8) {
        // SAFETY: see read8
        unsafe { core::ptr::write_volatile(self.ptr(addr), value) }
    }

    #[inline]
    fn write32(&mut self, addr: u32, value: u32) {
        debug_assert!(addr & 3 == 0, "unaligned 32-bit write");
        // SAFETY: see read8; register addresses are word aligned
        unsafe { core::ptr::write_volatile(self.ptr(addr) as *mut u32, value) }
    }

    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            // SAFETY: see read8
            *byte = unsafe { core::ptr::read_volatile(self.ptr(addr).add(i)) };
        }
    }
}
