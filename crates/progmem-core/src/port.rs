//! Hardware access port
//!
//! The driver never dereferences hardware addresses itself. Every register
//! access and every memory-mapped flash read goes through a [`HardwarePort`],
//! which is a volatile MMIO window on the target and an emulator on the host.

/// Raw access to controller registers and memory-mapped flash
///
/// All addresses are absolute bus addresses.
pub trait HardwarePort {
    /// Read an 8-bit register
    fn read8(&mut self, addr: u32) -> u8;

    /// Write an 8-bit register
    fn write8(&mut self, addr: u32, value: u8);

    /// Write a 32-bit register
    fn write32(&mut self, addr: u32, value: u32);

    /// Read memory-mapped flash contents starting at `addr`
    ///
    /// The default implementation issues one byte read per element.
    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.read8(addr.wrapping_add(i as u32));
        }
    }

    /// Delay for the specified number of microseconds
    ///
    /// Called once per iteration of every completion poll. Implementations
    /// running under a cooperative scheduler yield here.
    fn delay_us(&mut self, _us: u32) {}
}

impl<P: HardwarePort + ?Sized> HardwarePort for &mut P {
    fn read8(&mut self, addr: u32) -> u8 {
        (**self).read8(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        (**self).write8(addr, value)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value)
    }

    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) {
        (**self).read_memory(addr, buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

#[cfg(feature = "alloc")]
impl HardwarePort for alloc::boxed::Box<dyn HardwarePort + Send> {
    fn read8(&mut self, addr: u32) -> u8 {
        (**self).read8(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        (**self).write8(addr, value)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value)
    }

    fn read_memory(&mut self, addr: u32, buf: &mut [u8]) {
        (**self).read_memory(addr, buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
