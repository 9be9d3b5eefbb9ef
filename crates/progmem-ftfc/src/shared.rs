//! Thread-safe shared driver handle
//!
//! [`SharedProgmem`] wraps a [`Progmem`] in `Arc<Mutex<_>>`. Each call holds
//! the lock for the whole operation, so one command sequence can never be
//! interleaved with another even when several threads share the flash.

use std::sync::{Arc, Mutex, MutexGuard};

use progmem_core::{FlashGeometry, Progmem, Result};

/// Cloneable handle to a driver shared between threads
pub struct SharedProgmem<D> {
    inner: Arc<Mutex<D>>,
    geometry: FlashGeometry,
}

impl<D> Clone for SharedProgmem<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            geometry: self.geometry,
        }
    }
}

impl<D: Progmem> SharedProgmem<D> {
    /// Take ownership of `device`
    pub fn new(device: D) -> Self {
        let geometry = *device.geometry();
        Self {
            inner: Arc::new(Mutex::new(device)),
            geometry,
        }
    }

    /// Geometry of the shared device
    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    /// Run `f` with exclusive access to the device
    ///
    /// Use this to group several operations (erase then write) under one
    /// lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.lock())
    }

    /// See [`Progmem::erase_block`]
    pub fn erase_block(&self, block: u32) -> Result<usize> {
        self.lock().erase_block(block)
    }

    /// See [`Progmem::is_page_erased`]
    pub fn is_page_erased(&self, page: u32) -> Result<usize> {
        self.lock().is_page_erased(page)
    }

    /// See [`Progmem::write`]
    pub fn write(&self, addr: u32, data: &[u8]) -> Result<usize> {
        self.lock().write(addr, data)
    }

    /// See [`Progmem::read`]
    pub fn read(&self, addr: u32, buf: &mut [u8]) -> Result<usize> {
        self.lock().read(addr, buf)
    }

    /// Recover the device if this is the last handle
    pub fn try_unwrap(self) -> std::result::Result<D, Self> {
        let geometry = self.geometry;
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(|e| e.into_inner())),
            Err(inner) => Err(Self { inner, geometry }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, D> {
        // Every command starts with a ready-wait, so the device stays usable
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!("progmem lock poisoned, continuing");
            poisoned.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FtfcProgmem, ProgmemOptions};
    use progmem_dummy::{DummyConfig, DummyFtfc};
    use std::thread;

    #[test]
    fn test_concurrent_writers_do_not_interleave() {
        let geometry = FlashGeometry::S32K1XX_DFLASH;
        let dummy = DummyFtfc::new(DummyConfig {
            geometry,
            busy_polls: 5,
        });
        let dev = FtfcProgmem::new(dummy, geometry, ProgmemOptions::default()).unwrap();
        let shared = SharedProgmem::new(dev);

        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let shared = shared.clone();
                thread::spawn(move || {
                    let page = t as u32;
                    let addr = shared.geometry().address_of(page);
                    for i in 0..16u32 {
                        let data = [t; 64];
                        shared.write(addr + i * 64, &data).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for t in 0..4u8 {
            let mut buf = [0u8; 1024];
            let addr = shared.geometry().address_of(t as u32);
            shared.read(addr, &mut buf).unwrap();
            assert!(buf.iter().all(|&b| b == t), "page {} corrupted", t);
            assert_eq!(shared.is_page_erased(t as u32).unwrap(), 2048);
        }

        let dev = match shared.try_unwrap() {
            Ok(dev) => dev,
            Err(_) => panic!("handle still shared"),
        };
        let history = dev.ftfc().port().history();
        assert_eq!(history.len(), 4 * 16 * 8);
        assert!(history.iter().all(|c| c.status == 0));
    }

    #[test]
    fn test_with_groups_operations() {
        let shared = SharedProgmem::new(FtfcProgmem::s32k1xx(DummyFtfc::new_default()));
        let written = shared
            .with(|dev| {
                dev.erase_block(1)?;
                dev.write(0x1000_0800, &[0x42; 8])
            })
            .unwrap();
        assert_eq!(written, 8);

        let mut buf = [0u8; 8];
        shared.read(0x1000_0800, &mut buf).unwrap();
        assert_eq!(buf, [0x42; 8]);
    }
}
