//! Image-backed flash device
//!
//! Opens the emulated controller over the contents of an image file and
//! writes the contents back when asked to.

use progmem_core::FlashGeometry;
use progmem_dummy::{DummyConfig, DummyFtfc};
use progmem_ftfc::{FtfcProgmem, ProgmemOptions};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors opening or saving the image
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to access image {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("image {} is {actual} bytes, geometry needs {expected}", path.display())]
    SizeMismatch {
        path: PathBuf,
        actual: usize,
        expected: usize,
    },

    #[error(transparent)]
    Driver(#[from] progmem_core::Error),
}

/// Driver over an emulated controller, tied to its image file
pub struct FlashHandle {
    pub device: FtfcProgmem<DummyFtfc>,
    path: PathBuf,
}

impl FlashHandle {
    /// Open `path` as flash contents for `geometry`
    ///
    /// A missing file starts out fully erased.
    pub fn open(
        path: &Path,
        geometry: FlashGeometry,
        options: ProgmemOptions,
    ) -> Result<Self, ImageError> {
        let expected = geometry.total_size() as usize;
        let config = DummyConfig {
            geometry,
            ..DummyConfig::default()
        };

        let dummy = match fs::read(path) {
            Ok(data) if data.len() == expected => DummyFtfc::with_data(config, &data),
            Ok(data) => {
                return Err(ImageError::SizeMismatch {
                    path: path.to_path_buf(),
                    actual: data.len(),
                    expected,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("Image {} not found, starting erased", path.display());
                DummyFtfc::new(config)
            }
            Err(source) => {
                return Err(ImageError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let device = FtfcProgmem::new(dummy, geometry, options)?;
        Ok(Self {
            device,
            path: path.to_path_buf(),
        })
    }

    /// Write the current flash contents back to the image file
    pub fn save(&self) -> Result<(), ImageError> {
        let data = self.device.ftfc().port().data();
        fs::write(&self.path, data).map_err(|source| ImageError::Io {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("Saved {} bytes to {}", data.len(), self.path.display());
        Ok(())
    }

    /// Path of the backing image
    pub fn path(&self) -> &Path {
        &self.path
    }
}
