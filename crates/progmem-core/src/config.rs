//! TOML geometry files
//!
//! Describes a flash region in a TOML file so host tools can drive parts
//! other than the default S32K1xx data flash:
//!
//! ```toml
//! [geometry]
//! base_address = 0x10000000
//! page_size = 2048
//! block_size = 2048
//! page_count = 32
//! block_count = 32
//! write_unit_size = 8
//! data_flash_offset = "0x800000"
//! ```
//!
//! Numbers may be TOML integers or strings in hex (`0x...`) or decimal.
//! Omitted fields keep the S32K1xx defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::string::String;

use thiserror::Error;

use crate::error::Error as CoreError;
use crate::geometry::FlashGeometry;

/// Errors from loading a geometry file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML or has the wrong shape
    #[error("failed to parse geometry: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed geometry violates an invariant
    #[error("{0}")]
    Invalid(CoreError),
}

#[derive(Debug, serde::Deserialize)]
struct GeometryFile {
    geometry: TomlGeometry,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlGeometry {
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    base_address: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    page_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    block_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    page_count: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    block_count: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    write_unit_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u32")]
    data_flash_offset: Option<u32>,
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_opt_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => parse_number(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| std::format!("invalid hex: {}", e))
    } else {
        s.parse()
            .map_err(|e| std::format!("invalid number: {}", e))
    }
}

/// Parse geometry from TOML text
///
/// Missing `page_count` / `block_count` are derived from the other sizes when
/// only one of them is given.
pub fn parse_geometry(content: &str) -> Result<FlashGeometry, ConfigError> {
    let file: GeometryFile = toml::from_str(content)?;
    let t = file.geometry;
    let d = FlashGeometry::S32K1XX_DFLASH;

    let page_size = t.page_size.unwrap_or(d.page_size);
    let block_size = t.block_size.unwrap_or(d.block_size);
    let (page_count, block_count) = match (t.page_count, t.block_count) {
        (Some(p), Some(b)) => (p, b),
        (Some(p), None) if block_size != 0 => (p, p * page_size / block_size),
        (None, Some(b)) if page_size != 0 => (b * block_size / page_size, b),
        _ => (d.page_count, d.block_count),
    };

    let geometry = FlashGeometry {
        base_address: t.base_address.unwrap_or(d.base_address),
        page_size,
        block_size,
        page_count,
        block_count,
        write_unit_size: t.write_unit_size.unwrap_or(d.write_unit_size),
        data_flash_offset: t.data_flash_offset.unwrap_or(d.data_flash_offset),
    };
    geometry.validate().map_err(ConfigError::Invalid)?;

    log::debug!("Loaded geometry: {:?}", geometry);
    Ok(geometry)
}

/// Load geometry from a TOML file
pub fn load_geometry(path: &Path) -> Result<FlashGeometry, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_geometry(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_geometry() {
        let g = parse_geometry(
            r#"
            [geometry]
            base_address = "0x10000000"
            page_size = 2048
            block_size = 4096
            page_count = 32
            block_count = 16
            write_unit_size = 8
            data_flash_offset = 0x800000
            "#,
        )
        .unwrap();
        assert_eq!(g.block_size, 4096);
        assert_eq!(g.page_count, 32);
        assert_eq!(g.data_flash_offset, 0x80_0000);
    }

    #[test]
    fn derives_missing_count() {
        let g = parse_geometry(
            r#"
            [geometry]
            page_size = 1024
            block_size = 4096
            block_count = 4
            "#,
        )
        .unwrap();
        assert_eq!(g.page_count, 16);
    }

    #[test]
    fn defaults_when_empty() {
        let g = parse_geometry("[geometry]\n").unwrap();
        assert_eq!(g, FlashGeometry::S32K1XX_DFLASH);
    }

    #[test]
    fn rejects_invalid_geometry() {
        let err = parse_geometry(
            r#"
            [geometry]
            page_size = 2048
            block_size = 3000
            page_count = 1
            block_count = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = parse_geometry("[geometry]\nsector = 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parse_number_formats() {
        assert_eq!(parse_number("0x800000"), Ok(0x80_0000));
        assert_eq!(parse_number(" 4096 "), Ok(4096));
        assert!(parse_number("0xZZ").is_err());
    }
}
