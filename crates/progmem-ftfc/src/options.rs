//! Driver options
//!
//! Runtime switches for the verify passes, the completion poll budget and
//! the partition parameters used by [`crate::FtfcProgmem::initialize`].

use core::fmt;

use progmem_core::regs::{MARGIN_FACTORY, MARGIN_USER};

/// Default number of FSTAT polls before a wait gives up
///
/// A sector erase on S32K1xx takes a few milliseconds; with no poll delay
/// this is several orders of magnitude above the worst case.
pub const DEFAULT_POLL_LIMIT: u32 = 4_000_000;

/// What to do when the program check after a write reports a mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteVerifyPolicy {
    /// Fail the write with an I/O error
    #[default]
    Strict,
    /// Log a warning and still report the full byte count
    Lenient,
}

impl WriteVerifyPolicy {
    /// Parse from a string
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("strict") {
            Some(Self::Strict)
        } else if s.eq_ignore_ascii_case("lenient") {
            Some(Self::Lenient)
        } else {
            None
        }
    }
}

/// Parameters of the one-time partition command
///
/// Loaded into FCCOB1..FCCOB5 in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionConfig {
    /// CSEc key storage size code
    pub csec_key_size: u8,
    /// Security flag extension
    pub sfe: u8,
    /// FlexRAM load option after reset
    pub flexram_load: u8,
    /// EEPROM data set size code
    pub eeprom_size: u8,
    /// FlexNVM partition code
    pub flexnvm_partition: u8,
}

impl PartitionConfig {
    /// All of FlexNVM as data flash, no emulated EEPROM
    pub const DATA_FLASH_ONLY: Self = Self {
        csec_key_size: 0x00,
        sfe: 0x00,
        flexram_load: 0x00,
        eeprom_size: 0x0f,
        flexnvm_partition: 0x00,
    };

    /// FCCOB1..FCCOB3
    pub fn parameters(&self) -> [u8; 3] {
        [self.csec_key_size, self.sfe, self.flexram_load]
    }

    /// FCCOB4..FCCOB5
    pub fn payload(&self) -> [u8; 2] {
        [self.eeprom_size, self.flexnvm_partition]
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::DATA_FLASH_ONLY
    }
}

/// Error from parsing driver options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    /// The value of a known key could not be parsed
    InvalidValue {
        /// Option key
        key: &'static str,
        /// What the key accepts
        expected: &'static str,
    },
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, expected } => {
                write!(f, "invalid value for option '{}' (expected {})", key, expected)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OptionError {}

/// Options for the FTFC driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgmemOptions {
    /// Run a read-1s section check after every sector erase
    pub verify_after_erase: bool,
    /// Run program checks after every programmed phrase
    pub verify_after_write: bool,
    /// How a failed program check is reported
    pub write_verify_policy: WriteVerifyPolicy,
    /// Margin level passed to the verify commands
    pub margin_level: u8,
    /// Maximum FSTAT polls per wait, `None` to wait forever
    pub poll_limit: Option<u32>,
    /// Delay between polls in microseconds
    pub poll_interval_us: u32,
    /// Partition parameters for initialization
    pub partition: PartitionConfig,
}

impl Default for ProgmemOptions {
    fn default() -> Self {
        Self {
            verify_after_erase: false,
            verify_after_write: false,
            write_verify_policy: WriteVerifyPolicy::Strict,
            margin_level: MARGIN_USER,
            poll_limit: Some(DEFAULT_POLL_LIMIT),
            poll_interval_us: 0,
            partition: PartitionConfig::default(),
        }
    }
}

impl ProgmemOptions {
    /// Enable or disable the erase verify pass
    pub fn with_verify_erase(mut self, enable: bool) -> Self {
        self.verify_after_erase = enable;
        self
    }

    /// Enable or disable the write verify pass
    pub fn with_verify_write(mut self, enable: bool) -> Self {
        self.verify_after_write = enable;
        self
    }

    /// Set the write verify policy
    pub fn with_write_verify_policy(mut self, policy: WriteVerifyPolicy) -> Self {
        self.write_verify_policy = policy;
        self
    }

    /// Set the poll budget and interval
    pub fn with_polling(mut self, limit: Option<u32>, interval_us: u32) -> Self {
        self.poll_limit = limit;
        self.poll_interval_us = interval_us;
        self
    }

    /// Set the partition parameters
    pub fn with_partition(mut self, partition: PartitionConfig) -> Self {
        self.partition = partition;
        self
    }

    /// Parse options from key-value pairs (from CLI)
    ///
    /// Supported options:
    /// - verify_erase=on|off
    /// - verify_write=on|off
    /// - verify_policy=strict|lenient
    /// - margin=0|1|2 (normal, user, factory)
    /// - poll_limit=<n>|none
    /// - poll_interval_us=<n>
    pub fn from_options(options: &[(&str, &str)]) -> Result<Self, OptionError> {
        let mut opts = Self::default();

        for (key, value) in options {
            match *key {
                "verify_erase" => {
                    opts.verify_after_erase = parse_bool(value).ok_or(OptionError::InvalidValue {
                        key: "verify_erase",
                        expected: "on or off",
                    })?;
                }
                "verify_write" => {
                    opts.verify_after_write = parse_bool(value).ok_or(OptionError::InvalidValue {
                        key: "verify_write",
                        expected: "on or off",
                    })?;
                }
                "verify_policy" => {
                    opts.write_verify_policy =
                        WriteVerifyPolicy::parse(value).ok_or(OptionError::InvalidValue {
                            key: "verify_policy",
                            expected: "strict or lenient",
                        })?;
                }
                "margin" => {
                    opts.margin_level = value
                        .parse()
                        .ok()
                        .filter(|&level| level <= MARGIN_FACTORY)
                        .ok_or(OptionError::InvalidValue {
                            key: "margin",
                            expected: "a margin level from 0 to 2",
                        })?;
                }
                "poll_limit" => {
                    opts.poll_limit = if value.eq_ignore_ascii_case("none") {
                        None
                    } else {
                        Some(value.parse().map_err(|_| OptionError::InvalidValue {
                            key: "poll_limit",
                            expected: "a poll count or none",
                        })?)
                    };
                }
                "poll_interval_us" => {
                    opts.poll_interval_us =
                        value.parse().map_err(|_| OptionError::InvalidValue {
                            key: "poll_interval_us",
                            expected: "microseconds",
                        })?;
                }
                _ => {
                    log::warn!("Unknown progmem option: {}={}", key, value);
                }
            }
        }

        Ok(opts)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "on" | "yes" | "true" => Some(true),
        "0" | "off" | "no" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ProgmemOptions::default();
        assert!(!opts.verify_after_erase);
        assert!(!opts.verify_after_write);
        assert_eq!(opts.write_verify_policy, WriteVerifyPolicy::Strict);
        assert_eq!(opts.margin_level, 1);
        assert_eq!(opts.poll_limit, Some(DEFAULT_POLL_LIMIT));
        assert_eq!(opts.partition.parameters(), [0, 0, 0]);
        assert_eq!(opts.partition.payload(), [0x0f, 0x00]);
    }

    #[test]
    fn test_from_options() {
        let opts = ProgmemOptions::from_options(&[
            ("verify_erase", "on"),
            ("verify_write", "1"),
            ("verify_policy", "Lenient"),
            ("margin", "2"),
            ("poll_limit", "none"),
            ("poll_interval_us", "10"),
            ("unknown", "x"),
        ])
        .unwrap();

        assert!(opts.verify_after_erase);
        assert!(opts.verify_after_write);
        assert_eq!(opts.write_verify_policy, WriteVerifyPolicy::Lenient);
        assert_eq!(opts.margin_level, 2);
        assert_eq!(opts.poll_limit, None);
        assert_eq!(opts.poll_interval_us, 10);
    }

    #[test]
    fn test_from_options_rejects_bad_values() {
        let err = ProgmemOptions::from_options(&[("verify_policy", "maybe")]).unwrap_err();
        assert_eq!(
            err,
            OptionError::InvalidValue {
                key: "verify_policy",
                expected: "strict or lenient",
            }
        );
        assert!(ProgmemOptions::from_options(&[("poll_limit", "-1")]).is_err());
        assert!(ProgmemOptions::from_options(&[("verify_erase", "sometimes")]).is_err());
    }

    #[test]
    fn test_margin_above_factory_is_rejected() {
        let normal = ProgmemOptions::from_options(&[("margin", "0")]).unwrap();
        assert_eq!(normal.margin_level, 0);

        let err = ProgmemOptions::from_options(&[("margin", "3")]).unwrap_err();
        assert_eq!(
            err,
            OptionError::InvalidValue {
                key: "margin",
                expected: "a margin level from 0 to 2",
            }
        );
        assert!(ProgmemOptions::from_options(&[("margin", "255")]).is_err());
        assert!(ProgmemOptions::from_options(&[("margin", "user")]).is_err());
    }
}
