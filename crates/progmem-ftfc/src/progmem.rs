//! FTFC program memory driver
//!
//! Implements [`Progmem`] on top of the command executor: sector erase with
//! an optional read-1s check, phrase programming with optional program
//! checks, the erased-page scan and controller initialization.

use progmem_core::error::ArgumentError;
use progmem_core::regs::{
    FCCOB4, FTFC_REG_CHECK_DATA, FTFC_REG_PHRASE_DATA, MSCM_BASE, MSCM_OCMDR_DFLASH_CACHE_OFF,
    MSCM_REG_OCMDR_DFLASH, PROGRAM_CHECK_UNIT,
};
use progmem_core::{
    CommandRequest, Error, FlashGeometry, HardwarePort, Opcode, Progmem, Result,
};

use crate::executor::Ftfc;
use crate::options::{ProgmemOptions, WriteVerifyPolicy};

/// Bytes read per chunk by the erased-page scan
const SCAN_CHUNK: usize = 64;

/// FTFC-backed program memory
pub struct FtfcProgmem<P> {
    ftfc: Ftfc<P>,
    geometry: FlashGeometry,
    options: ProgmemOptions,
}

impl<P: HardwarePort> FtfcProgmem<P> {
    /// Create a driver for `geometry` over `port`
    ///
    /// # Errors
    ///
    /// `InvalidGeometry` if the geometry violates one of its invariants.
    pub fn new(port: P, geometry: FlashGeometry, options: ProgmemOptions) -> Result<Self> {
        geometry.validate()?;
        let ftfc = Ftfc::new(port).with_polling(options.poll_limit, options.poll_interval_us);
        Ok(Self {
            ftfc,
            geometry,
            options,
        })
    }

    /// Create a driver for the S32K1xx data flash with default options
    pub fn s32k1xx(port: P) -> Self {
        let options = ProgmemOptions::default();
        Self {
            ftfc: Ftfc::new(port).with_polling(options.poll_limit, options.poll_interval_us),
            geometry: FlashGeometry::S32K1XX_DFLASH,
            options,
        }
    }

    /// Get the driver options
    pub fn options(&self) -> &ProgmemOptions {
        &self.options
    }

    /// Get the command executor
    pub fn ftfc(&self) -> &Ftfc<P> {
        &self.ftfc
    }

    /// Get the command executor mutably
    pub fn ftfc_mut(&mut self) -> &mut Ftfc<P> {
        &mut self.ftfc
    }

    /// Consume the driver and return the hardware port
    pub fn into_inner(self) -> P {
        self.ftfc.into_inner()
    }

    /// One-time controller setup
    ///
    /// Turns off the data flash read cache in the MSCM and issues the
    /// partition command. A part that is already partitioned rejects the
    /// command with an access error; that and any other failure is logged
    /// and otherwise ignored.
    pub fn initialize(&mut self) {
        self.ftfc.port_mut().write32(
            MSCM_BASE + MSCM_REG_OCMDR_DFLASH,
            MSCM_OCMDR_DFLASH_CACHE_OFF,
        );

        let partition = self.options.partition;
        let request =
            CommandRequest::with_parameters(Opcode::ProgramPartition, partition.parameters())
                .with_payload(FCCOB4, &partition.payload());

        match request.and_then(|req| self.ftfc.execute(&req)) {
            Ok(_) => log::info!("FlexNVM partitioned: {:?}", partition),
            Err(e @ Error::Io { .. }) => {
                log::warn!("Partition command rejected ({}); part may already be partitioned", e)
            }
            Err(e) => log::warn!("Flash controller initialization failed: {}", e),
        }
    }

    fn verify_section(&mut self, address: u32) -> Result<()> {
        let phrases = self.geometry.block_size / self.geometry.write_unit_size;
        let phrases = u16::try_from(phrases)
            .map_err(|_| Error::InvalidGeometry("erase block too large for section verify"))?;
        let [hi, lo] = phrases.to_be_bytes();

        let request = CommandRequest::addressed(Opcode::VerifySection, address)
            .with_payload(FCCOB4, &[hi, lo, self.options.margin_level])?;
        self.ftfc.execute(&request)?;
        Ok(())
    }

    /// Program check every 4-byte word of `chunk` programmed at `address`
    fn program_check(&mut self, address: u32, chunk: &[u8]) -> Result<()> {
        for (i, word) in chunk.chunks_exact(PROGRAM_CHECK_UNIT).enumerate() {
            let word_address = address + (i * PROGRAM_CHECK_UNIT) as u32;
            let request = CommandRequest::addressed(Opcode::ProgramCheck, word_address)
                .with_payload(FCCOB4, &[self.options.margin_level])?
                .with_data(FTFC_REG_CHECK_DATA, word)?;
            self.ftfc.execute(&request)?;
        }
        Ok(())
    }
}

impl<P: HardwarePort> Progmem for FtfcProgmem<P> {
    fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    fn erase_block(&mut self, block: u32) -> Result<usize> {
        let offset = block.wrapping_mul(self.geometry.block_size);
        let address = self.geometry.controller_address(offset);
        log::debug!("Erasing block {} (controller address {:#08x})", block, address);

        self.ftfc
            .execute(&CommandRequest::addressed(Opcode::EraseSector, address))?;

        if self.options.verify_after_erase {
            self.verify_section(address)?;
        }

        Ok(self.geometry.block_size as usize)
    }

    fn is_page_erased(&mut self, page: u32) -> Result<usize> {
        if page >= self.geometry.page_count {
            return Err(Error::InvalidArgument(ArgumentError::PageOutOfRange {
                page,
                page_count: self.geometry.page_count,
            }));
        }

        let erased = self.erase_state();
        let page_size = self.geometry.page_size as usize;
        let mut address = self.geometry.address_of(page);
        let mut scanned = 0;
        let mut buf = [0u8; SCAN_CHUNK];

        while scanned < page_size {
            let len = SCAN_CHUNK.min(page_size - scanned);
            self.ftfc.port_mut().read_memory(address, &mut buf[..len]);

            match buf[..len].iter().position(|&b| b != erased) {
                Some(pos) => return Ok(page_size - (scanned + pos)),
                None => {
                    scanned += len;
                    address = address.wrapping_add(len as u32);
                }
            }
        }

        Ok(0)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<usize> {
        let unit = self.geometry.write_unit_size as usize;
        if data.len() % unit != 0 {
            return Err(Error::InvalidArgument(ArgumentError::Misaligned {
                count: data.len(),
                unit: self.geometry.write_unit_size,
            }));
        }

        let offset = self.geometry.relative_offset(addr);
        self.geometry.check_range(offset, data.len())?;
        log::debug!("Writing {} bytes at offset {:#x}", data.len(), offset);

        let mut verify_failed = false;
        for (i, chunk) in data.chunks_exact(unit).enumerate() {
            let address = self
                .geometry
                .controller_address(offset + (i * unit) as u32);

            let request = CommandRequest::addressed(Opcode::ProgramPhrase, address)
                .with_data(FTFC_REG_PHRASE_DATA, chunk)?;
            self.ftfc.execute(&request)?;

            if !self.options.verify_after_write {
                continue;
            }
            match self.program_check(address, chunk) {
                Ok(()) => {}
                Err(e @ Error::Io { .. })
                    if self.options.write_verify_policy == WriteVerifyPolicy::Lenient =>
                {
                    log::warn!("Program check at {:#08x} failed: {}", address, e);
                    verify_failed = true;
                }
                Err(e) => return Err(e),
            }
        }

        if verify_failed {
            log::warn!("Write reported complete despite failed program checks");
        }
        Ok(data.len())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<usize> {
        let offset = self.geometry.relative_offset(addr);
        self.geometry.check_range(offset, buf.len())?;

        let address = self.geometry.base_address + offset;
        self.ftfc.port_mut().read_memory(address, buf);
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progmem_core::regs::{FSTAT_ACCERR, FSTAT_MGSTAT0, MARGIN_USER};
    use progmem_core::CommandFailure;
    use progmem_dummy::{DummyConfig, DummyFtfc};

    /// Block 4096, write unit 8, page 2048
    fn scenario_geometry() -> FlashGeometry {
        FlashGeometry {
            base_address: 0x1000_0000,
            page_size: 2048,
            block_size: 4096,
            page_count: 32,
            block_count: 16,
            write_unit_size: 8,
            data_flash_offset: 0x80_0000,
        }
    }

    fn driver(options: ProgmemOptions) -> FtfcProgmem<DummyFtfc> {
        let geometry = scenario_geometry();
        let dummy = DummyFtfc::new(DummyConfig {
            geometry,
            busy_polls: 3,
        });
        FtfcProgmem::new(dummy, geometry, options).unwrap()
    }

    fn dummy(dev: &FtfcProgmem<DummyFtfc>) -> &DummyFtfc {
        dev.ftfc().port()
    }

    fn dummy_mut(dev: &mut FtfcProgmem<DummyFtfc>) -> &mut DummyFtfc {
        dev.ftfc_mut().port_mut()
    }

    #[test]
    fn test_geometry_queries() {
        let dev = driver(ProgmemOptions::default());
        assert_eq!(dev.erase_block_count(), 16);
        assert!(dev.is_uniform());
        assert_eq!(dev.page_size(0), 2048);
        assert_eq!(dev.page_size(1_000_000), 2048);
        assert_eq!(dev.erase_size(7), 4096);
        assert_eq!(dev.page_of(0x1000_0800), 1);
        assert_eq!(dev.address_of(2), 0x1000_1000);
        assert_eq!(dev.erase_state(), 0xFF);
    }

    #[test]
    fn test_new_rejects_invalid_geometry() {
        let mut geometry = scenario_geometry();
        geometry.block_size = 3000;
        let result = FtfcProgmem::new(DummyFtfc::new_default(), geometry, ProgmemOptions::default());
        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_scenario() {
        let mut dev = driver(ProgmemOptions::default());
        dummy_mut(&mut dev).data_mut()[..4096].fill(0x00);

        assert_eq!(dev.erase_block(0).unwrap(), 4096);
        assert_eq!(dev.is_page_erased(0).unwrap(), 0);
        assert_eq!(dev.write(0x1000_0000, &[0x5A; 16]).unwrap(), 16);
        assert_eq!(
            dev.write(0x1000_0000, &[0x5A; 15]),
            Err(Error::InvalidArgument(ArgumentError::Misaligned {
                count: 15,
                unit: 8,
            }))
        );
    }

    #[test]
    fn test_erase_erases_whole_block() {
        let mut dev = driver(ProgmemOptions::default());
        dummy_mut(&mut dev).data_mut().fill(0x00);

        dev.erase_block(3).unwrap();

        let data = dummy(&dev).data();
        assert!(data[3 * 4096..4 * 4096].iter().all(|&b| b == 0xFF));
        assert!(data[2 * 4096..3 * 4096].iter().all(|&b| b == 0x00));
        assert_eq!(dev.is_page_erased(6).unwrap(), 0);
        assert_eq!(dev.is_page_erased(7).unwrap(), 0);
        assert_eq!(dev.is_page_erased(8).unwrap(), 2048);

        let history = dummy(&dev).history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].address, 0x80_3000);
    }

    #[test]
    fn test_erase_verify_issues_section_check() {
        let mut dev = driver(ProgmemOptions::default().with_verify_erase(true));
        dev.erase_block(1).unwrap();

        let history = dummy(&dev).history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].op(), Some(Opcode::VerifySection));
        assert_eq!(history[1].address, 0x80_1000);
        // 4096 / 8 phrases, then the margin level
        assert_eq!(&history[1].fccob[4..7], &[0x02, 0x00, MARGIN_USER]);
    }

    #[test]
    fn test_erase_verify_failure_is_io_error() {
        let mut dev = driver(ProgmemOptions::default().with_verify_erase(true));
        dummy_mut(&mut dev).fail_next(Some(Opcode::VerifySection), FSTAT_MGSTAT0);

        assert_eq!(
            dev.erase_block(0),
            Err(Error::Io {
                opcode: Opcode::VerifySection,
                failure: CommandFailure::OperationFailed,
            })
        );
    }

    #[test]
    fn test_erase_protected_block() {
        let mut dev = driver(ProgmemOptions::default());
        dummy_mut(&mut dev).protect_block(2);

        let err = dev.erase_block(2).unwrap_err();
        assert!(err.is_io());
        assert_eq!(err.errno(), -30);
    }

    #[test]
    fn test_is_page_erased_reports_remaining_bytes() {
        let mut dev = driver(ProgmemOptions::default());
        // Page 1 starts at 2048; first programmed byte 100 bytes in
        dummy_mut(&mut dev).data_mut()[2048 + 100] = 0x12;

        assert_eq!(dev.is_page_erased(0).unwrap(), 0);
        assert_eq!(dev.is_page_erased(1).unwrap(), 2048 - 100);

        dummy_mut(&mut dev).data_mut()[2 * 2048] = 0x00;
        assert_eq!(dev.is_page_erased(2).unwrap(), 2048);
    }

    #[test]
    fn test_is_page_erased_out_of_range() {
        let mut dev = driver(ProgmemOptions::default());
        let err = dev.is_page_erased(32).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidArgument(ArgumentError::PageOutOfRange {
                page: 32,
                page_count: 32,
            })
        );
        assert_eq!(err.errno(), -14);
        assert!(dev.is_page_erased(31).is_ok());
    }

    #[test]
    fn test_misaligned_write_touches_no_registers() {
        let mut dev = driver(ProgmemOptions::default());
        let err = dev.write(0x1000_0000, &[0u8; 12]).unwrap_err();

        assert!(err.is_invalid_argument());
        assert_eq!(err.errno(), -22);
        assert_eq!(dummy(&dev).register_writes(), 0);
        assert_eq!(dummy(&dev).fstat_reads(), 0);
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut dev = driver(ProgmemOptions::default());
        dev.erase_block(0).unwrap();

        let data: Vec<u8> = (0..32).collect();
        assert_eq!(dev.write(0x1000_0100, &data).unwrap(), 32);

        let mut buf = [0u8; 40];
        assert_eq!(dev.read(0x1000_0100, &mut buf).unwrap(), 40);
        assert_eq!(&buf[..32], data.as_slice());
        assert!(buf[32..].iter().all(|&b| b == 0xFF));

        // Base-relative addresses reach the same bytes
        let mut rel = [0u8; 8];
        dev.read(0x100, &mut rel).unwrap();
        assert_eq!(&rel, &data[..8]);

        assert_eq!(dev.is_page_erased(0).unwrap(), 2048 - 0x100);
    }

    #[test]
    fn test_write_spans_blocks() {
        let mut dev = driver(ProgmemOptions::default());
        dev.write(0x1000_0FF8, &[0xA5; 16]).unwrap();

        let history = dummy(&dev).history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].address, 0x80_0FF8);
        assert_eq!(history[1].address, 0x80_1000);
        assert_eq!(&dummy(&dev).data()[0xFF8..0x1008], &[0xA5; 16]);
    }

    #[test]
    fn test_write_out_of_range() {
        let mut dev = driver(ProgmemOptions::default());
        let err = dev.write(0x1000_0000 + 64 * 1024 - 8, &[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidArgument(ArgumentError::AddressOutOfRange { .. })
        ));
    }

    #[test]
    fn test_write_aborts_on_protection_violation() {
        let mut dev = driver(ProgmemOptions::default());
        // Third chunk lands in protected block 1
        dummy_mut(&mut dev).protect_block(1);

        let err = dev.write(0x1000_0FF0, &[0x00; 32]).unwrap_err();
        assert_eq!(
            err,
            Error::Io {
                opcode: Opcode::ProgramPhrase,
                failure: CommandFailure::ProtectionViolation,
            }
        );

        // Two chunks went through, the failing one was the last issued
        let history = dummy(&dev).history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].address, 0x80_1000);
        assert_eq!(&dummy(&dev).data()[0xFF0..0x1000], &[0x00; 16]);
        assert!(dummy(&dev).data()[0x1000..0x1010].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_write_verify_checks_each_word() {
        let mut dev = driver(ProgmemOptions::default().with_verify_write(true));
        dev.write(0x1000_0000, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        let history = dummy(&dev).history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].op(), Some(Opcode::ProgramCheck));
        assert_eq!(history[1].address, 0x80_0000);
        assert_eq!(history[1].fccob[4], MARGIN_USER);
        assert_eq!(history[1].registers::<4>(FTFC_REG_CHECK_DATA), [1, 2, 3, 4]);
        assert_eq!(history[2].address, 0x80_0004);
        assert_eq!(history[2].registers::<4>(FTFC_REG_CHECK_DATA), [5, 6, 7, 8]);
    }

    #[test]
    fn test_write_verify_mismatch_strict() {
        let mut dev = driver(ProgmemOptions::default().with_verify_write(true));
        // Programming cannot set bits, so the check sees 0x00 where 0xFF was asked for
        dummy_mut(&mut dev).data_mut()[0] = 0x00;

        assert_eq!(
            dev.write(0x1000_0000, &[0xFF; 8]),
            Err(Error::Io {
                opcode: Opcode::ProgramCheck,
                failure: CommandFailure::OperationFailed,
            })
        );
    }

    #[test]
    fn test_write_verify_mismatch_lenient() {
        let mut dev = driver(
            ProgmemOptions::default()
                .with_verify_write(true)
                .with_write_verify_policy(WriteVerifyPolicy::Lenient),
        );
        dummy_mut(&mut dev).data_mut()[0] = 0x00;

        assert_eq!(dev.write(0x1000_0000, &[0xFF; 16]).unwrap(), 16);
        // Both phrases still programmed and checked
        let programs = dummy(&dev)
            .history()
            .iter()
            .filter(|c| c.op() == Some(Opcode::ProgramPhrase))
            .count();
        assert_eq!(programs, 2);
    }

    #[test]
    fn test_lenient_policy_still_fails_on_program_error() {
        let mut dev = driver(
            ProgmemOptions::default()
                .with_verify_write(true)
                .with_write_verify_policy(WriteVerifyPolicy::Lenient),
        );
        dummy_mut(&mut dev).fail_next(Some(Opcode::ProgramPhrase), FSTAT_ACCERR);

        assert!(dev.write(0x1000_0000, &[0u8; 8]).unwrap_err().is_io());
    }

    #[test]
    fn test_stalled_controller_times_out() {
        let mut dev = driver(ProgmemOptions::default().with_polling(Some(100), 1));
        dummy_mut(&mut dev).stall_next_command();

        assert_eq!(
            dev.erase_block(0),
            Err(Error::Timeout {
                opcode: Some(Opcode::EraseSector),
            })
        );
        assert_eq!(dummy(&dev).delay_total_us(), 100);
    }

    #[test]
    fn test_initialize() {
        let mut dev = driver(ProgmemOptions::default());
        dev.initialize();

        assert_eq!(dummy(&dev).dflash_cache_control(), Some(0xc706_b030));
        assert_eq!(dummy(&dev).partition(), Some([0, 0, 0, 0x0f, 0x00]));
        let history = dummy(&dev).history();
        assert_eq!(history[0].op(), Some(Opcode::ProgramPartition));

        // Second call is rejected by the controller and only logged
        dev.initialize();
        assert_eq!(dummy(&dev).history().len(), 2);
        assert_eq!(dummy(&dev).history()[1].status, FSTAT_ACCERR);
    }

    #[test]
    fn test_initialize_on_stalled_controller() {
        let mut dev = driver(ProgmemOptions::default().with_polling(Some(4), 0));
        dummy_mut(&mut dev).stall_now();
        dev.initialize();
        assert_eq!(dummy(&dev).dflash_cache_control(), Some(0xc706_b030));
        assert!(dummy(&dev).history().is_empty());
        assert!(!dev.ftfc_mut().status().completed());
    }

    #[test]
    fn test_s32k1xx_defaults() {
        let mut dev = FtfcProgmem::s32k1xx(DummyFtfc::new_default());
        assert_eq!(dev.erase_block_count(), 32);
        assert_eq!(dev.erase_block(31).unwrap(), 2048);
        assert_eq!(dummy(&dev).history()[0].address, 0x80_F800);
    }
}
