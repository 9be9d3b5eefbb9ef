//! FTFC command executor
//!
//! Every controller command follows the same sequence:
//!
//! 1. wait until CCIF reports the controller idle
//! 2. clear stale FPVIOL/ACCERR/RDCOLERR flags (write-1-to-clear)
//! 3. load the opcode and address into FCCOB0..FCCOB3
//! 4. load the parameter payload into the following FCCOB slots, then any
//!    flash data in address order at its raw register offset
//! 5. launch by writing CCIF, then wait for it to be set again
//! 6. decode FSTAT
//!
//! [`Ftfc`] owns the hardware port, so holding `&mut Ftfc` for the duration
//! of [`Ftfc::execute`] is what keeps two commands from interleaving.

use progmem_core::regs::{self, FCCOB0, FCCOB1, FTFC_BASE, FTFC_REG_FSTAT};
use progmem_core::{CommandRequest, CommandStatus, Error, HardwarePort, Opcode, Result};

const FSTAT: u32 = FTFC_BASE + FTFC_REG_FSTAT;

/// FTFC command executor
pub struct Ftfc<P> {
    port: P,
    /// Maximum FSTAT polls per wait, `None` to wait forever
    poll_limit: Option<u32>,
    /// Delay passed to the port between polls
    poll_interval_us: u32,
}

impl<P: HardwarePort> Ftfc<P> {
    /// Create an executor that waits forever for completion
    pub fn new(port: P) -> Self {
        Self {
            port,
            poll_limit: None,
            poll_interval_us: 0,
        }
    }

    /// Bound each completion wait to `limit` polls, `interval_us` apart
    pub fn with_polling(mut self, limit: Option<u32>, interval_us: u32) -> Self {
        self.poll_limit = limit;
        self.poll_interval_us = interval_us;
        self
    }

    /// Get a reference to the hardware port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the hardware port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the executor and return the hardware port
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Current FSTAT contents
    pub fn status(&mut self) -> CommandStatus {
        CommandStatus::from_fstat(self.port.read8(FSTAT))
    }

    /// Poll FSTAT until CCIF is set and return the final status
    ///
    /// `opcode` names the command being waited on for the timeout error.
    pub fn wait_ready(&mut self, opcode: Option<Opcode>) -> Result<CommandStatus> {
        let mut polls: u32 = 0;

        loop {
            let status = self.status();
            if status.completed() {
                return Ok(status);
            }

            if let Some(limit) = self.poll_limit {
                if polls >= limit {
                    log::debug!("FTFC still busy after {} polls", polls);
                    return Err(Error::Timeout { opcode });
                }
            }

            polls = polls.saturating_add(1);
            self.port.delay_us(self.poll_interval_us);
        }
    }

    /// Run one command to completion
    ///
    /// # Errors
    ///
    /// * `Timeout` - the controller never became idle, before or after launch
    /// * `Io` - FSTAT reported a failure after the command completed
    pub fn execute(&mut self, request: &CommandRequest) -> Result<CommandStatus> {
        let opcode = request.opcode;
        log::trace!(
            "FTFC {} addr={:#08x} payload={:02x?} data={:02x?}",
            opcode.name(),
            request.target_address(),
            request.payload.as_slice(),
            request.data.as_slice()
        );

        self.wait_ready(None)?;

        self.port.write8(FSTAT, regs::FSTAT_CLEARABLE);

        self.write_fccob(FCCOB0, opcode.code());
        for (i, &byte) in request.address.iter().enumerate() {
            self.write_fccob(FCCOB1 + i, byte);
        }
        for (i, &byte) in request.payload.iter().enumerate() {
            self.write_fccob(request.payload_offset + i, byte);
        }
        for (j, &byte) in request.data.iter().enumerate() {
            self.port
                .write8(FTFC_BASE + request.data_offset + j as u32, byte);
        }

        self.port.write8(FSTAT, regs::FSTAT_CCIF);

        let status = self.wait_ready(Some(opcode))?;
        status.check(opcode).inspect_err(|e| {
            log::debug!("FTFC {} failed: FSTAT={:#04x} ({})", opcode.name(), status.bits(), e);
        })
    }

    fn write_fccob(&mut self, index: usize, value: u8) {
        self.port
            .write8(FTFC_BASE + regs::fccob_offset(index), value);
    }
}
