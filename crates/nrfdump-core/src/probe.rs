//! Register and memory access on a halted target.

use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{self, Command, RegisterDump};
use crate::registers::{GENERAL, Register};
use crate::session::{Session, Transport};

/// Typed commands on top of a [`Session`].
pub struct Probe<T: Transport> {
    session: Session<T>,
}

impl<T: Transport> Probe<T> {
    pub fn new(session: Session<T>) -> Self {
        Self { session }
    }

    fn send(&mut self, command: Command) -> Result<String> {
        self.session.command(&command.to_string())
    }

    fn parse_error(&self, command: Command, expected: &'static str) -> Error {
        Error::ProtocolParse {
            command: command.to_string(),
            expected,
            response: self.session.last_response().to_string(),
        }
    }

    pub fn reset_halt(&mut self) -> Result<()> {
        self.send(Command::ResetHalt)?;
        Ok(())
    }

    /// Read one word with `mdw`.
    pub fn read_memory_word(&mut self, address: u32) -> Result<u32> {
        let command = Command::ReadMemoryWord(address);
        let response = self.send(command)?;
        protocol::parse_memory_word(&response)
            .ok_or_else(|| self.parse_error(command, "`0x<addr>: <hex>`"))
    }

    /// Read one register; a response without a hex literal is a protocol error.
    pub fn read_register(&mut self, reg: Register) -> Result<u32> {
        let command = Command::ReadRegister(reg);
        let response = self.send(command)?;
        let value = protocol::parse_hex_literal(&response)
            .ok_or_else(|| self.parse_error(command, "0x-prefixed hex literal"))?;
        trace!("{} = 0x{:08X}", reg, value);
        Ok(value)
    }

    /// Write one register. Only the prompt is awaited; no acknowledgement is checked.
    pub fn write_register(&mut self, reg: Register, value: u32) -> Result<()> {
        self.send(Command::WriteRegister(reg, value))?;
        Ok(())
    }

    /// Full `reg` listing, filtered to `r0`..`r12` and `sp`.
    pub fn read_all_registers(&mut self) -> Result<RegisterDump> {
        let command = Command::ReadRegisters;
        let response = self.send(command)?;
        let dump = RegisterDump::parse(&response);
        if dump.is_empty() {
            return Err(self.parse_error(command, "general-purpose register listing"));
        }
        Ok(dump)
    }

    /// Set every general-purpose register and `sp` to `value`.
    pub fn set_all_registers(&mut self, value: u32) -> Result<()> {
        for reg in GENERAL {
            self.write_register(reg, value)?;
        }
        Ok(())
    }

    /// Point `pc` at `address` and execute exactly one instruction.
    pub fn step_at(&mut self, address: u32) -> Result<()> {
        self.write_register(Register::Pc, address)?;
        self.send(Command::Step)?;
        Ok(())
    }

    pub fn into_session(self) -> Session<T> {
        self.session
    }
}

#[cfg(test)]
pub(crate) fn mock_probe(transport: crate::session::MockTransport) -> Probe<crate::session::MockTransport> {
    use crate::protocol::DEFAULT_PROMPT;
    use crate::session::SyncMode;

    Probe::new(Session::new(transport, DEFAULT_PROMPT, SyncMode::Prompt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MockTransport;
    use strum::IntoEnumIterator;

    #[test]
    fn test_register_round_trip() {
        let mut probe = mock_probe(MockTransport::new(0));
        for (i, reg) in Register::iter().enumerate() {
            let value = 0x1000_0000 + i as u32 * 0x11;
            probe.write_register(reg, value).unwrap();
            assert_eq!(probe.read_register(reg).unwrap(), value);
        }
    }

    #[test]
    fn test_read_register_without_hex_fails() {
        let mut probe = mock_probe(MockTransport::new(0).fail_register_reads());
        let err = probe.read_register(Register::Pc).unwrap_err();
        match err {
            Error::ProtocolParse {
                command, response, ..
            } => {
                assert_eq!(command, "reg pc");
                assert!(response.contains("target not halted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_read_memory_word() {
        let mut probe = mock_probe(MockTransport::new(0).with_word(0x10001004, 0xFFFFFF00));
        assert_eq!(probe.read_memory_word(0x10001004).unwrap(), 0xFFFFFF00);
    }

    #[test]
    fn test_set_all_registers_skips_pc() {
        let mut probe = mock_probe(MockTransport::new(0x114CC));
        probe.set_all_registers(0x10001004).unwrap();
        let dump = probe.read_all_registers().unwrap();
        for reg in GENERAL {
            assert_eq!(dump.get(reg), Some(0x10001004));
        }
        assert_eq!(probe.read_register(Register::Pc).unwrap(), 0x114CC);
    }

    #[test]
    fn test_step_at_executes_instruction() {
        let transport = MockTransport::new(0)
            .with_word(0x2000, 0xCAFEBABE)
            .with_load(0x100, Register::R1, Register::R2);
        let mut probe = mock_probe(transport);
        probe.write_register(Register::R1, 0x2000).unwrap();
        probe.step_at(0x100).unwrap();
        assert_eq!(probe.read_register(Register::R2).unwrap(), 0xCAFEBABE);
        assert_eq!(probe.read_register(Register::Pc).unwrap(), 0x102);
    }
}
