//! OpenOCD telnet command vocabulary and response grammar.
//!
//! The grammar is deliberately narrow. Anything that does not match is
//! reported by the caller as [`Error::ProtocolParse`](crate::Error::ProtocolParse)
//! instead of being interpreted loosely.
//!
//! ```text
//! > mdw 0x10001004
//! 0x10001004: ffffff00
//! > reg r3
//! r3 (/32): 0x10001004
//! > reg
//! ===== arm v7m registers
//! (0) r0 (/32): 0x00000000
//! ...
//! (13) sp (/32): 0x20000400
//! ```

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::registers::Register;

/// Version tag of the response grammar below.
pub const GRAMMAR_VERSION: &str = "openocd-telnet/1";

/// Prompt terminating every OpenOCD telnet response.
pub const DEFAULT_PROMPT: &str = "> ";

static HEX_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x([0-9A-Fa-f]+)").expect("static regex"));

static MEMORY_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^0x[0-9A-Fa-f]+: ([0-9A-Fa-f]+)").expect("static regex"));

static REGISTER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\) (r[0-9]{1,2}|sp) \(").expect("static regex"));

/// Commands understood by the debug server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ResetHalt,
    ReadMemoryWord(u32),
    ReadRegisters,
    ReadRegister(Register),
    WriteRegister(Register, u32),
    Step,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResetHalt => write!(f, "reset halt"),
            Self::ReadMemoryWord(addr) => write!(f, "mdw 0x{:08x}", addr),
            Self::ReadRegisters => write!(f, "reg"),
            Self::ReadRegister(reg) => write!(f, "reg {}", reg),
            Self::WriteRegister(reg, value) => write!(f, "reg {} 0x{:08x}", reg, value),
            Self::Step => write!(f, "step"),
        }
    }
}

/// Parse the first `0x`-prefixed hex literal in a response.
pub fn parse_hex_literal(response: &str) -> Option<u32> {
    HEX_LITERAL
        .captures(response)
        .and_then(|caps| u32::from_str_radix(&caps[1], 16).ok())
}

/// Parse the first word of an `mdw` response (`0x<addr>: <value>` at line start).
pub fn parse_memory_word(response: &str) -> Option<u32> {
    MEMORY_WORD
        .captures(response)
        .and_then(|caps| u32::from_str_radix(&caps[1], 16).ok())
}

/// General-purpose and stack pointer lines of a `reg` listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterDump {
    text: String,
    entries: Vec<(Register, Option<u32>)>,
}

impl RegisterDump {
    /// Keep only the lines naming `r0`..`r12` or `sp`.
    pub fn parse(response: &str) -> Self {
        let mut text = String::new();
        let mut entries = Vec::new();

        for line in response.lines() {
            let Some(caps) = REGISTER_LINE.captures(line) else {
                continue;
            };
            text.push_str(line);
            text.push('\n');

            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let rest = caps.get(0).map(|m| &line[m.end()..]).unwrap_or_default();
            if let Ok(reg) = name.parse::<Register>() {
                entries.push((reg, parse_hex_literal(rest)));
            }
        }

        Self { text, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The filtered listing, one register per line.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn entries(&self) -> &[(Register, Option<u32>)] {
        &self.entries
    }

    pub fn get(&self, reg: Register) -> Option<u32> {
        self.entries
            .iter()
            .find(|(r, _)| *r == reg)
            .and_then(|(_, v)| *v)
    }

    /// First register, in listing order, currently printed with `value`.
    ///
    /// This cannot tell a genuine load apart from a register that holds
    /// `value` for any other reason.
    pub fn find_value(&self, value: u32) -> Option<Register> {
        self.entries
            .iter()
            .find(|(_, v)| *v == Some(value))
            .map(|(r, _)| *r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REG_LISTING: &str = "reg\r\n\
===== arm v7m registers\r\n\
(0) r0 (/32): 0x10001004\r\n\
(1) r1 (/32): 0x10001004\r\n\
(2) r2 (/32): 0x10001004\r\n\
(3) r3 (/32): 0xFFFFFF00\r\n\
(10) r10 (/32): 0x00000000\r\n\
(13) sp (/32): 0x10001004\r\n\
(14) lr (/32): 0xFFFFFFFF\r\n\
(15) pc (/32): 0x000114CC\r\n\
(16) xPSR (/32): 0xC1000000\r\n";

    #[test]
    fn test_command_text() {
        assert_eq!(Command::ResetHalt.to_string(), "reset halt");
        assert_eq!(
            Command::ReadMemoryWord(0x10001004).to_string(),
            "mdw 0x10001004"
        );
        assert_eq!(Command::ReadRegister(Register::Pc).to_string(), "reg pc");
        assert_eq!(
            Command::WriteRegister(Register::R5, 0x1000).to_string(),
            "reg r5 0x00001000"
        );
        assert_eq!(Command::ReadRegisters.to_string(), "reg");
        assert_eq!(Command::Step.to_string(), "step");
    }

    #[test]
    fn test_parse_hex_literal() {
        assert_eq!(parse_hex_literal("pc (/32): 0x000114cc"), Some(0x114CC));
        assert_eq!(parse_hex_literal("r0 (/32): 0xDEADBEEF (dirty)"), Some(0xDEADBEEF));
        assert_eq!(parse_hex_literal("target not halted"), None);
        assert_eq!(parse_hex_literal("0x1ffffffff"), None);
    }

    #[test]
    fn test_parse_memory_word() {
        assert_eq!(
            parse_memory_word("mdw 0x10001004\r\n0x10001004: ffffff00 \r\n"),
            Some(0xFFFFFF00)
        );
        assert_eq!(parse_memory_word("error reading memory"), None);
        assert_eq!(parse_memory_word("mdw 0x0\nError: Failed to read memory"), None);
    }

    #[test]
    fn test_register_dump_filters_lines() {
        let dump = RegisterDump::parse(REG_LISTING);
        assert_eq!(dump.entries().len(), 6);
        assert!(!dump.text().contains("pc"));
        assert!(!dump.text().contains("lr"));
        assert!(dump.text().contains("(13) sp (/32)"));
        assert_eq!(dump.get(Register::R3), Some(0xFFFFFF00));
        assert_eq!(dump.get(Register::Pc), None);
    }

    #[test]
    fn test_register_dump_find_value() {
        let dump = RegisterDump::parse(REG_LISTING);
        assert_eq!(dump.find_value(0xFFFFFF00), Some(Register::R3));
        assert_eq!(dump.find_value(0x10001004), Some(Register::R0));
        assert_eq!(dump.find_value(0xFFFFFFFF), None);
    }

    #[test]
    fn test_two_digit_register_name() {
        let dump = RegisterDump::parse("(10) r10 (/32): 0x0000abcd\n");
        assert_eq!(dump.find_value(0xABCD), Some(Register::R10));
    }

    #[test]
    fn test_register_dump_empty() {
        assert!(RegisterDump::parse("target not halted\n").is_empty());
    }
}
