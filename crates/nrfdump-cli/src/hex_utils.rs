//! Hex address parsing for command-line arguments.

use anyhow::Result;

/// Parse a 32-bit hex address string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u32> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(s, 16).map_err(|e| anyhow::anyhow!("Invalid hex address: {}", e))
}
