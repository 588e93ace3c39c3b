//! Destinations for dumped words.

use std::io::Write;

use crate::error::Result;

/// Receives words in strictly increasing address order.
pub trait WordSink {
    fn write_word(&mut self, address: u32, value: u32) -> Result<()>;

    /// Called once after the last word, and before an early return.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Raw little-endian words, no header.
pub struct BinarySink<W: Write> {
    writer: W,
}

impl<W: Write> BinarySink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> WordSink for BinarySink<W> {
    fn write_word(&mut self, _address: u32, value: u32) -> Result<()> {
        self.writer.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One `0x<address>: 0x<value>` line per word.
pub struct ConsoleSink<W: Write> {
    writer: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> WordSink for ConsoleSink<W> {
    fn write_word(&mut self, address: u32, value: u32) -> Result<()> {
        writeln!(self.writer, "0x{:08X}: 0x{:08X}", address, value)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_sink_little_endian() {
        let mut sink = BinarySink::new(Vec::new());
        sink.write_word(0, 0x0403_0201).unwrap();
        sink.write_word(4, 0xDEAD_BEEF).unwrap();
        assert_eq!(sink.into_inner(), [1, 2, 3, 4, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_console_sink_format() {
        let mut out = Vec::new();
        let mut sink = ConsoleSink::new(&mut out);
        sink.write_word(0x1000, 0x1001).unwrap();
        sink.flush().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "0x00001000: 0x00001001\n");
    }
}
