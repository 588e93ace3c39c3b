//! Dump file with a completion marker.
//!
//! Words are written to `<output>.part`. Only a finished dump is renamed to
//! `<output>`, so the final name never holds a truncated image. Next to the
//! `.part` file, `<output>.part.json` records the range and gadget it was
//! written with; a `.part` file is only resumed by a run with the same ones.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dump::{DumpRange, WORD_SIZE, sink::BinarySink};
use crate::error::{Error, Result};
use crate::gadget::Gadget;

/// What a `.part` file was written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpCheckpoint {
    pub from: u32,
    pub to: u32,
    pub gadget: Gadget,
}

impl DumpCheckpoint {
    pub fn new(range: DumpRange, gadget: Gadget) -> Self {
        Self {
            from: range.from(),
            to: range.to(),
            gadget,
        }
    }

    fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub struct DumpFile {
    final_path: PathBuf,
    part_path: PathBuf,
    range: DumpRange,
    words_present: u64,
    sink: BinarySink<BufWriter<File>>,
}

impl DumpFile {
    /// Path of the in-progress file for `path`.
    pub fn part_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".part");
        PathBuf::from(name)
    }

    /// Path of the checkpoint describing the `.part` file.
    pub fn checkpoint_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".part.json");
        PathBuf::from(name)
    }

    /// Start a new dump of `range`, discarding any previous `.part` file.
    pub fn create(path: &Path, range: DumpRange, gadget: Gadget) -> Result<Self> {
        let part_path = Self::part_path(path);
        let file = File::create(&part_path)?;
        DumpCheckpoint::new(range, gadget).save(&Self::checkpoint_path(path))?;
        Ok(Self::from_file(path, part_path, range, file, 0))
    }

    /// Continue an existing `.part` file, or start one if there is none.
    ///
    /// The `.part` file must have been written for the same range and gadget
    /// and must not be longer than the range. A trailing partial word is
    /// truncated away.
    pub fn resume(path: &Path, range: DumpRange, gadget: Gadget) -> Result<Self> {
        let part_path = Self::part_path(path);
        let len = match fs::metadata(&part_path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if len == 0 {
            debug!("Nothing to resume at {}", part_path.display());
            return Self::create(path, range, gadget);
        }

        let mismatch = |reason: String| Error::DumpMismatch {
            path: part_path.display().to_string(),
            reason,
        };

        let expected = DumpCheckpoint::new(range, gadget);
        match DumpCheckpoint::load(&Self::checkpoint_path(path))? {
            None => return Err(mismatch("no checkpoint recorded for it".to_string())),
            Some(found) if found != expected => {
                return Err(mismatch(format!(
                    "written for 0x{:08X}..=0x{:08X} with gadget at 0x{:08X}",
                    found.from, found.to, found.gadget.instruction_address
                )));
            }
            Some(_) => {}
        }
        if len > range.byte_len() {
            return Err(mismatch(format!(
                "{} bytes present, range holds {}",
                len,
                range.byte_len()
            )));
        }

        let mut file = OpenOptions::new().write(true).open(&part_path)?;
        let words_present = len / u64::from(WORD_SIZE);
        file.set_len(words_present * u64::from(WORD_SIZE))?;
        file.seek(SeekFrom::End(0))?;

        info!(
            "Resuming {} ({} words already present)",
            part_path.display(),
            words_present
        );
        Ok(Self::from_file(path, part_path, range, file, words_present))
    }

    fn from_file(
        path: &Path,
        part_path: PathBuf,
        range: DumpRange,
        file: File,
        words_present: u64,
    ) -> Self {
        Self {
            final_path: path.to_path_buf(),
            part_path,
            range,
            words_present,
            sink: BinarySink::new(BufWriter::new(file)),
        }
    }

    /// Words already on disk before this run.
    pub fn words_present(&self) -> u64 {
        self.words_present
    }

    /// The part of the range not yet on disk, or `None` if it is complete.
    pub fn remaining(&self) -> Option<DumpRange> {
        self.range.skip_words(self.words_present)
    }

    pub fn sink(&mut self) -> &mut BinarySink<BufWriter<File>> {
        &mut self.sink
    }

    /// Flush and rename `.part` to the final name.
    ///
    /// Fails, leaving the `.part` file in place, unless it holds exactly the
    /// whole range.
    pub fn commit(self) -> Result<PathBuf> {
        let mut writer = self.sink.into_inner();
        writer.flush()?;
        let len = writer.get_ref().metadata()?.len();
        drop(writer);

        if len != self.range.byte_len() {
            return Err(Error::DumpMismatch {
                path: self.part_path.display().to_string(),
                reason: format!(
                    "{} bytes written, range holds {}",
                    len,
                    self.range.byte_len()
                ),
            });
        }

        fs::rename(&self.part_path, &self.final_path)?;
        if let Err(e) = fs::remove_file(Self::checkpoint_path(&self.final_path)) {
            debug!("No checkpoint to remove: {}", e);
        }
        Ok(self.final_path)
    }
}
