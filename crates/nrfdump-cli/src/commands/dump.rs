//! Dump command implementation.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use nrfdump_core::{
    Config, ConsoleSink, DumpEngine, DumpFile, DumpRange, Gadget, GadgetRecord, KnownMarker,
    Probe, Transport, WORD_SIZE,
};
use tracing::info;

use super::find::{discover_gadget, print_status};
use crate::shutdown::ShutdownSignal;

pub struct DumpOptions {
    pub from: u32,
    pub to: u32,
    pub output: Option<PathBuf>,
    pub resume: bool,
    pub gadget_file: PathBuf,
    pub rescan: bool,
}

/// Run the dump command
pub fn run(config: &Config, options: &DumpOptions, shutdown: &ShutdownSignal) -> Result<()> {
    let range = DumpRange::new(options.from, options.to)?;
    let mut probe = nrfdump_core::connect(config)?;

    let (marker, gadget) = load_or_discover(&mut probe, config, options, shutdown)?;
    print_status(marker, gadget);

    match options.output.as_deref() {
        Some(path) => dump_to_file(&mut probe, gadget, range, path, options.resume, config, shutdown),
        None => {
            let stdout = io::stdout();
            let mut sink = ConsoleSink::new(stdout.lock());
            DumpEngine::new(&mut probe, gadget)
                .with_progress_interval(config.progress_interval)
                .run(range, &mut sink, shutdown.as_atomic())?;
            Ok(())
        }
    }
}

/// Reuse the gadget file when it matches the target, otherwise search and save
fn load_or_discover<T: Transport>(
    probe: &mut Probe<T>,
    config: &Config,
    options: &DumpOptions,
    shutdown: &ShutdownSignal,
) -> Result<(KnownMarker, Gadget)> {
    if !options.rescan {
        if let Some(record) = GadgetRecord::load_from_path(&options.gadget_file) {
            if record.marker.address == config.marker_address && record.matches_target(probe)? {
                info!("Using gadget from {}", options.gadget_file.display());
                return Ok((record.marker, record.gadget));
            }
            info!("Gadget file does not match this target, searching again");
        }
    }

    let (marker, gadget) = discover_gadget(probe, config, shutdown)?;
    GadgetRecord::new(marker, gadget)
        .save(&options.gadget_file)
        .with_context(|| format!("Failed to save {}", options.gadget_file.display()))?;
    Ok((marker, gadget))
}

fn dump_to_file<T: Transport>(
    probe: &mut Probe<T>,
    gadget: Gadget,
    range: DumpRange,
    path: &Path,
    resume: bool,
    config: &Config,
    shutdown: &ShutdownSignal,
) -> Result<()> {
    let mut file = if resume {
        DumpFile::resume(path, range, gadget)
            .context("Cannot resume; remove the .part file or run without --resume")?
    } else {
        DumpFile::create(path, range, gadget)?
    };

    let Some(remaining) = file.remaining() else {
        let path = file.commit()?;
        println!("Dump already complete: {}", path.display());
        return Ok(());
    };

    println!(
        "Dumping memory (0x{:08X} - 0x{:08X}) to output file: {} ...",
        remaining.from(),
        remaining.to(),
        path.display()
    );

    let result = DumpEngine::new(probe, gadget)
        .with_progress_interval(config.progress_interval)
        .run(remaining, file.sink(), shutdown.as_atomic());

    match result {
        Ok(summary) => {
            let path = file.commit()?;
            println!(
                "Dump saved to: {} ({} bytes)",
                path.display(),
                file_words(range, summary.words, remaining) * u64::from(WORD_SIZE)
            );
            Ok(())
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "Dump incomplete; partial data left in {} (re-run with --resume to continue)",
                DumpFile::part_path(path).display()
            )
        }),
    }
}

/// Total words in the file after a run that wrote `written` words of `remaining`
fn file_words(range: DumpRange, written: u64, remaining: DumpRange) -> u64 {
    range.word_count() - remaining.word_count() + written
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrfdump_core::protocol::DEFAULT_PROMPT;
    use nrfdump_core::session::MockTransport;
    use nrfdump_core::{Register, Session, SyncMode};
    use tempfile::tempdir;

    const RESET_PC: u32 = 0x1000;
    const MARKER_ADDRESS: u32 = 0x1000_1004;
    const MARKER_VALUE: u32 = 0xFFFF_FF00;

    /// Target whose reset `pc` holds `ldr r3, [r5]`.
    fn target() -> Probe<MockTransport> {
        let transport = MockTransport::new(RESET_PC)
            .with_word(MARKER_ADDRESS, MARKER_VALUE)
            .with_load(RESET_PC, Register::R5, Register::R3);
        Probe::new(Session::new(transport, DEFAULT_PROMPT, SyncMode::Prompt))
    }

    fn gadget_at(instruction_address: u32) -> Gadget {
        Gadget {
            instruction_address,
            input_register: Register::R5,
            output_register: Register::R3,
        }
    }

    fn options(gadget_file: PathBuf, rescan: bool) -> DumpOptions {
        DumpOptions {
            from: 0,
            to: 0x10,
            output: None,
            resume: false,
            gadget_file,
            rescan,
        }
    }

    fn save_record(path: &Path, marker_address: u32, gadget: Gadget) {
        let marker = KnownMarker::new(marker_address, MARKER_VALUE).unwrap();
        GadgetRecord::new(marker, gadget).save(path).unwrap();
    }

    fn searched(probe: Probe<MockTransport>) -> bool {
        let session = probe.into_session();
        session.transport().commands().iter().any(|c| c == "reset halt")
    }

    #[test]
    fn test_load_or_discover_uses_matching_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gadget.json");
        save_record(&path, MARKER_ADDRESS, gadget_at(RESET_PC));

        let mut probe = target();
        let (marker, gadget) = load_or_discover(
            &mut probe,
            &Config::default(),
            &options(path, false),
            &ShutdownSignal::new(),
        )
        .unwrap();

        assert_eq!(marker.value, MARKER_VALUE);
        assert_eq!(gadget, gadget_at(RESET_PC));
        assert!(!searched(probe));
    }

    #[test]
    fn test_load_or_discover_other_marker_address() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gadget.json");
        save_record(&path, 0x1000_1000, gadget_at(RESET_PC));

        let mut probe = target();
        let (marker, gadget) = load_or_discover(
            &mut probe,
            &Config::default(),
            &options(path.clone(), false),
            &ShutdownSignal::new(),
        )
        .unwrap();

        assert_eq!(marker.address, MARKER_ADDRESS);
        assert_eq!(gadget, gadget_at(RESET_PC));
        assert!(searched(probe));
        let saved = GadgetRecord::load_from_path(&path).unwrap();
        assert_eq!(saved.marker.address, MARKER_ADDRESS);
    }

    #[test]
    fn test_load_or_discover_stale_gadget() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gadget.json");
        save_record(&path, MARKER_ADDRESS, gadget_at(0x2000));

        let mut probe = target();
        let (_, gadget) = load_or_discover(
            &mut probe,
            &Config::default(),
            &options(path.clone(), false),
            &ShutdownSignal::new(),
        )
        .unwrap();

        assert_eq!(gadget, gadget_at(RESET_PC));
        assert!(searched(probe));
        let saved = GadgetRecord::load_from_path(&path).unwrap();
        assert_eq!(saved.gadget, gadget_at(RESET_PC));
    }

    #[test]
    fn test_load_or_discover_rescan_ignores_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gadget.json");
        save_record(&path, MARKER_ADDRESS, gadget_at(RESET_PC));

        let mut probe = target();
        let (_, gadget) = load_or_discover(
            &mut probe,
            &Config::default(),
            &options(path, true),
            &ShutdownSignal::new(),
        )
        .unwrap();

        assert_eq!(gadget, gadget_at(RESET_PC));
        assert!(searched(probe));
    }

    #[test]
    fn test_file_words_after_resume() {
        let range = DumpRange::new(0x1000, 0x100C).unwrap();
        let remaining = range.skip_words(1).unwrap();
        assert_eq!(file_words(range, 3, remaining), 4);
        assert_eq!(file_words(range, 4, range), 4);
    }
}
