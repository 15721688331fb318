//! Control files: device setup dumps referenced by a song
//!
//! A song may name CM6/GSD/GSD2 (Recomposer) or MTD (MCP) files. They are
//! fetched through a [`ControlFileReader`] and turned into the SysEx messages
//! sent during the setup measure.

pub mod filter;
pub mod gsd;
pub mod mt32;

use crate::error::{Error, Result};
use crate::rcm::text::is_printable_ascii;
use crate::rcm::HeaderFields;
use crate::settings::Settings;
use log::{debug, warn};
use std::path::PathBuf;

/// Kind of control file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlFileKind {
    /// MT-32/CM-64 dump (Recomposer)
    Cm6,
    /// GS setup
    Gsd,
    /// GS setup for the second port
    Gsd2,
    /// MT-32 dump (MCP)
    Mtd,
}

/// Source of control file contents
pub trait ControlFileReader {
    /// Read a control file
    ///
    /// `name` is the decoded name when it is plain ASCII; `raw_name` is the
    /// name exactly as stored in the song, possibly in a legacy codepage.
    fn read(&self, name: Option<&str>, raw_name: &[u8]) -> Result<Vec<u8>>;
}

/// Reads control files from a directory, usually the song's own
#[derive(Debug, Clone)]
pub struct FsControlFileReader {
    base_dir: PathBuf,
}

impl FsControlFileReader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl ControlFileReader for FsControlFileReader {
    fn read(&self, name: Option<&str>, raw_name: &[u8]) -> Result<Vec<u8>> {
        let display = String::from_utf8_lossy(raw_name).into_owned();
        let name = name.ok_or_else(|| Error::ControlFileNotFound(display.clone()))?;
        std::fs::read(self.base_dir.join(name)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ControlFileNotFound(display),
            _ => Error::Io(e),
        })
    }
}

/// SysEx lists derived from a song's control files
#[derive(Debug, Clone, Default)]
pub struct ControlData {
    /// GS family (GSD, GSD2)
    pub gs: Vec<Vec<u8>>,
    /// LA family (CM6, MTD)
    pub la: Vec<Vec<u8>>,
    /// MTD patch memory, consumed by User Program events
    pub patch_memory: Option<Vec<[u8; 8]>>,
}

impl ControlData {
    pub fn is_empty(&self) -> bool {
        self.gs.is_empty() && self.la.is_empty()
    }
}

/// Read and convert every control file named in the header
pub fn load(
    header: &HeaderFields,
    reader: Option<&dyn ControlFileReader>,
    settings: &Settings,
) -> Result<ControlData> {
    let mut control = ControlData::default();
    if !settings.use_ctrl_file {
        return Ok(control);
    }

    for (kind, raw_name) in &header.control_files {
        let display = String::from_utf8_lossy(raw_name).into_owned();
        let data = match read_one(reader, raw_name, &display) {
            Ok(data) => data,
            Err(e @ (Error::ControlFileNotFound(_) | Error::NoControlFileReader(_)))
                if settings.ignore_ctrl_file =>
            {
                warn!("{}. Setup for {:?} is omitted.", e, kind);
                continue;
            }
            Err(e) => return Err(e),
        };

        let sysexs = match kind {
            ControlFileKind::Cm6 => mt32::convert_cm6(&data),
            ControlFileKind::Mtd => mt32::convert_mtd(&data),
            ControlFileKind::Gsd | ControlFileKind::Gsd2 => gsd::convert(&data),
        };
        let Some(sysexs) = sysexs else {
            warn!("'{}' is not a {:?} file. Ignored.", display, kind);
            continue;
        };
        debug!("Read {} SysEx messages from '{}'", sysexs.len(), display);

        match kind {
            ControlFileKind::Cm6 => control.la.extend(sysexs),
            ControlFileKind::Mtd => {
                control.la.extend(sysexs);
                control.patch_memory = mt32::mtd_patch_table(&data);
            }
            ControlFileKind::Gsd | ControlFileKind::Gsd2 => control.gs.extend(sysexs),
        }
    }

    Ok(control)
}

fn read_one(reader: Option<&dyn ControlFileReader>, raw_name: &[u8], display: &str) -> Result<Vec<u8>> {
    let reader = reader.ok_or_else(|| Error::NoControlFileReader(display.to_string()))?;
    let name = is_printable_ascii(raw_name)
        .then(|| std::str::from_utf8(raw_name).ok())
        .flatten();
    reader.read(name, raw_name)
}
