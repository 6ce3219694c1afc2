use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::container::format::{
    Attributes, EntryKind, write_attributes, write_fixed_strings, write_footer, write_header,
    write_samples, write_str, validate_path,
};

#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub entries: usize,
}

/// Appends entries to a new archive.
///
/// Records go to a temporary file next to the target. [`finish`](Self::finish)
/// writes the index and footer, syncs, and renames the file into place; an
/// archive that is dropped unfinished leaves nothing at the target path.
pub struct ArchiveWriter {
    target: PathBuf,
    file: NamedTempFile,
    offset: u64,
    index: BTreeMap<String, (EntryKind, u64)>,
    poisoned: bool,
}

fn staging_dir(target: &Path) -> PathBuf {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl ArchiveWriter {
    pub fn create(target: &Path) -> Result<Self> {
        let dir = staging_dir(target);
        let mut file = tempfile::Builder::new()
            .prefix(".stationpack-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .with_context(|| format!("failed to create staging file in {}", dir.display()))?;
        write_header(&mut file)?;
        let offset = file.stream_position()?;
        Ok(Self {
            target: target.to_path_buf(),
            file,
            offset,
            index: BTreeMap::new(),
            poisoned: false,
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True once a failed append could not be rolled back; nothing more can
    /// be written.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn add_waveform(&mut self, path: &str, attrs: &Attributes, samples: &[f32]) -> Result<()> {
        let mut payload = Vec::with_capacity(8 + 4 * samples.len());
        write_samples(&mut payload, samples)?;
        self.append(EntryKind::Waveform, path, attrs, &payload)
    }

    pub fn add_fixed_strings(
        &mut self,
        path: &str,
        attrs: &Attributes,
        values: &[String],
    ) -> Result<()> {
        let mut payload = Vec::new();
        write_fixed_strings(&mut payload, values)?;
        self.append(EntryKind::FixedStrings, path, attrs, &payload)
    }

    fn append(
        &mut self,
        kind: EntryKind,
        path: &str,
        attrs: &Attributes,
        payload: &[u8],
    ) -> Result<()> {
        if self.poisoned {
            bail!("archive stream for {} is unusable", self.target.display());
        }
        if !validate_path(path) {
            bail!("invalid archive entry path `{path}`");
        }
        if self.index.contains_key(path) {
            bail!("duplicate archive entry `{path}`");
        }

        let mut record = Vec::with_capacity(payload.len() + path.len() + 64);
        record.write_u8(kind.code())?;
        write_str(&mut record, path)?;
        write_attributes(&mut record, attrs)?;
        record.write_all(payload)?;

        if let Err(err) = self.file.write_all(&record) {
            self.rewind();
            return Err(err).with_context(|| format!("failed to append archive entry `{path}`"));
        }

        self.index.insert(path.to_string(), (kind, self.offset));
        self.offset += record.len() as u64;
        Ok(())
    }

    /// Truncates back to the end of the last complete record.
    fn rewind(&mut self) {
        let offset = self.offset;
        let restored = self
            .file
            .as_file_mut()
            .set_len(offset)
            .and_then(|_| self.file.seek(SeekFrom::Start(offset)).map(|_| ()));
        if restored.is_err() {
            self.poisoned = true;
        }
    }

    pub fn finish(mut self) -> Result<ArchiveSummary> {
        if self.poisoned {
            bail!("archive stream for {} is unusable", self.target.display());
        }

        let index_offset = self.offset;
        let mut index = Vec::new();
        for (path, (kind, data_offset)) in &self.index {
            write_str(&mut index, path)?;
            index.write_u8(kind.code())?;
            index.write_u64::<LittleEndian>(*data_offset)?;
        }
        write_footer(&mut index, index_offset, self.index.len() as u64)?;
        self.file.write_all(&index)?;

        self.file.flush()?;
        self.file.as_file().sync_all()?;

        let entries = self.index.len();
        let target = self.target;
        self.file
            .persist(&target)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to move archive into {}", target.display()))?;
        let bytes = std::fs::metadata(&target)
            .with_context(|| format!("failed to stat {}", target.display()))?
            .len();

        Ok(ArchiveSummary {
            path: target,
            bytes,
            entries,
        })
    }
}
