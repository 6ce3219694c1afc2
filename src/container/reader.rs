use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::container::format::{
    ARCHIVE_MAGIC, Attributes, EntryKind, FOOTER_BYTES, FORMAT_VERSION, HEADER_BYTES,
    WAVEFORMS_GROUP, read_attributes, read_fixed_strings, read_footer, read_header, read_str,
};
use crate::error::StationError;

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformEntry {
    pub attributes: Attributes,
    pub samples: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedStringsEntry {
    pub attributes: Attributes,
    pub values: Vec<String>,
}

/// Reads an archive without any knowledge of how it was built.
///
/// [`open`](ArchiveReader::open) validates header and footer and loads the
/// index; each record read reopens the file and seeks to the record.
#[derive(Debug)]
pub struct ArchiveReader {
    path: PathBuf,
    bytes: u64,
    index: BTreeMap<String, (EntryKind, u64)>,
}

fn invalid(path: &Path, reason: impl Into<String>) -> StationError {
    StationError::InvalidArchive {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

impl ArchiveReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut f = File::open(&path)?;
        let filesize = f.metadata()?.len();
        if filesize < HEADER_BYTES + FOOTER_BYTES {
            return Err(invalid(&path, "file too small").into());
        }

        let (magic, version) = read_header(&mut f)?;
        if magic != ARCHIVE_MAGIC {
            return Err(invalid(&path, format!("bad header magic {magic:#x}")).into());
        }
        if version != FORMAT_VERSION {
            return Err(invalid(&path, format!("unsupported format version {version}")).into());
        }

        let (index_offset, entry_count, footer_magic) = read_footer(&mut f)?;
        if footer_magic != ARCHIVE_MAGIC {
            return Err(invalid(&path, format!("bad footer magic {footer_magic:#x}")).into());
        }
        let index_end = filesize - FOOTER_BYTES;
        if index_offset < HEADER_BYTES || index_offset > index_end {
            return Err(invalid(&path, "index offset outside file").into());
        }

        f.seek(SeekFrom::Start(index_offset))?;
        let mut r = BufReader::new(f);
        let mut index = BTreeMap::new();
        let mut consumed = index_offset;
        while consumed < index_end {
            let entry_path = read_str(&mut r)?;
            let code = r.read_u8()?;
            let data_offset = r.read_u64::<LittleEndian>()?;
            let kind = EntryKind::from_code(code)
                .ok_or_else(|| invalid(&path, format!("unknown entry kind {code}")))?;
            if data_offset < HEADER_BYTES || data_offset >= index_offset {
                return Err(invalid(&path, format!("entry `{entry_path}` points outside data")).into());
            }
            consumed += 4 + entry_path.len() as u64 + 1 + 8;
            index.insert(entry_path, (kind, data_offset));
        }
        if consumed != index_end || index.len() as u64 != entry_count {
            return Err(invalid(
                &path,
                format!(
                    "index holds {} entries, footer declares {entry_count}",
                    index.len()
                ),
            )
            .into());
        }

        Ok(Self {
            path,
            bytes: filesize,
            index,
        })
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Entry paths below `prefix/`, in sorted order.
    pub fn paths_under<'a>(&'a self, prefix: &str) -> Vec<&'a str> {
        let group = format!("{}/", prefix.trim_end_matches('/'));
        self.index
            .keys()
            .filter(|p| p.starts_with(&group))
            .map(String::as_str)
            .collect()
    }

    pub fn count_kind(&self, kind: EntryKind) -> usize {
        self.index.values().filter(|(k, _)| *k == kind).count()
    }

    /// Distinct tags in the `Waveforms` section.
    pub fn waveform_tags(&self) -> BTreeSet<String> {
        self.paths_under(WAVEFORMS_GROUP)
            .into_iter()
            .filter_map(|p| p.split('/').nth(1))
            .map(ToOwned::to_owned)
            .collect()
    }

    fn open_record(&self, path: &str, expected: EntryKind) -> Result<(BufReader<File>, Attributes)> {
        let Some((kind, offset)) = self.index.get(path).copied() else {
            anyhow::bail!("no entry `{path}` in {}", self.path.display());
        };
        if kind != expected {
            anyhow::bail!("entry `{path}` is {kind:?}, not {expected:?}");
        }

        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(offset))?;
        let mut r = BufReader::new(f);

        let code = r.read_u8()?;
        let stored_path = read_str(&mut r)?;
        if code != kind.code() || stored_path != path {
            return Err(invalid(&self.path, format!("index points at mismatching record for `{path}`")).into());
        }
        let attributes = read_attributes(&mut r)?;
        Ok((r, attributes))
    }

    #[cfg(test)]
    pub fn read_waveform(&self, path: &str) -> Result<WaveformEntry> {
        use crate::container::format::read_samples;

        let (mut r, attributes) = self.open_record(path, EntryKind::Waveform)?;
        let samples = read_samples(&mut r)?;
        Ok(WaveformEntry {
            attributes,
            samples,
        })
    }

    pub fn read_fixed_strings(&self, path: &str) -> Result<FixedStringsEntry> {
        let (mut r, attributes) = self.open_record(path, EntryKind::FixedStrings)?;
        let values = read_fixed_strings(&mut r)?;
        Ok(FixedStringsEntry { attributes, values })
    }
}
