//! Archive binary format constants and shared encode/decode helpers.
//!
//! The footer is always the **last 20 bytes** of an archive file:
//!
//! ```text
//! [index_offset: u64 LE][entry_count: u64 LE][magic: u32 LE = 0x314B_5053]
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Seek, SeekFrom, Write};

/// Magic number identifying archive files (ASCII "SPK1" when read as LE bytes).
pub const ARCHIVE_MAGIC: u32 = 0x314B_5053;

pub const FORMAT_VERSION: u16 = 1;

/// magic (4) + version (2).
pub const HEADER_BYTES: u64 = 4 + 2;

/// index_offset (8) + entry_count (8) + magic (4).
pub const FOOTER_BYTES: u64 = 8 + 8 + 4;

pub const WAVEFORMS_GROUP: &str = "Waveforms";
pub const AUXILIARY_GROUP: &str = "AuxiliaryData";

/// Upper bound on any length prefix, so a corrupt file cannot request a
/// multi-gigabyte allocation.
const MAX_FIELD_BYTES: u32 = 1 << 30;

pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Waveform,
    FixedStrings,
}

impl EntryKind {
    pub fn code(self) -> u8 {
        match self {
            Self::Waveform => 1,
            Self::FixedStrings => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Waveform),
            2 => Some(Self::FixedStrings),
            _ => None,
        }
    }
}

pub fn write_header<W: Write>(w: &mut W) -> IoResult<()> {
    w.write_u32::<LittleEndian>(ARCHIVE_MAGIC)?;
    w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
    Ok(())
}

/// Reads `(magic, version)` from the start of the file.
pub fn read_header<R: Read + Seek>(r: &mut R) -> IoResult<(u32, u16)> {
    r.seek(SeekFrom::Start(0))?;
    let magic = r.read_u32::<LittleEndian>()?;
    let version = r.read_u16::<LittleEndian>()?;
    Ok((magic, version))
}

pub fn write_footer<W: Write>(w: &mut W, index_offset: u64, entry_count: u64) -> IoResult<()> {
    w.write_u64::<LittleEndian>(index_offset)?;
    w.write_u64::<LittleEndian>(entry_count)?;
    w.write_u32::<LittleEndian>(ARCHIVE_MAGIC)?;
    Ok(())
}

/// Reads `(index_offset, entry_count, magic)`. Leaves the cursor at end of file.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> IoResult<(u64, u64, u32)> {
    let filesize = r.seek(SeekFrom::End(0))?;
    r.seek(SeekFrom::Start(filesize.saturating_sub(FOOTER_BYTES)))?;
    let index_offset = r.read_u64::<LittleEndian>()?;
    let entry_count = r.read_u64::<LittleEndian>()?;
    let magic = r.read_u32::<LittleEndian>()?;
    Ok((index_offset, entry_count, magic))
}

pub fn write_str<W: Write>(w: &mut W, value: &str) -> IoResult<()> {
    w.write_u32::<LittleEndian>(value.len() as u32)?;
    w.write_all(value.as_bytes())
}

fn read_len<R: Read>(r: &mut R) -> IoResult<usize> {
    let len = r.read_u32::<LittleEndian>()?;
    if len > MAX_FIELD_BYTES {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("length prefix {len} exceeds limit"),
        ));
    }
    Ok(len as usize)
}

pub fn read_str<R: Read>(r: &mut R) -> IoResult<String> {
    let len = read_len(r)?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|err| IoError::new(ErrorKind::InvalidData, err))
}

pub fn write_attributes<W: Write>(w: &mut W, attrs: &Attributes) -> IoResult<()> {
    w.write_u32::<LittleEndian>(attrs.len() as u32)?;
    for (key, value) in attrs {
        write_str(w, key)?;
        write_str(w, value)?;
    }
    Ok(())
}

pub fn read_attributes<R: Read>(r: &mut R) -> IoResult<Attributes> {
    let count = read_len(r)?;
    let mut attrs = Attributes::new();
    for _ in 0..count {
        let key = read_str(r)?;
        let value = read_str(r)?;
        attrs.insert(key, value);
    }
    Ok(attrs)
}

pub fn write_samples<W: Write>(w: &mut W, samples: &[f32]) -> IoResult<()> {
    w.write_u64::<LittleEndian>(samples.len() as u64)?;
    for sample in samples {
        w.write_f32::<LittleEndian>(*sample)?;
    }
    Ok(())
}

#[cfg(test)]
pub fn read_samples<R: Read>(r: &mut R) -> IoResult<Vec<f32>> {
    let count = r.read_u64::<LittleEndian>()?;
    if count > u64::from(MAX_FIELD_BYTES) {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("sample count {count} exceeds limit"),
        ));
    }
    let mut samples = vec![0f32; count as usize];
    r.read_f32_into::<LittleEndian>(&mut samples)?;
    Ok(samples)
}

/// Fixed-width byte strings: every value is NUL-padded to the longest one.
pub fn write_fixed_strings<W: Write>(w: &mut W, values: &[String]) -> IoResult<()> {
    let width = values.iter().map(String::len).max().unwrap_or(0).max(1);
    w.write_u32::<LittleEndian>(width as u32)?;
    w.write_u32::<LittleEndian>(values.len() as u32)?;
    let mut cell = vec![0u8; width];
    for value in values {
        cell.fill(0);
        cell[..value.len()].copy_from_slice(value.as_bytes());
        w.write_all(&cell)?;
    }
    Ok(())
}

pub fn read_fixed_strings<R: Read>(r: &mut R) -> IoResult<Vec<String>> {
    let width = read_len(r)?;
    let count = read_len(r)?;
    if width.saturating_mul(count) > MAX_FIELD_BYTES as usize {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            "fixed string table exceeds limit",
        ));
    }
    let mut out = Vec::with_capacity(count);
    let mut cell = vec![0u8; width];
    for _ in 0..count {
        r.read_exact(&mut cell)?;
        let end = cell.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
        let value = String::from_utf8(cell[..end].to_vec())
            .map_err(|err| IoError::new(ErrorKind::InvalidData, err))?;
        out.push(value);
    }
    Ok(out)
}

/// Entry paths are `/`-separated group names with no empty segments.
pub fn validate_path(path: &str) -> bool {
    !path.is_empty() && path.split('/').all(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fixed_strings_pad_to_longest_value() {
        let values = vec!["2020_06_01".to_string(), "ab".to_string(), String::new()];
        let mut buf = Vec::new();
        write_fixed_strings(&mut buf, &values).expect("write");
        assert_eq!(buf.len(), 4 + 4 + 3 * 10);
        let back = read_fixed_strings(&mut Cursor::new(buf)).expect("read");
        assert_eq!(back, values);
    }

    #[test]
    fn empty_fixed_string_table_has_unit_width() {
        let mut buf = Vec::new();
        write_fixed_strings(&mut buf, &[]).expect("write");
        assert_eq!(buf, vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert!(read_fixed_strings(&mut Cursor::new(buf)).expect("read").is_empty());
    }

    #[test]
    fn footer_is_last_twenty_bytes() {
        let mut buf = Cursor::new(Vec::new());
        write_header(&mut buf).expect("header");
        write_footer(&mut buf, 6, 0).expect("footer");
        assert_eq!(buf.get_ref().len() as u64, HEADER_BYTES + FOOTER_BYTES);
        assert_eq!(read_footer(&mut buf).expect("read"), (6, 0, ARCHIVE_MAGIC));
        assert_eq!(read_header(&mut buf).expect("read"), (ARCHIVE_MAGIC, FORMAT_VERSION));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let buf = u32::MAX.to_le_bytes().to_vec();
        assert!(read_str(&mut Cursor::new(buf)).is_err());
    }

    #[test]
    fn path_validation_rejects_empty_segments() {
        assert!(validate_path("Waveforms/tag/XX.STA"));
        assert!(!validate_path(""));
        assert!(!validate_path("/Waveforms"));
        assert!(!validate_path("Waveforms//x"));
    }
}
