//! Reader for SAC binary recording files.
//!
//! Only the header fields needed to identify and place a trace in time are
//! decoded. Byte order is detected from the header version word.

use crate::error::StationError;
use crate::station::util::sha256_hex;
use anyhow::{Context, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::fs;
use std::path::Path;

pub const HEADER_BYTES: usize = 632;
const FLOAT_BASE: usize = 0;
const INT_BASE: usize = 280;
const CHAR_BASE: usize = 440;
const SAC_VERSION: i32 = 6;
const UNDEFINED_INT: i32 = -12345;
const UNDEFINED_FLOAT: f32 = -12345.0;

const F_DELTA: usize = 0;
const F_B: usize = 5;
const I_NZYEAR: usize = 0;
const I_NZJDAY: usize = 1;
const I_NZHOUR: usize = 2;
const I_NZMIN: usize = 3;
const I_NZSEC: usize = 4;
const I_NZMSEC: usize = 5;
const I_NVHDR: usize = 6;
const I_NPTS: usize = 9;
const K_STNM: usize = CHAR_BASE;
const K_HOLE: usize = CHAR_BASE + 24;
const K_CMPNM: usize = CHAR_BASE + 160;
const K_NETWK: usize = CHAR_BASE + 168;

/// One decoded recording unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: NaiveDateTime,
    pub sampling_interval: f64,
    pub samples: Vec<f32>,
    pub content_hash: String,
}

impl Recording {
    pub fn trace_id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// Opens a recording unit from disk. Implementations must be usable from
/// several build workers at once.
pub trait RecordingReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Recording>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SacReader;

impl RecordingReader for SacReader {
    fn read(&self, path: &Path) -> Result<Recording> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read recording {}", path.display()))?;
        let recording = decode(&bytes).map_err(|reason| StationError::MalformedRecording {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(recording)
    }
}

fn decode(bytes: &[u8]) -> std::result::Result<Recording, String> {
    if bytes.len() < HEADER_BYTES {
        return Err(format!(
            "file is {} bytes, shorter than the {HEADER_BYTES}-byte header",
            bytes.len()
        ));
    }
    let nvhdr_at = INT_BASE + 4 * I_NVHDR;
    if LittleEndian::read_i32(&bytes[nvhdr_at..]) == SAC_VERSION {
        decode_with::<LittleEndian>(bytes)
    } else if BigEndian::read_i32(&bytes[nvhdr_at..]) == SAC_VERSION {
        decode_with::<BigEndian>(bytes)
    } else {
        Err("unsupported header version (expected nvhdr = 6)".to_string())
    }
}

fn float_at<B: ByteOrder>(bytes: &[u8], index: usize) -> f32 {
    B::read_f32(&bytes[FLOAT_BASE + 4 * index..])
}

fn int_at<B: ByteOrder>(bytes: &[u8], index: usize) -> i32 {
    B::read_i32(&bytes[INT_BASE + 4 * index..])
}

fn text_at(bytes: &[u8], offset: usize, len: usize) -> String {
    let raw = String::from_utf8_lossy(&bytes[offset..offset + len]);
    let value = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if value == "-12345" {
        String::new()
    } else {
        value.to_string()
    }
}

fn defined(value: i32, name: &str) -> std::result::Result<u32, String> {
    if value == UNDEFINED_INT || value < 0 {
        return Err(format!("header field {name} is undefined"));
    }
    Ok(value as u32)
}

fn decode_with<B: ByteOrder>(bytes: &[u8]) -> std::result::Result<Recording, String> {
    let station = text_at(bytes, K_STNM, 8);
    if station.is_empty() {
        return Err("header field kstnm is undefined".to_string());
    }

    let delta = float_at::<B>(bytes, F_DELTA);
    if !(delta.is_finite() && delta > 0.0) {
        return Err(format!("invalid sampling interval {delta}"));
    }

    let year = int_at::<B>(bytes, I_NZYEAR);
    let jday = defined(int_at::<B>(bytes, I_NZJDAY), "nzjday")?;
    let hour = defined(int_at::<B>(bytes, I_NZHOUR), "nzhour")?;
    let minute = defined(int_at::<B>(bytes, I_NZMIN), "nzmin")?;
    let second = defined(int_at::<B>(bytes, I_NZSEC), "nzsec")?;
    let milli = defined(int_at::<B>(bytes, I_NZMSEC), "nzmsec")?;
    if year == UNDEFINED_INT {
        return Err("header field nzyear is undefined".to_string());
    }
    let reference = NaiveDate::from_yo_opt(year, jday)
        .and_then(|day| day.and_hms_milli_opt(hour, minute, second, milli))
        .ok_or_else(|| format!("invalid reference time {year}.{jday:03} {hour}:{minute}:{second}.{milli}"))?;

    let begin = float_at::<B>(bytes, F_B);
    let offset_ms = if begin == UNDEFINED_FLOAT || !begin.is_finite() {
        0
    } else {
        (f64::from(begin) * 1000.0).round() as i64
    };
    let start = TimeDelta::try_milliseconds(offset_ms)
        .and_then(|offset| reference.checked_add_signed(offset))
        .ok_or_else(|| format!("begin offset {begin} out of range"))?;

    let npts = int_at::<B>(bytes, I_NPTS);
    if npts < 0 {
        return Err(format!("invalid sample count {npts}"));
    }
    let npts = npts as usize;
    let needed = HEADER_BYTES + 4 * npts;
    if bytes.len() < needed {
        return Err(format!(
            "truncated data section: header declares {npts} samples, file holds {} bytes",
            bytes.len()
        ));
    }
    let mut samples = vec![0f32; npts];
    B::read_f32_into(&bytes[HEADER_BYTES..needed], &mut samples);

    Ok(Recording {
        network: text_at(bytes, K_NETWK, 8),
        station,
        location: text_at(bytes, K_HOLE, 8),
        channel: text_at(bytes, K_CMPNM, 8),
        start,
        sampling_interval: f64::from(delta),
        samples,
        content_hash: sha256_hex(bytes),
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{SacFixture, encode, encode_le};
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn decodes_little_endian_header_and_samples() {
        let bytes = encode_le(&SacFixture::new("STA1", 2021, 34));
        let rec = decode(&bytes).expect("decode");
        assert_eq!(rec.station, "STA1");
        assert_eq!(rec.network, "XX");
        assert_eq!(rec.location, "");
        assert_eq!(rec.channel, "HHZ");
        assert_eq!(rec.trace_id(), "XX.STA1..HHZ");
        assert_eq!(
            rec.start,
            NaiveDate::from_ymd_opt(2021, 2, 3)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(rec.samples, vec![0.5, -1.0, 2.25]);
        assert!((rec.sampling_interval - 0.01).abs() < 1e-6);
        assert_eq!(rec.content_hash.len(), 64);
    }

    #[test]
    fn decodes_big_endian_files() {
        let bytes = encode::<BigEndian>(&SacFixture::new("STA2", 2020, 366));
        let rec = decode(&bytes).expect("decode");
        assert_eq!(rec.station, "STA2");
        assert_eq!(rec.samples.len(), 3);
    }

    #[test]
    fn rejects_short_and_truncated_files() {
        assert!(decode(b"not a sac file").is_err());
        let mut bytes = encode_le(&SacFixture::new("STA1", 2021, 1));
        bytes.truncate(bytes.len() - 2);
        let err = decode(&bytes).expect_err("truncated");
        assert!(err.contains("truncated"));
    }

    #[test]
    fn rejects_missing_station_name() {
        let bytes = encode_le(&SacFixture::new("", 2021, 1));
        let err = decode(&bytes).expect_err("no station");
        assert!(err.contains("kstnm"));
    }

    #[test]
    fn reader_wraps_malformed_files_in_typed_error() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("broken.sac");
        std::fs::write(&path, vec![0u8; HEADER_BYTES]).expect("write");
        let err = SacReader.read(&path).expect_err("malformed");
        assert!(matches!(
            err.downcast_ref::<StationError>(),
            Some(StationError::MalformedRecording { .. })
        ));
    }
}
