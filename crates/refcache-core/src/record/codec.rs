//! ZIP container codec for cache records.
//!
//! Parts: `status` (decimal code), `validator.field`, `location.field` and
//! `payload`. Only `status` is mandatory; a missing optional part decodes as
//! `None`, even where the status implies it (the resolver re-fetches such records). Containers written by the previous
//! generation carry the ETag as `field.etag`; it is read when
//! `validator.field` is absent.

use std::io::{self, Read, Seek, Write};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{CacheRecord, RecordMeta, Status};

const STATUS_PART: &str = "status";
const VALIDATOR_PART: &str = "validator.field";
const LOCATION_PART: &str = "location.field";
const PAYLOAD_PART: &str = "payload";
const OLD_ETAG_PART: &str = "field.etag";

/// A record container that cannot be used. Callers treat this as a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("container: {0}")]
    Zip(#[from] ZipError),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("missing status part")]
    MissingStatus,
    #[error("invalid status {0:?}")]
    InvalidStatus(String),
    #[error("part {0} is not UTF-8")]
    NotUtf8(&'static str),
}

/// Serialize `record` into `writer` as a ZIP container.
pub fn write<W: Write + Seek>(record: &CacheRecord, writer: W) -> Result<W, RecordError> {
    let mut zip = ZipWriter::new(writer);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file(STATUS_PART, stored)?;
    zip.write_all(record.status.code().to_string().as_bytes())?;

    if let Some(validator) = &record.validator {
        zip.start_file(VALIDATOR_PART, stored)?;
        zip.write_all(validator.as_bytes())?;
    }
    if let Some(location) = &record.location {
        zip.start_file(LOCATION_PART, stored)?;
        zip.write_all(location.as_bytes())?;
    }
    if let Some(payload) = &record.payload {
        let deflated =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(PAYLOAD_PART, deflated)?;
        zip.write_all(payload)?;
    }

    Ok(zip.finish()?)
}

/// Read a full record, payload included.
pub fn read<R: Read + Seek>(reader: R) -> Result<CacheRecord, RecordError> {
    let mut archive = ZipArchive::new(reader)?;
    let (status, validator, location) = read_head(&mut archive)?;
    let payload = read_part(&mut archive, PAYLOAD_PART)?;
    Ok(CacheRecord {
        status,
        validator,
        location,
        payload,
    })
}

/// Read everything except the payload bytes.
pub fn read_meta<R: Read + Seek>(reader: R) -> Result<RecordMeta, RecordError> {
    let mut archive = ZipArchive::new(reader)?;
    let (status, validator, location) = read_head(&mut archive)?;
    let payload_len = match archive.by_name(PAYLOAD_PART) {
        Ok(part) => Some(part.size()),
        Err(ZipError::FileNotFound) => None,
        Err(e) => return Err(e.into()),
    };
    Ok(RecordMeta {
        status,
        validator,
        location,
        payload_len,
    })
}

type Head = (Status, Option<String>, Option<String>);

fn read_head<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Head, RecordError> {
    let raw = read_text(archive, STATUS_PART)?.ok_or(RecordError::MissingStatus)?;
    let code: u32 = raw
        .trim()
        .parse()
        .map_err(|_| RecordError::InvalidStatus(raw.clone()))?;
    let status = Status::from_code(code);

    let validator = match read_text(archive, VALIDATOR_PART)? {
        Some(v) => Some(v),
        None => read_text(archive, OLD_ETAG_PART)?,
    };
    let location = read_text(archive, LOCATION_PART)?;
    Ok((status, validator, location))
}

fn read_text<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &'static str,
) -> Result<Option<String>, RecordError> {
    match read_part(archive, name)? {
        Some(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| RecordError::NotUtf8(name)),
        None => Ok(None),
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<Vec<u8>>, RecordError> {
    match archive.by_name(name) {
        Ok(mut part) => {
            // The declared size comes from the file and is not trusted.
            let mut buf = Vec::new();
            part.read_to_end(&mut buf)?;
            Ok(Some(buf))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
