//! Node Data Codec
//!
//! Binary layout, all integers big-endian:
//!
//! | field              | bytes | versions |
//! |--------------------|-------|----------|
//! | version            | 4     | all      |
//! | errors occurred    | 1     | all      |
//! | directory          | utf   | >= 1     |
//! | create date (ms)   | 8     | >= 1     |
//! | last access (ms)   | 8     | >= 1     |
//! | name               | utf   | >= 1     |
//! | display name       | utf   | >= 1     |
//! | deleted item flags | 2     | >= 1     |
//! | minor version      | 4     | >= 2     |
//!
//! `utf` is a 2-byte length followed by modified UTF-8, the encoding used by
//! the platform's other readers. The errors flag is written as `0x80` so that
//! version 0 readers, which treat a negative byte as "errors occurred", see the
//! same value as version 1 readers, which treat any non-zero byte as true.
//!
//! Each version owns a table of field readers and writers. Supporting a new
//! version means adding a table; existing tables never change.

use super::{millis_to_datetime, CaseDetails, CaseNodeData, DeletedItems, NodeDataVersion};
use crate::error::NodeDataError;

const ERRORS_OCCURRED_TRUE: u8 = 0x80;

/// Fields collected while decoding, assembled into [`CaseNodeData`] at the end.
#[derive(Default)]
struct DecodedFields {
    errors_occurred: bool,
    details: Option<CaseDetails>,
    minor_version: Option<i32>,
}

type FieldReader = fn(&mut ByteReader<'_>, &mut DecodedFields) -> Result<(), NodeDataError>;
type FieldWriter = fn(&CaseNodeData, &mut Vec<u8>) -> Result<(), NodeDataError>;

const LEGACY_READERS: &[FieldReader] = &[read_legacy_errors_occurred];
const V1_READERS: &[FieldReader] = &[read_errors_occurred, read_case_details];
const V2_READERS: &[FieldReader] = &[read_errors_occurred, read_case_details, read_minor_version];

const LEGACY_WRITERS: &[FieldWriter] = &[write_errors_occurred];
const V1_WRITERS: &[FieldWriter] = &[write_errors_occurred, write_case_details];
const V2_WRITERS: &[FieldWriter] = &[write_errors_occurred, write_case_details, write_minor_version];

fn readers_for(version: NodeDataVersion) -> &'static [FieldReader] {
    match version {
        NodeDataVersion::Legacy => LEGACY_READERS,
        NodeDataVersion::V1 => V1_READERS,
        NodeDataVersion::V2 => V2_READERS,
    }
}

fn writers_for(version: NodeDataVersion) -> &'static [FieldWriter] {
    match version {
        NodeDataVersion::Legacy => LEGACY_WRITERS,
        NodeDataVersion::V1 => V1_WRITERS,
        NodeDataVersion::V2 => V2_WRITERS,
    }
}

/// Encode node data in the layout of its own version.
pub fn encode(data: &CaseNodeData) -> Result<Vec<u8>, NodeDataError> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&data.version().as_raw().to_be_bytes());
    for writer in writers_for(data.version()) {
        writer(data, &mut out)?;
    }
    Ok(out)
}

/// Decode node data. Empty input is malformed; bytes past the fields of the
/// declared version are ignored.
pub fn decode(bytes: &[u8]) -> Result<CaseNodeData, NodeDataError> {
    if bytes.is_empty() {
        return Err(NodeDataError::Malformed(
            "zero-length node data".to_string(),
        ));
    }
    let mut reader = ByteReader::new(bytes);
    let raw_version = reader.read_i32("version")?;
    let version = NodeDataVersion::from_raw(raw_version).ok_or_else(|| {
        NodeDataError::Malformed(format!("unsupported node data version {}", raw_version))
    })?;

    let mut fields = DecodedFields::default();
    for reader_fn in readers_for(version) {
        reader_fn(&mut reader, &mut fields)?;
    }
    Ok(CaseNodeData::from_parts(
        version,
        fields.errors_occurred,
        fields.details,
        fields.minor_version,
    ))
}

/// Decode the payload of a node that may have no data at all.
pub fn decode_node(bytes: Option<&[u8]>) -> Result<CaseNodeData, NodeDataError> {
    match bytes {
        Some(bytes) => decode(bytes),
        None => Err(NodeDataError::Malformed("missing node data".to_string())),
    }
}

fn read_legacy_errors_occurred(
    reader: &mut ByteReader<'_>,
    fields: &mut DecodedFields,
) -> Result<(), NodeDataError> {
    fields.errors_occurred = (reader.read_u8("errors occurred")? as i8) < 0;
    Ok(())
}

fn read_errors_occurred(
    reader: &mut ByteReader<'_>,
    fields: &mut DecodedFields,
) -> Result<(), NodeDataError> {
    fields.errors_occurred = reader.read_u8("errors occurred")? != 0;
    Ok(())
}

fn read_case_details(
    reader: &mut ByteReader<'_>,
    fields: &mut DecodedFields,
) -> Result<(), NodeDataError> {
    let directory = reader.read_utf("directory")?;
    let create_date = reader.read_date("create date")?;
    let last_access_date = reader.read_date("last access date")?;
    let name = reader.read_utf("name")?;
    let display_name = reader.read_utf("display name")?;
    let deleted_items = DeletedItems::from_bits_retain(reader.read_u16("deleted item flags")?);
    fields.details = Some(CaseDetails {
        directory,
        create_date,
        last_access_date,
        name,
        display_name,
        deleted_items,
    });
    Ok(())
}

fn read_minor_version(
    reader: &mut ByteReader<'_>,
    fields: &mut DecodedFields,
) -> Result<(), NodeDataError> {
    fields.minor_version = Some(reader.read_i32("minor version")?);
    Ok(())
}

fn write_errors_occurred(data: &CaseNodeData, out: &mut Vec<u8>) -> Result<(), NodeDataError> {
    out.push(if data.errors_occurred() {
        ERRORS_OCCURRED_TRUE
    } else {
        0
    });
    Ok(())
}

fn write_case_details(data: &CaseNodeData, out: &mut Vec<u8>) -> Result<(), NodeDataError> {
    let details = data.details().ok_or(NodeDataError::MissingCaseDetails)?;
    write_utf(out, "directory", &details.directory)?;
    out.extend_from_slice(&details.create_date.timestamp_millis().to_be_bytes());
    out.extend_from_slice(&details.last_access_date.timestamp_millis().to_be_bytes());
    write_utf(out, "name", &details.name)?;
    write_utf(out, "display name", &details.display_name)?;
    out.extend_from_slice(&details.deleted_items.bits().to_be_bytes());
    Ok(())
}

fn write_minor_version(data: &CaseNodeData, out: &mut Vec<u8>) -> Result<(), NodeDataError> {
    out.extend_from_slice(&data.minor_version().unwrap_or(0).to_be_bytes());
    Ok(())
}

/// Write a length-prefixed modified UTF-8 string.
///
/// NUL is written as two bytes and characters outside the BMP as two
/// three-byte surrogate encodings.
fn write_utf(out: &mut Vec<u8>, field: &'static str, value: &str) -> Result<(), NodeDataError> {
    let mut encoded = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => encoded.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                encoded.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                encoded.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    let len = u16::try_from(encoded.len()).map_err(|_| NodeDataError::FieldTooLong {
        field,
        len: encoded.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], NodeDataError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                NodeDataError::Malformed(format!(
                    "truncated {} at offset {} ({} bytes available, {} needed)",
                    field,
                    self.pos,
                    self.buf.len() - self.pos,
                    len
                ))
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self, field: &str) -> Result<u8, NodeDataError> {
        Ok(self.take(1, field)?[0])
    }

    fn read_u16(&mut self, field: &str) -> Result<u16, NodeDataError> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_i32(&mut self, field: &str) -> Result<i32, NodeDataError> {
        let bytes = self.take(4, field)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self, field: &str) -> Result<i64, NodeDataError> {
        let bytes = self.take(8, field)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(arr))
    }

    fn read_date(&mut self, field: &str) -> Result<chrono::DateTime<chrono::Utc>, NodeDataError> {
        let millis = self.read_i64(field)?;
        millis_to_datetime(millis).ok_or_else(|| {
            NodeDataError::Malformed(format!("{} out of range: {} ms", field, millis))
        })
    }

    fn read_utf(&mut self, field: &str) -> Result<String, NodeDataError> {
        let len = self.read_u16(field)? as usize;
        let bytes = self.take(len, field)?;
        decode_modified_utf8(bytes)
            .map_err(|reason| NodeDataError::Malformed(format!("{}: {}", field, reason)))
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> Result<String, String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let continuation = |idx: usize| -> Result<u16, String> {
        match bytes.get(idx) {
            Some(b) if b & 0xC0 == 0x80 => Ok((b & 0x3F) as u16),
            _ => Err(format!("bad continuation byte at {}", idx)),
        }
    };
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((((b & 0x1F) as u16) << 6) | continuation(i + 1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push(
                (((b & 0x0F) as u16) << 12) | (continuation(i + 1)? << 6) | continuation(i + 2)?,
            );
            i += 3;
        } else {
            return Err(format!("bad lead byte 0x{:02x} at {}", b, i));
        }
    }
    String::from_utf16(&units).map_err(|e| e.to_string())
}
