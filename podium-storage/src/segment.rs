//! Segment file format.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Segment Header (16 bytes)                          │
//! │    Magic (8 bytes): "PODIUMSG"                      │
//! │    Version (4 bytes, LE)                            │
//! │    Reserved (4 bytes)                               │
//! ├─────────────────────────────────────────────────────┤
//! │  Record 1                                           │
//! │    Member length (4 bytes, LE)                      │
//! │    Kind (1 byte): Set = 1, Tombstone = 2            │
//! │    Score bits (8 bytes, LE IEEE-754)                │
//! │    CRC32 (4 bytes, LE) over kind + score + member   │
//! │    Member bytes (variable)                          │
//! ├─────────────────────────────────────────────────────┤
//! │  Record 2 ...                                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Endianness is fixed little-endian so a store written on one machine
//! replays identically on another.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use podium_core::error::{Error, Result};

pub(crate) const SEGMENT_MAGIC: &[u8; 8] = b"PODIUMSG";
pub(crate) const SEGMENT_VERSION: u32 = 1;
pub(crate) const SEGMENT_HEADER_SIZE: u64 = 16;

const RECORD_HEADER_SIZE: usize = 4 + 1 + 8 + 4;

/// Members larger than this are refused on write and treated as corruption
/// on read, which also bounds allocations when a length field is damaged.
pub(crate) const MAX_MEMBER_LEN: usize = 1 << 20;

/// What a record does to its member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Upsert the member with the carried score.
    Set = 1,
    /// Remove the member; the score field is ignored on replay.
    Tombstone = 2,
}

impl TryFrom<u8> for RecordKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RecordKind::Set),
            2 => Ok(RecordKind::Tombstone),
            _ => Err(Error::StorageRead {
                message: format!("invalid record kind: {}", value),
                source: None,
            }),
        }
    }
}

/// One persisted mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    pub member: Bytes,
    pub score: f64,
}

impl Record {
    pub fn set(member: Bytes, score: f64) -> Self {
        Self {
            kind: RecordKind::Set,
            member,
            score,
        }
    }

    pub fn tombstone(member: Bytes) -> Self {
        Self {
            kind: RecordKind::Tombstone,
            member,
            score: 0.0,
        }
    }

    pub fn encoded_len(&self) -> u64 {
        (RECORD_HEADER_SIZE + self.member.len()) as u64
    }
}

fn checksum(kind: u8, score_bits: u64, member: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[kind]);
    hasher.update(&score_bits.to_le_bytes());
    hasher.update(member);
    hasher.finalize()
}

pub(crate) fn write_header(writer: &mut impl Write) -> io::Result<()> {
    writer.write_all(SEGMENT_MAGIC)?;
    writer.write_u32::<LittleEndian>(SEGMENT_VERSION)?;
    writer.write_all(&[0u8; 4])?;
    Ok(())
}

pub(crate) fn read_header(reader: &mut impl Read) -> Result<()> {
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .map_err(|e| Error::StorageRead {
            message: "segment header is truncated".to_string(),
            source: Some(e),
        })?;
    if &magic != SEGMENT_MAGIC {
        return Err(Error::StorageRead {
            message: "invalid segment magic".to_string(),
            source: None,
        });
    }
    let version = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::StorageRead {
            message: "segment header is truncated".to_string(),
            source: Some(e),
        })?;
    if version != SEGMENT_VERSION {
        return Err(Error::StorageRead {
            message: format!("unsupported segment version: {}", version),
            source: None,
        });
    }
    let mut reserved = [0u8; 4];
    reader
        .read_exact(&mut reserved)
        .map_err(|e| Error::StorageRead {
            message: "segment header is truncated".to_string(),
            source: Some(e),
        })?;
    Ok(())
}

pub(crate) fn write_record(writer: &mut impl Write, record: &Record) -> io::Result<()> {
    let score_bits = record.score.to_bits();
    writer.write_u32::<LittleEndian>(record.member.len() as u32)?;
    writer.write_u8(record.kind as u8)?;
    writer.write_u64::<LittleEndian>(score_bits)?;
    writer.write_u32::<LittleEndian>(checksum(record.kind as u8, score_bits, &record.member))?;
    writer.write_all(&record.member)?;
    Ok(())
}

/// Outcome of attempting to read one record.
pub(crate) enum ReadOutcome {
    Record(Record),
    /// Clean end of segment: zero bytes remained.
    Eof,
    /// The segment ends mid-record, as a crashed writer leaves it.
    Torn,
}

/// Read as much as the source yields, stopping early only at end of input.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

pub(crate) fn read_record(reader: &mut impl Read) -> Result<ReadOutcome> {
    let io_err = |e| Error::StorageRead {
        message: "failed to read record".to_string(),
        source: Some(e),
    };

    let mut header = [0u8; RECORD_HEADER_SIZE];
    match fill(reader, &mut header).map_err(io_err)? {
        0 => return Ok(ReadOutcome::Eof),
        n if n < RECORD_HEADER_SIZE => return Ok(ReadOutcome::Torn),
        _ => {}
    }

    let mut cursor = io::Cursor::new(&header[..]);
    let member_len = cursor.read_u32::<LittleEndian>().map_err(io_err)? as usize;
    let kind_byte = cursor.read_u8().map_err(io_err)?;
    let score_bits = cursor.read_u64::<LittleEndian>().map_err(io_err)?;
    let expected_crc = cursor.read_u32::<LittleEndian>().map_err(io_err)?;

    if member_len > MAX_MEMBER_LEN {
        return Err(Error::StorageRead {
            message: format!("record member length {} exceeds limit", member_len),
            source: None,
        });
    }

    let mut member = vec![0u8; member_len];
    if fill(reader, &mut member).map_err(io_err)? < member_len {
        return Ok(ReadOutcome::Torn);
    }

    if checksum(kind_byte, score_bits, &member) != expected_crc {
        return Err(Error::StorageRead {
            message: "record checksum mismatch".to_string(),
            source: None,
        });
    }
    let kind = RecordKind::try_from(kind_byte)?;

    Ok(ReadOutcome::Record(Record {
        kind,
        member: Bytes::from(member),
        score: f64::from_bits(score_bits),
    }))
}
