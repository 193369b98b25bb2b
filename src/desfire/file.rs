use nom::number::complete::le_i32;

use super::{FileSettings, IResult, SettingsDetail};
use crate::errors::ensure_len;
use crate::util::ByteArray;
use crate::{Error, Result};

/// A file as it was read off the card.
///
/// The variant follows the settings' file type. Files we couldn't read keep whatever
/// settings we managed to get, plus the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesfireFile {
    /// Standard and backup files.
    Standard {
        id: u8,
        settings: FileSettings,
        data: ByteArray,
    },
    Value {
        id: u8,
        settings: FileSettings,
        value: i32,
    },
    /// Linear and cyclic record files.
    Record {
        id: u8,
        settings: FileSettings,
        records: Vec<ByteArray>,
    },
    Invalid {
        id: u8,
        settings: Option<FileSettings>,
        error: String,
    },
    Unauthorized {
        id: u8,
        settings: Option<FileSettings>,
        error: String,
    },
}

impl DesfireFile {
    /// Builds a file from settings and the raw bytes read for it.
    pub fn decode(id: u8, settings: FileSettings, raw: &[u8]) -> Result<Self> {
        Ok(match settings.detail {
            SettingsDetail::Standard { .. } => Self::Standard {
                id,
                settings,
                data: raw.into(),
            },
            SettingsDetail::Value { .. } => {
                ensure_len("value file", raw, 4)?;
                let (_, value) = parse_value(raw)?;
                Self::Value {
                    id,
                    settings,
                    value,
                }
            }
            SettingsDetail::Record {
                record_size,
                cur_records,
                ..
            } => Self::Record {
                id,
                settings,
                records: split_records(raw, record_size as usize, cur_records as usize)?,
            },
        })
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::Standard { id, .. }
            | Self::Value { id, .. }
            | Self::Record { id, .. }
            | Self::Invalid { id, .. }
            | Self::Unauthorized { id, .. } => *id,
        }
    }

    pub fn settings(&self) -> Option<&FileSettings> {
        match self {
            Self::Standard { settings, .. }
            | Self::Value { settings, .. }
            | Self::Record { settings, .. } => Some(settings),
            Self::Invalid { settings, .. } | Self::Unauthorized { settings, .. } => {
                settings.as_ref()
            }
        }
    }

    /// Contents of a standard file.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Standard { data, .. } => Some(&data[..]),
            _ => None,
        }
    }

    pub fn records(&self) -> Option<&[ByteArray]> {
        match self {
            Self::Record { records, .. } => Some(records.as_slice()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Invalid { error, .. } | Self::Unauthorized { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

fn parse_value(data: &[u8]) -> IResult<i32> {
    le_i32(data)
}

fn split_records(raw: &[u8], size: usize, count: usize) -> Result<Vec<ByteArray>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if size == 0 {
        return Err(Error::Invalid("record file with zero-length records".into()));
    }
    ensure_len("record file", raw, size * count)?;
    Ok(raw
        .chunks_exact(size)
        .take(count)
        .map(ByteArray::from)
        .collect())
}
