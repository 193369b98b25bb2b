use nom::number::complete::{be_u8, le_i32, le_u24};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::convert::TryFrom;
use std::fmt;

use super::IResult;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FileType {
    Standard = 0x00,
    Backup = 0x01,
    Value = 0x02,
    LinearRecord = 0x03,
    CyclicRecord = 0x04,
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "Standard",
            Self::Backup => "Backup",
            Self::Value => "Value",
            Self::LinearRecord => "Linear Record",
            Self::CyclicRecord => "Cyclic Record",
        })
    }
}

/// The type-specific tail of a GetFileSettings response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsDetail {
    /// Standard and backup files.
    Standard { file_size: u32 },
    Value {
        lower_limit: i32,
        upper_limit: i32,
        limited_credit_value: i32,
        limited_credit_enabled: bool,
    },
    /// Linear and cyclic record files.
    Record {
        record_size: u32,
        max_records: u32,
        cur_records: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSettings {
    pub file_type: FileType,
    pub comm_setting: u8,
    /// Read/write/read-write/change key numbers, one nibble each.
    pub access_rights: [u8; 2],
    pub detail: SettingsDetail,
}

impl FileSettings {
    /// Parses a GetFileSettings response. The type byte alone decides the layout;
    /// multi-byte fields are little-endian on the wire.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let type_byte = *data.first().ok_or(Error::Truncated {
            what: "file settings",
            need: 1,
            have: 0,
        })?;
        let file_type = FileType::try_from(type_byte).map_err(|_| Error::UnknownFileType(type_byte))?;
        let (_, settings) = Self::parse_body(file_type, &data[1..])?;
        Ok(settings)
    }

    fn parse_body(file_type: FileType, data: &[u8]) -> IResult<Self> {
        let (data, comm_setting) = be_u8(data)?;
        let (data, ar0) = be_u8(data)?;
        let (data, ar1) = be_u8(data)?;
        let (data, detail) = match file_type {
            FileType::Standard | FileType::Backup => {
                let (data, file_size) = le_u24(data)?;
                (data, SettingsDetail::Standard { file_size })
            }
            FileType::Value => {
                let (data, lower_limit) = le_i32(data)?;
                let (data, upper_limit) = le_i32(data)?;
                let (data, limited_credit_value) = le_i32(data)?;
                let (data, enabled) = be_u8(data)?;
                (
                    data,
                    SettingsDetail::Value {
                        lower_limit,
                        upper_limit,
                        limited_credit_value,
                        limited_credit_enabled: enabled != 0,
                    },
                )
            }
            FileType::LinearRecord | FileType::CyclicRecord => {
                let (data, record_size) = le_u24(data)?;
                let (data, max_records) = le_u24(data)?;
                let (data, cur_records) = le_u24(data)?;
                (
                    data,
                    SettingsDetail::Record {
                        record_size,
                        max_records,
                        cur_records,
                    },
                )
            }
        };
        Ok((
            data,
            Self {
                file_type,
                comm_setting,
                access_rights: [ar0, ar1],
                detail,
            },
        ))
    }
}
