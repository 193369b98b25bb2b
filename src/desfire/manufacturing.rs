use crate::{util, Error, Result};

/// Response to GetVersion/GetManufacturingData: three frames of hardware, software and
/// production info, 28 bytes in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturingData {
    pub hw_vendor_id: u8,
    pub hw_type: u8,
    pub hw_sub_type: u8,
    pub hw_major_version: u8,
    pub hw_minor_version: u8,
    pub hw_storage_size: u8,
    pub hw_protocol: u8,

    pub sw_vendor_id: u8,
    pub sw_type: u8,
    pub sw_sub_type: u8,
    pub sw_major_version: u8,
    pub sw_minor_version: u8,
    pub sw_storage_size: u8,
    pub sw_protocol: u8,

    /// 7-byte UID.
    pub uid: u64,
    /// 5-byte production batch number.
    pub batch_no: u64,
    /// Production week and year, BCD on real cards, stored raw.
    pub week_prod: u8,
    pub year_prod: u8,
}

impl ManufacturingData {
    pub const LEN: usize = 28;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(Error::Protocol(format!(
                "Invalid manufacturing data length: {} (expected {})",
                data.len(),
                Self::LEN
            )));
        }
        Ok(Self {
            hw_vendor_id: data[0],
            hw_type: data[1],
            hw_sub_type: data[2],
            hw_major_version: data[3],
            hw_minor_version: data[4],
            hw_storage_size: data[5],
            hw_protocol: data[6],
            sw_vendor_id: data[7],
            sw_type: data[8],
            sw_sub_type: data[9],
            sw_major_version: data[10],
            sw_minor_version: data[11],
            sw_storage_size: data[12],
            sw_protocol: data[13],
            uid: util::be_uint(&data[14..21]),
            batch_no: util::be_uint(&data[21..26]),
            week_prod: data[26],
            year_prod: data[27],
        })
    }
}
