use chrono::NaiveDateTime;

use super::{convert_date, Agency};
use crate::errors::ensure_len;
use crate::util::BitCursor;
use crate::Result;

pub const PROCESS_PURCHASE: i32 = 0;
pub const PROCESS_CHECKIN: i32 = 1;
pub const PROCESS_CHECKOUT: i32 = 2;
pub const PROCESS_TRANSFER: i32 = 6;
pub const PROCESS_BANNED: i32 = 7;
pub const PROCESS_CREDIT: i32 = -2;
pub const PROCESS_NODATA: i32 = -3;

/// Presence bits that never show up on a real transaction; any of them means the slot
/// holds something else (or garbage).
const INVALID_FLAGS: [(usize, u8); 14] = [
    (3, 0x10),
    (3, 0x80),
    (2, 0x02),
    (2, 0x08),
    (2, 0x20),
    (2, 0x80),
    (1, 0x01),
    (1, 0x02),
    (1, 0x08),
    (1, 0x20),
    (1, 0x40),
    (1, 0x80),
    (0, 0x02),
    (0, 0x04),
];

/// One of the 28 transaction log slots.
///
/// Bytes 0..3 are a bitmask saying which of the variable fields follow the fixed
/// date/time header. Slots that don't hold a transaction keep the defaults below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OvcTransaction {
    pub slot: u8,
    pub valid: bool,
    pub error: Option<String>,
    /// Days since 1997-01-01.
    pub date: u32,
    /// Minutes since midnight.
    pub time: u32,
    pub unknown_constant: u32,
    /// Process type, see `PROCESS_*`.
    pub transfer: i32,
    pub company: u16,
    /// Sequence number; a check-in and its check-out are consecutive.
    pub id: u32,
    pub station: u32,
    pub machine_id: u32,
    pub vehicle_id: u32,
    pub product_id: u8,
    pub unknown_constant2: u32,
    /// Cents.
    pub amount: i32,
    /// -1 if there isn't one.
    pub subscription_id: i32,
}

impl OvcTransaction {
    pub const LEN: usize = 32;
    pub const SLOTS: u8 = 28;

    pub fn empty(slot: u8) -> Self {
        Self {
            slot,
            valid: false,
            error: Some("No transaction".into()),
            date: 0,
            time: 0,
            unknown_constant: 0,
            transfer: PROCESS_NODATA,
            company: 0,
            id: 0,
            station: 0,
            machine_id: 0,
            vehicle_id: 0,
            product_id: 0,
            unknown_constant2: 0,
            amount: 0,
            subscription_id: -1,
        }
    }

    pub fn parse(slot: u8, data: &[u8]) -> Result<Self> {
        ensure_len("OV-chip transaction", data, Self::LEN)?;
        let (d0, d1, d2, d3) = (data[0], data[1], data[2], data[3]);
        let blank = d0 == 0 && d1 == 0 && d2 == 0 && d3 & 0xF0 == 0;
        if blank || INVALID_FLAGS.iter().any(|&(i, mask)| data[i] & mask != 0) {
            return Ok(Self::empty(slot));
        }

        let mut tx = Self {
            valid: true,
            error: None,
            ..Self::empty(slot)
        };
        let mut cur = BitCursor::new(data, 28);
        tx.date = cur.read(14) as u32;
        tx.time = cur.read(11) as u32;

        if let Some(v) = cur.read_if(d3 & 0x20 != 0, 24) {
            tx.unknown_constant = v as u32;
        }
        if let Some(v) = cur.read_if(d3 & 0x40 != 0, 7) {
            tx.transfer = v as i32;
        }
        if let Some(v) = cur.read_if(d2 & 0x01 != 0, 16) {
            tx.company = v as u16;
        }
        if let Some(v) = cur.read_if(d2 & 0x04 != 0, 24) {
            tx.id = v as u32;
        }
        if let Some(v) = cur.read_if(d2 & 0x10 != 0, 16) {
            tx.station = v as u32;
        }
        if let Some(v) = cur.read_if(d2 & 0x40 != 0, 24) {
            tx.machine_id = v as u32;
        }
        if let Some(v) = cur.read_if(d1 & 0x04 != 0, 16) {
            tx.vehicle_id = v as u32;
        }
        let has_product = d1 & 0x10 != 0;
        if let Some(v) = cur.read_if(has_product, 5) {
            tx.product_id = v as u8;
        }
        if let Some(v) = cur.read_if(d0 & 0x01 != 0, 16) {
            tx.unknown_constant2 = v as u32;
        }
        if let Some(v) = cur.read_if(d0 & 0x08 != 0, 16) {
            tx.amount = v as i32;
        }
        if let Some(v) = cur.read_if(!has_product, 13) {
            tx.subscription_id = v as i32;
        }
        Ok(tx)
    }

    pub fn agency(&self) -> Agency {
        Agency::from(self.company)
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        convert_date(self.date, self.time)
    }

    /// Whether `next` is the check-out belonging to this check-in.
    ///
    /// A check-out the next day still counts, except on NS, where trips reset at 4 AM.
    pub fn is_same_trip(&self, next: &OvcTransaction) -> bool {
        if self.company != next.company
            || self.transfer != PROCESS_CHECKIN
            || next.transfer != PROCESS_CHECKOUT
        {
            return false;
        }
        if self.date == next.date {
            return true;
        }
        if self.date + 1 == next.date {
            return self.agency() != Agency::Ns || next.time < 240;
        }
        false
    }
}
