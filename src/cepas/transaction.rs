use chrono::{DateTime, TimeZone, Utc};
use nom::bytes::complete::take;
use nom::combinator::{map, map_opt};
use nom::number::complete::{be_i24, be_u32, be_u8};
use num_enum::FromPrimitive;

use super::{IResult, CEPAS_EPOCH};

/// Transaction timestamps are counted from midnight in Singapore, not UTC.
const TRANSACTION_EPOCH: i64 = CEPAS_EPOCH - 16 * 3600;

/// What a log entry was for. The raw byte is kept on the transaction; several codes
/// collapse into the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum TransactionType {
    TopUp = 1,
    Service = 4,
    Mrt = 48,
    Retail = 49,
    #[num_enum(alternatives=[3])]
    Bus = 117,
    BusRefund = 118,
    #[num_enum(alternatives=[5])]
    Creation = 0xF0,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// One 16-byte entry of a purse's transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CepasTransaction {
    pub raw_type: u8,
    pub kind: TransactionType,
    /// Cents; negative for debits.
    pub amount: i32,
    pub timestamp: DateTime<Utc>,
    /// Route or station codes, eg. "BGK-CTH" or "SVC 123".
    pub user_data: String,
}

impl CepasTransaction {
    pub const LEN: usize = 16;

    pub fn parse(data: &[u8]) -> IResult<Self> {
        let (data, raw_type) = be_u8(data)?;
        let (data, amount) = be_i24(data)?;
        let (data, timestamp) = map_opt(be_u32, |v| {
            Utc.timestamp_opt(i64::from(v) + TRANSACTION_EPOCH, 0).single()
        })(data)?;
        let (data, user_data) = map(take(8usize), decode_user_data)(data)?;
        Ok((
            data,
            Self {
                raw_type,
                kind: raw_type.into(),
                amount,
                timestamp,
                user_data,
            },
        ))
    }
}

/// User data is NUL-terminated ASCII, give or take.
fn decode_user_data(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(&raw[..end]);
    text.into_owned()
}
