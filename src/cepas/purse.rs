use chrono::{DateTime, TimeZone, Utc};
use nom::bytes::complete::take;
use nom::combinator::{map, map_opt};
use nom::number::complete::{be_i24, be_u16, be_u32, be_u8};

use super::{CepasTransaction, IResult, CEPAS_EPOCH};
use crate::errors::ensure_len;
use crate::util::ByteArray;
use crate::Result;

/// A stored-value purse. Cards have 16 slots; EZ-Link only uses #3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purse {
    pub id: u8,
    pub version: u8,
    pub status: u8,
    /// Cents, can go negative.
    pub balance: i32,
    pub auto_load_amount: i32,
    /// Card Application Number, BCD-ish; printed on the card.
    pub can: [u8; 8],
    /// Card Serial Number.
    pub csn: [u8; 8],
    pub purse_expiry: DateTime<Utc>,
    pub purse_creation: DateTime<Utc>,
    pub last_credit_transaction_trp: u32,
    pub last_credit_transaction_header: [u8; 8],
    pub logfile_record_count: u8,
    pub issuer_data_length: u8,
    pub last_transaction_trp: u32,
    pub last_transaction_record: CepasTransaction,
    pub issuer_specific_data: ByteArray,
    pub last_transaction_debit_options: u8,
}

impl Purse {
    /// Everything up to the issuer data.
    const FIXED_LEN: usize = 62;

    pub fn parse(id: u8, data: &[u8]) -> Result<Self> {
        ensure_len("purse", data, Self::FIXED_LEN)?;
        let issuer_len = usize::from(data[41]);
        ensure_len("purse", data, Self::FIXED_LEN + issuer_len + 1)?;
        let (_, purse) = Self::parse_body(id, data)?;
        Ok(purse)
    }

    fn parse_body(id: u8, data: &[u8]) -> IResult<Self> {
        let (data, version) = be_u8(data)?;
        let (data, status) = be_u8(data)?;
        let (data, balance) = be_i24(data)?;
        let (data, auto_load_amount) = be_i24(data)?;
        let (data, can) = bytes8(data)?;
        let (data, csn) = bytes8(data)?;
        let (data, purse_expiry) = epoch_days(data)?;
        let (data, purse_creation) = epoch_days(data)?;
        let (data, last_credit_transaction_trp) = be_u32(data)?;
        let (data, last_credit_transaction_header) = bytes8(data)?;
        let (data, logfile_record_count) = be_u8(data)?;
        let (data, issuer_data_length) = be_u8(data)?;
        let (data, last_transaction_trp) = be_u32(data)?;
        let (data, last_transaction_record) = CepasTransaction::parse(data)?;
        let (data, issuer_specific_data) =
            map(take(issuer_data_length), ByteArray::from)(data)?;
        let (data, last_transaction_debit_options) = be_u8(data)?;
        Ok((
            data,
            Self {
                id,
                version,
                status,
                balance,
                auto_load_amount,
                can,
                csn,
                purse_expiry,
                purse_creation,
                last_credit_transaction_trp,
                last_credit_transaction_header,
                logfile_record_count,
                issuer_data_length,
                last_transaction_trp,
                last_transaction_record,
                issuer_specific_data,
                last_transaction_debit_options,
            },
        ))
    }
}

fn bytes8(data: &[u8]) -> IResult<[u8; 8]> {
    map(take(8usize), |b: &[u8]| {
        let mut out = [0; 8];
        out.copy_from_slice(b);
        out
    })(data)
}

fn epoch_days(data: &[u8]) -> IResult<DateTime<Utc>> {
    map_opt(be_u16, |days| {
        Utc.timestamp_opt(CEPAS_EPOCH + i64::from(days) * 86400, 0)
            .single()
    })(data)
}

/// A purse slot, which may not hold anything we can read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CepasPurse {
    Valid(Purse),
    Invalid { id: u8, error: String },
}

impl CepasPurse {
    pub fn id(&self) -> u8 {
        match self {
            Self::Valid(purse) => purse.id,
            Self::Invalid { id, .. } => *id,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn purse(&self) -> Option<&Purse> {
        match self {
            Self::Valid(purse) => Some(purse),
            Self::Invalid { .. } => None,
        }
    }
}
