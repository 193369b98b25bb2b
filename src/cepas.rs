//! CEPAS: Singapore's stored-value card standard, used by EZ-Link and NETS FlashPay.
//!
//! A card holds up to 16 purses, each with a balance and a log of recent transactions.
//! Reading them needs no keys.
pub mod history;
pub mod protocol;
pub mod purse;
pub mod transaction;

pub use history::CepasHistory;
pub use protocol::CepasProtocol;
pub use purse::{CepasPurse, Purse};
pub use transaction::{CepasTransaction, TransactionType};

use chrono::{DateTime, Utc};
use tap::TapFallible;
use tracing::{debug, trace_span};

use crate::transport::Transport;
use crate::util::ByteArray;
use crate::{Error, Result};

pub type IResult<'a, T> = nom::IResult<&'a [u8], T>;

/// Purse dates count days from here (1995-01-01, 08:00 UTC).
pub const CEPAS_EPOCH: i64 = 788947200;

/// Purses per card.
pub const PURSE_COUNT: u8 = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CepasCard {
    pub tag_id: ByteArray,
    pub scanned_at: DateTime<Utc>,
    pub purses: Vec<CepasPurse>,
    pub histories: Vec<CepasHistory>,
}

impl CepasCard {
    pub fn purse(&self, id: u8) -> Option<&CepasPurse> {
        self.purses.iter().find(|p| p.id() == id)
    }

    pub fn history(&self, id: u8) -> Option<&CepasHistory> {
        self.histories.iter().find(|h| h.id() == id)
    }
}

/// Reads all purses, then the history of every purse that turned out to be valid.
pub fn read_card<T: Transport>(transport: T, tag_id: &[u8]) -> Result<CepasCard> {
    let span = trace_span!("cepas", tag_id = hex::encode_upper(tag_id));
    let _enter = span.enter();

    let mut proto = CepasProtocol::new(transport);
    let mut purses = Vec::with_capacity(PURSE_COUNT.into());
    for id in 0..PURSE_COUNT {
        debug!(purse = id, "Reading purse...");
        proto.select_file()?;
        purses.push(read_purse(&mut proto, id)?);
    }

    let mut histories = Vec::with_capacity(purses.len());
    for purse in &purses {
        histories.push(match purse {
            CepasPurse::Valid(p) => {
                debug!(purse = p.id, records = p.logfile_record_count, "Reading history...");
                match proto
                    .get_history(p.id, p.logfile_record_count)
                    .and_then(|data| CepasHistory::parse(p.id, &data))
                {
                    Ok(history) => history,
                    Err(err) if err.is_transport() => return Err(err),
                    Err(err) => CepasHistory::Invalid {
                        id: p.id,
                        error: err.to_string(),
                    },
                }
            }
            CepasPurse::Invalid { id, .. } => CepasHistory::Invalid {
                id: *id,
                error: "Purse is invalid".into(),
            },
        });
    }

    Ok(CepasCard {
        tag_id: tag_id.into(),
        scanned_at: Utc::now(),
        purses,
        histories,
    })
}

fn read_purse<T: Transport>(proto: &mut CepasProtocol<T>, id: u8) -> Result<CepasPurse> {
    let parsed = proto.get_purse(id).and_then(|data| {
        if data.is_empty() {
            Err(Error::Invalid("No purse found".into()))
        } else {
            Purse::parse(id, &data)
        }
    });
    match parsed.tap_err(|err| debug!(purse = id, %err, "Purse unavailable")) {
        Ok(purse) => Ok(CepasPurse::Valid(purse)),
        Err(err) if err.is_transport() => Err(err),
        Err(err) => Ok(CepasPurse::Invalid {
            id,
            error: err.to_string(),
        }),
    }
}
