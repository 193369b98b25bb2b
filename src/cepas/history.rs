use tracing::warn;

use super::CepasTransaction;
use crate::Result;

/// The transaction log belonging to the purse with the same ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CepasHistory {
    Valid {
        id: u8,
        transactions: Vec<CepasTransaction>,
    },
    Invalid {
        id: u8,
        error: String,
    },
}

impl CepasHistory {
    /// Decodes a log dump in 16-byte strides. A trailing partial record is dropped.
    pub fn parse(id: u8, data: &[u8]) -> Result<Self> {
        let chunks = data.chunks_exact(CepasTransaction::LEN);
        if !chunks.remainder().is_empty() {
            warn!(
                purse = id,
                extra = chunks.remainder().len(),
                "History isn't a whole number of records"
            );
        }
        let transactions = chunks
            .map(|chunk| CepasTransaction::parse(chunk).map(|(_, tx)| tx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Valid { id, transactions })
    }

    pub fn id(&self) -> u8 {
        match self {
            Self::Valid { id, .. } | Self::Invalid { id, .. } => *id,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Empty for invalid histories.
    pub fn transactions(&self) -> &[CepasTransaction] {
        match self {
            Self::Valid { transactions, .. } => transactions,
            Self::Invalid { .. } => &[],
        }
    }
}
