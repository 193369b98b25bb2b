use std::fmt;

use chrono::{DateTime, Utc};

use crate::cepas::CepasCard;
use crate::classic::ClassicCard;
use crate::desfire::DesfireCard;
use crate::util::ByteArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardType {
    MifareDesfire,
    Cepas,
    MifareClassic,
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MifareDesfire => "MIFARE DESFire",
            Self::Cepas => "CEPAS",
            Self::MifareClassic => "MIFARE Classic",
        })
    }
}

/// A card that's been read (or loaded from a dump), of any supported family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Card {
    Desfire(DesfireCard),
    Cepas(CepasCard),
    Classic(ClassicCard),
}

impl Card {
    pub fn card_type(&self) -> CardType {
        match self {
            Self::Desfire(_) => CardType::MifareDesfire,
            Self::Cepas(_) => CardType::Cepas,
            Self::Classic(_) => CardType::MifareClassic,
        }
    }

    pub fn tag_id(&self) -> &ByteArray {
        match self {
            Self::Desfire(card) => &card.tag_id,
            Self::Cepas(card) => &card.tag_id,
            Self::Classic(card) => &card.tag_id,
        }
    }

    pub fn scanned_at(&self) -> DateTime<Utc> {
        match self {
            Self::Desfire(card) => card.scanned_at,
            Self::Cepas(card) => card.scanned_at,
            Self::Classic(card) => card.scanned_at,
        }
    }

    pub fn as_desfire(&self) -> Option<&DesfireCard> {
        match self {
            Self::Desfire(card) => Some(card),
            _ => None,
        }
    }

    pub fn as_cepas(&self) -> Option<&CepasCard> {
        match self {
            Self::Cepas(card) => Some(card),
            _ => None,
        }
    }

    pub fn as_classic(&self) -> Option<&ClassicCard> {
        match self {
            Self::Classic(card) => Some(card),
            _ => None,
        }
    }
}

impl From<DesfireCard> for Card {
    fn from(card: DesfireCard) -> Self {
        Self::Desfire(card)
    }
}

impl From<CepasCard> for Card {
    fn from(card: CepasCard) -> Self {
        Self::Cepas(card)
    }
}

impl From<ClassicCard> for Card {
    fn from(card: ClassicCard) -> Self {
        Self::Classic(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;

    #[test]
    fn test_classic() -> Result<()> {
        let card: Card = ClassicCard::from_dump(&[0x01, 0x02], &[0; 1024])?.into();
        assert_eq!(card.card_type(), CardType::MifareClassic);
        assert_eq!(card.card_type().to_string(), "MIFARE Classic");
        assert_eq!(card.tag_id().to_hex(), "0102");
        assert!(card.as_classic().is_some());
        assert!(card.as_desfire().is_none());
        assert!(card.as_cepas().is_none());
        Ok(())
    }
}
