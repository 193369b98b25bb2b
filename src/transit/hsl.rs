//! HSL, Helsinki.
use super::{format_amount, TransitFactory, TransitIdentity, TransitInfo};
use crate::card::Card;
use crate::desfire::DesfireCard;
use crate::errors::ensure_len;
use crate::util::get_bits;
use crate::{Error, Result};

pub const APP_ID: u32 = 0x1120EF;

pub struct Hsl;

fn file(card: &DesfireCard, id: u8, need: usize) -> Result<&[u8]> {
    let data = card
        .file_data(APP_ID, id)
        .ok_or_else(|| Error::Invalid(format!("HSL card has no file {:#04x}", id)))?;
    ensure_len("HSL file", data, need)?;
    Ok(data)
}

/// The printed number skips the first byte.
fn serial_number(card: &DesfireCard) -> Result<String> {
    Ok(hex::encode(file(card, 0x08, 10)?)[2..20].to_owned())
}

impl TransitFactory for Hsl {
    fn name(&self) -> &'static str {
        "HSL"
    }

    fn check(&self, card: &Card) -> bool {
        card.as_desfire()
            .map_or(false, |card| card.application(APP_ID).is_some())
    }

    fn parse_identity(&self, card: &Card) -> Result<TransitIdentity> {
        let card = card.as_desfire().ok_or(Error::UnsupportedCard)?;
        Ok(TransitIdentity::new(self.name(), Some(serial_number(card)?)))
    }

    fn parse_info(&self, card: &Card) -> Result<TransitInfo> {
        let card = card.as_desfire().ok_or(Error::UnsupportedCard)?;
        let balance = get_bits(file(card, 0x02, 3)?, 0, 20);
        Ok(TransitInfo {
            card_name: self.name().into(),
            serial_number: Some(serial_number(card)?),
            balance: format_amount(balance as i64, "€"),
            trips: Vec::new(),
            subscriptions: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transit::tests::desfire_card;

    #[test]
    fn test_parse() -> Result<()> {
        let serial = [0x00, 0x92, 0x46, 0x20, 0x12, 0x34, 0x56, 0x78, 0x90, 0x12, 0xFF];
        // 0x00FA0 in the top 20 bits: €40.00
        let purse = [0x00, 0xFA, 0x0F, 0xFF];
        let card = desfire_card(&[(APP_ID, &[(0x02, &purse), (0x08, &serial)])]);

        assert!(Hsl.check(&card));
        let info = Hsl.parse_info(&card)?;
        assert_eq!(info.serial_number.as_deref(), Some("924620123456789012"));
        assert_eq!(info.balance, "€40.00");
        Ok(())
    }
}
