//! PC/SC as a transport, for USB readers on a desktop.
use crate::protocol::APDU;
use crate::transport::Transport;
use crate::{Error, Result};
use tracing::{debug, trace_span};

impl Transport for pcsc::Card {
    fn transceive(&mut self, req: &[u8]) -> Result<Vec<u8>> {
        let mut buf = [0; pcsc::MAX_BUFFER_SIZE];
        Ok(self.transmit(req, &mut buf)?.to_vec())
    }
}

/// Reads the tag's UID using the pseudo-APDU defined by the PC/SC standard.
pub fn get_uid(card: &mut pcsc::Card) -> Result<Vec<u8>> {
    let span = trace_span!("get_uid");
    let _enter = span.enter();

    let rsp = card.call(&APDU::new(0xFF, 0xCA, 0x00, 0x00, vec![]).expect(0))?;
    if (rsp.sw1, rsp.sw2) != (0x90, 0x00) {
        return Err(Error::APDU(rsp.sw1, rsp.sw2));
    }
    debug!("UID: {:02X?}", rsp.data);
    Ok(rsp.data)
}
