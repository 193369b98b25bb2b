//! CEPAS commands. Singapore Standard SS 518, if you can get hold of a copy.
//!
//! Unlike DESFire, every exchange is a single frame; the status word is plain ISO 7816,
//! except that some errors are reported in SW1 and permission problems in SW2.
use tracing::{debug, trace_span, warn};

use crate::protocol::{Response, APDU};
use crate::transport::Transport;
use crate::{Error, Result};

const READ_PURSE: u8 = 0x32;

/// A history read returns at most this many records at once.
pub const HISTORY_PAGE: u8 = 15;

#[derive(Debug)]
pub struct CepasProtocol<T> {
    transport: T,
}

impl<T: Transport> CepasProtocol<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Selects the CEPAS application file. The card's answer doesn't matter.
    pub fn select_file(&mut self) -> Result<()> {
        let rsp = self
            .transport
            .call(&APDU::new(0x00, 0xA4, 0x00, 0x00, vec![0x40, 0x00]))?;
        debug!(sw1 = rsp.sw1, sw2 = rsp.sw2, "Selected CEPAS file");
        Ok(())
    }

    pub fn send(&mut self, req: &APDU) -> Result<Vec<u8>> {
        let span = trace_span!("cepas", ins = req.ins, p1 = req.p1);
        let _enter = span.enter();

        let rsp = self.transport.call(req)?;
        check_status(req.p1, rsp)
    }

    /// The purse read carries Lc=0 and then a zero byte anyway, which doesn't fit in an
    /// `APDU`; cards have been seen to reject the frame without it.
    pub fn get_purse(&mut self, purse_id: u8) -> Result<Vec<u8>> {
        let span = trace_span!("cepas", ins = READ_PURSE, p1 = purse_id);
        let _enter = span.enter();

        let mut req = APDU::new(0x90, READ_PURSE, purse_id, 0x00, vec![])
            .expect(0)
            .write()?;
        req.push(0x00);
        let rsp = Response::decode(&self.transport.transceive(&req)?)?;
        check_status(purse_id, rsp)
    }

    /// Reads `count` log records, in two requests if there are more than fit in one.
    pub fn get_history(&mut self, purse_id: u8, count: u8) -> Result<Vec<u8>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let first = count.min(HISTORY_PAGE);
        let mut data = self.send(
            &APDU::new(0x90, READ_PURSE, purse_id, 0x00, vec![0x00]).expect(first * 16),
        )?;

        if count > HISTORY_PAGE {
            let rest = (count - HISTORY_PAGE).min(HISTORY_PAGE);
            match self.send(
                &APDU::new(0x90, READ_PURSE, purse_id, 0x00, vec![HISTORY_PAGE])
                    .expect(rest * 16),
            ) {
                Ok(more) => data.extend_from_slice(&more),
                Err(err) if !err.is_transport() => {
                    warn!(purse = purse_id, %err, "Couldn't read second page of history")
                }
                Err(err) => return Err(err),
            }
        }
        Ok(data)
    }
}

fn check_status(file: u8, rsp: Response) -> Result<Vec<u8>> {
    match rsp.sw1 {
        0x90 => {}
        0x6B => {
            return Err(Error::Protocol(format!(
                "File {} was an invalid file.",
                file
            )))
        }
        0x67 => return Err(Error::Protocol("Got invalid file size response.".into())),
        sw1 => {
            return Err(Error::Protocol(format!(
                "Got generic invalid response: {:02x}",
                sw1
            )))
        }
    }
    match rsp.sw2 {
        0x00 => Ok(rsp.data),
        0x9D => Err(Error::Protocol("Permission denied".into())),
        sw2 => Err(Error::Protocol(format!("Unknown status code: {:02x}", sw2))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Scripted;

    #[test]
    fn test_get_purse() -> Result<()> {
        let t = Scripted::new().expect(&[0x90, 0x32, 0x03, 0x00, 0x00, 0x00], &[0x01, 0x02, 0x90, 0x00]);
        let mut proto = CepasProtocol::new(t);
        assert_eq!(proto.get_purse(3)?, vec![0x01, 0x02]);
        assert!(proto.into_inner().is_done());
        Ok(())
    }

    #[test]
    fn test_select_file_ignores_status() -> Result<()> {
        let t = Scripted::new().expect(&[0x00, 0xA4, 0x00, 0x00, 0x02, 0x40, 0x00], &[0x6A, 0x82]);
        CepasProtocol::new(t).select_file()
    }

    #[test]
    fn test_errors() {
        let cases: [(&[u8], &str); 5] = [
            (&[0x6B, 0x00], "File 5 was an invalid file."),
            (&[0x67, 0x00], "Got invalid file size response."),
            (&[0x6A, 0x82], "Got generic invalid response: 6a"),
            (&[0x90, 0x9D], "Permission denied"),
            (&[0x90, 0x01], "Unknown status code: 01"),
        ];
        for (rsp, want) in cases {
            let t = Scripted::new().expect(&[0x90, 0x32, 0x05, 0x00, 0x00, 0x00], rsp);
            match CepasProtocol::new(t).get_purse(5) {
                Err(Error::Protocol(msg)) => assert_eq!(msg, want),
                v => panic!("wrong result: {:?}", v),
            }
        }
    }

    #[test]
    fn test_get_history_single_page() -> Result<()> {
        let t = Scripted::new().expect(
            &[0x90, 0x32, 0x03, 0x00, 0x01, 0x00, 0x30],
            &[0xAA; 50].iter().copied().take(48).chain([0x90, 0x00]).collect::<Vec<_>>(),
        );
        let mut proto = CepasProtocol::new(t);
        assert_eq!(proto.get_history(3, 3)?.len(), 48);
        assert!(proto.into_inner().is_done());
        Ok(())
    }

    #[test]
    fn test_get_history_two_pages() -> Result<()> {
        let mut page1 = vec![0x11; 15 * 16];
        page1.extend_from_slice(&[0x90, 0x00]);
        let mut page2 = vec![0x22; 5 * 16];
        page2.extend_from_slice(&[0x90, 0x00]);

        let t = Scripted::new()
            .expect(&[0x90, 0x32, 0x03, 0x00, 0x01, 0x00, 0xF0], &page1)
            .expect(&[0x90, 0x32, 0x03, 0x00, 0x01, 0x0F, 0x50], &page2);
        let mut proto = CepasProtocol::new(t);
        let data = proto.get_history(3, 20)?;
        assert_eq!(data.len(), 20 * 16);
        assert_eq!(data[15 * 16], 0x22);
        assert!(proto.into_inner().is_done());
        Ok(())
    }

    #[test]
    fn test_get_history_second_page_fails() -> Result<()> {
        let mut page1 = vec![0x11; 15 * 16];
        page1.extend_from_slice(&[0x90, 0x00]);

        let t = Scripted::new()
            .expect(&[0x90, 0x32, 0x03, 0x00, 0x01, 0x00, 0xF0], &page1)
            .expect(&[0x90, 0x32, 0x03, 0x00, 0x01, 0x0F, 0x50], &[0x67, 0x00]);
        assert_eq!(CepasProtocol::new(t).get_history(3, 20)?.len(), 15 * 16);
        Ok(())
    }

    #[test]
    fn test_get_history_empty() -> Result<()> {
        let mut proto = CepasProtocol::new(Scripted::new());
        assert!(proto.get_history(3, 0)?.is_empty());
        Ok(())
    }
}
