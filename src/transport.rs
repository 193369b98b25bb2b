use crate::protocol::{Response, APDU};
use crate::Result;
use tracing::{trace, trace_span};

/// Something that can exchange frames with a card: a PC/SC reader, a phone's NFC stack,
/// or a script in a test.
pub trait Transport {
    /// Sends a raw frame and returns the raw reply, status bytes included.
    /// As a user, you probably want call(), not this.
    fn transceive(&mut self, req: &[u8]) -> Result<Vec<u8>>;

    /// Writes an APDU, sends it, and splits the status word off the response.
    /// No retries; a half-finished multi-frame exchange isn't safe to replay blindly.
    fn call(&mut self, req: &APDU) -> Result<Response> {
        let span = trace_span!("call", ins = req.ins);
        let _enter = span.enter();

        let req = req.write()?;
        trace!(req = hex::encode_upper(&req), ">> TX");
        let rsp = self.transceive(&req)?;
        trace!(rsp = hex::encode_upper(&rsp), "<< RX");
        Response::decode(&rsp)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn transceive(&mut self, req: &[u8]) -> Result<Vec<u8>> {
        (**self).transceive(req)
    }
}

/// Replays a fixed conversation, failing the test if we say something unexpected.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Scripted {
    steps: std::collections::VecDeque<(Vec<u8>, std::result::Result<Vec<u8>, std::io::ErrorKind>)>,
}

#[cfg(test)]
impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(mut self, req: &[u8], rsp: &[u8]) -> Self {
        self.steps.push_back((req.to_vec(), Ok(rsp.to_vec())));
        self
    }

    pub fn expect_io_error(mut self, req: &[u8], kind: std::io::ErrorKind) -> Self {
        self.steps.push_back((req.to_vec(), Err(kind)));
        self
    }

    pub fn is_done(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
impl Transport for Scripted {
    fn transceive(&mut self, req: &[u8]) -> Result<Vec<u8>> {
        let (want, rsp) = self
            .steps
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request: {}", hex::encode_upper(req)));
        assert_eq!(
            hex::encode_upper(req),
            hex::encode_upper(&want),
            "request doesn't match script"
        );
        rsp.map_err(|kind| std::io::Error::new(kind, "scripted failure").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_call_splits_status() -> Result<()> {
        let mut t = Scripted::new().expect(&[0x90, 0x60, 0x00, 0x00, 0x00], &[0xAA, 0x91, 0xAF]);
        let rsp = t.call(&APDU::new(0x90, 0x60, 0x00, 0x00, vec![]).expect(0))?;
        assert_eq!(rsp.data, vec![0xAA]);
        assert_eq!((rsp.sw1, rsp.sw2), (0x91, 0xAF));
        assert!(t.is_done());
        Ok(())
    }

    #[test]
    fn test_call_io_error() {
        let mut t = Scripted::new().expect_io_error(&[0x00, 0xA4, 0x00, 0x00], std::io::ErrorKind::TimedOut);
        match t.call(&APDU::new(0x00, 0xA4, 0x00, 0x00, vec![])) {
            Err(err @ Error::Io(_)) => assert!(err.is_transport()),
            v => panic!("wrong result: {:?}", v),
        }
    }
}
