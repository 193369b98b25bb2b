use crate::{Error, Result};
use std::convert::TryInto;

/// A command frame. Both DESFire (in ISO 7816 wrapping mode) and CEPAS speak this with
/// CLA=0x90, they just disagree about what the status word means.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class- and instruction bytes.
    pub cla: u8,
    pub ins: u8,

    /// Arguments to the command. Some commands use these, others just use data.
    pub p1: u8,
    pub p2: u8,

    /// Command data! The length field is set automatically when writing.
    pub data: Vec<u8>,

    /// Expected response length, where 0 = "whatever you've got".
    /// None leaves the Le byte off entirely.
    pub le: Option<u8>,
}

impl APDU {
    pub fn new<D: Into<Vec<u8>>>(cla: u8, ins: u8, p1: u8, p2: u8, data: D) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: data.into(),
            le: None,
        }
    }

    pub fn expect(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Serialises the frame: CLA INS P1 P2 [Lc data...] [Le].
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(6 + self.data.len());
        buf.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);
        if !self.data.is_empty() {
            let lc: u8 = self.data.len().try_into().map_err(|_| {
                Error::Protocol(format!("APDU body too long: {} bytes", self.data.len()))
            })?;
            buf.push(lc);
            buf.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            buf.push(le);
        }
        Ok(buf)
    }
}

/// A response frame, split into data and the two trailing status bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl Response {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (sw2, data) = data
            .split_last()
            .ok_or_else(|| Error::Protocol("data truncated: no SW2".into()))?;
        let (sw1, data) = data
            .split_last()
            .ok_or_else(|| Error::Protocol("data truncated: no SW1".into()))?;
        Ok(Self {
            data: data.to_vec(),
            sw1: *sw1,
            sw2: *sw2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_header_only() -> Result<()> {
        let buf = APDU::new(0x90, 0x6A, 0x00, 0x00, vec![]).write()?;
        assert_eq!(&buf, &[0x90, 0x6A, 0x00, 0x00]);
        Ok(())
    }

    #[test]
    fn test_write_le() -> Result<()> {
        let buf = APDU::new(0x90, 0x32, 0x03, 0x00, vec![]).expect(0).write()?;
        assert_eq!(&buf, &[0x90, 0x32, 0x03, 0x00, 0x00]);
        Ok(())
    }

    #[test]
    fn test_write_body_le() -> Result<()> {
        let buf = APDU::new(0x90, 0x5A, 0x00, 0x00, vec![0x30, 0x10, 0xF2])
            .expect(0)
            .write()?;
        assert_eq!(&buf, &[0x90, 0x5A, 0x00, 0x00, 0x03, 0x30, 0x10, 0xF2, 0x00]);
        Ok(())
    }

    #[test]
    fn test_write_body_too_long() {
        let body: Vec<u8> = std::iter::repeat(0x69).take(512).collect();
        match APDU::new(0x90, 0xBD, 0x00, 0x00, body).write() {
            Err(Error::Protocol(msg)) => assert_eq!(msg, "APDU body too long: 512 bytes"),
            v => panic!("wrong result: {:?}", v),
        }
    }

    #[test]
    fn test_decode_status_only() -> Result<()> {
        let res = Response::decode(&[0x91, 0x00])?;
        assert_eq!(
            res,
            Response {
                data: vec![],
                sw1: 0x91,
                sw2: 0x00,
            }
        );
        Ok(())
    }

    #[test]
    fn test_decode_body() -> Result<()> {
        let res = Response::decode(&[0x12, 0x34, 0x56, 0x78, 0x90, 0x00])?;
        assert_eq!(
            res,
            Response {
                data: vec![0x12, 0x34, 0x56, 0x78],
                sw1: 0x90,
                sw2: 0x00,
            }
        );
        Ok(())
    }

    #[test]
    fn test_decode_truncated() {
        assert!(matches!(Response::decode(&[]), Err(Error::Protocol(_))));
        assert!(matches!(Response::decode(&[0x90]), Err(Error::Protocol(_))));
    }
}
