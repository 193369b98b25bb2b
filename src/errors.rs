use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PC/SC error: {0}")]
    PCSC(#[from] pcsc::Error),

    /// A status word we have no better name for.
    #[error("card returned status {0:02X} {1:02X}")]
    APDU(u8, u8),

    #[error("authentication error")]
    AuthenticationError,

    #[error("permission denied")]
    PermissionDenied,

    /// Framing or status failure, with a human readable description.
    #[error("{0}")]
    Protocol(String),

    #[error("{what} truncated: need {need} bytes, have {have}")]
    Truncated {
        what: &'static str,
        need: usize,
        have: usize,
    },

    #[error("unknown file type: {0:#04x}")]
    UnknownFileType(u8),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{0}")]
    Invalid(String),

    #[error("unsupported card")]
    UnsupportedCard,
}

impl Error {
    /// Transport failures abort a read; everything else can be pinned to
    /// the file or purse that caused it.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::PCSC(_))
    }

    /// True for the errors a card answers with when we lack the keys.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::AuthenticationError)
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(e: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        match e {
            nom::Err::Incomplete(needed) => Self::Parse(format!("incomplete: {:?}", needed)),
            nom::Err::Error(err) | nom::Err::Failure(err) => {
                Self::Parse(format!("{:?} with {} bytes left", err.code, err.input.len()))
            }
        }
    }
}

/// Fails with [`Error::Truncated`] unless `data` holds at least `need` bytes.
pub fn ensure_len(what: &'static str, data: &[u8], need: usize) -> Result<()> {
    if data.len() < need {
        Err(Error::Truncated {
            what,
            need,
            have: data.len(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len("purse", &[0; 4], 4).is_ok());
        match ensure_len("purse", &[0; 3], 4) {
            Err(Error::Truncated { what, need, have }) => {
                assert_eq!((what, need, have), ("purse", 4, 3))
            }
            v => panic!("wrong result: {:?}", v),
        }
    }

    #[test]
    fn test_transport_classification() {
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "gone"));
        assert!(io.is_transport());
        assert!(!Error::PermissionDenied.is_transport());
        assert!(Error::PermissionDenied.is_access_denied());
        assert!(Error::AuthenticationError.is_access_denied());
        assert!(!Error::Protocol("nope".into()).is_access_denied());
    }
}
