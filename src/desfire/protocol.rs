//! DESFire native commands, wrapped in ISO 7816 frames.
//!
//! Every command goes out as `90 <cmd> 00 00 [Lc params] 00` and comes back with
//! SW1=0x91 and the native status code in SW2. Long responses are split into frames;
//! the card says 0xAF until we've drained them all.
//!
//! https://github.com/nfc-tools/libfreefare/blob/master/libfreefare/mifare_desfire.c
use num_enum::{FromPrimitive, IntoPrimitive};
use tracing::{debug, trace, trace_span};

use super::{FileSettings, ManufacturingData};
use crate::protocol::APDU;
use crate::transport::Transport;
use crate::{util, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum Command {
    GetManufacturingData = 0x60,
    GetApplicationDirectory = 0x6A,
    AdditionalFrame = 0xAF,
    SelectApplication = 0x5A,
    ReadData = 0xBD,
    ReadRecord = 0xBB,
    GetValue = 0x6C,
    GetFiles = 0x6F,
    GetFileSettings = 0xF5,
}

/// Native status codes, as they appear in SW2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Status {
    OperationOk = 0x00,
    PermissionDenied = 0x9D,
    AuthenticationError = 0xAE,
    AdditionalFrame = 0xAF,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Talks to a DESFire card over some transport.
#[derive(Debug)]
pub struct DesfireProtocol<T> {
    transport: T,
}

impl<T: Transport> DesfireProtocol<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn wrap(cmd: u8, params: &[u8]) -> APDU {
        APDU::new(0x90, cmd, 0x00, 0x00, params).expect(0)
    }

    /// Sends a command and collects every frame of the response.
    pub fn send(&mut self, cmd: Command, params: &[u8]) -> Result<Vec<u8>> {
        let span = trace_span!("desfire", ?cmd);
        let _enter = span.enter();

        let mut out = Vec::new();
        let mut rsp = self.transport.call(&Self::wrap(cmd.into(), params))?;
        loop {
            if rsp.sw1 != 0x91 {
                return Err(Error::Protocol("Invalid response".into()));
            }
            out.extend_from_slice(&rsp.data);

            match Status::from(rsp.sw2) {
                Status::OperationOk => return Ok(out),
                Status::AdditionalFrame => {
                    trace!(have = out.len(), "Additional frame pending");
                    rsp = self
                        .transport
                        .call(&Self::wrap(Command::AdditionalFrame.into(), &[]))?;
                }
                Status::PermissionDenied => return Err(Error::PermissionDenied),
                Status::AuthenticationError => return Err(Error::AuthenticationError),
                Status::Unknown(code) => {
                    return Err(Error::Protocol(format!("Unknown status code: {:02x}", code)))
                }
            }
        }
    }

    pub fn get_manufacturing_data(&mut self) -> Result<ManufacturingData> {
        ManufacturingData::parse(&self.send(Command::GetManufacturingData, &[])?)
    }

    /// Lists application IDs. Each is 3 bytes, read big-endian.
    pub fn get_app_list(&mut self) -> Result<Vec<u32>> {
        let data = self.send(Command::GetApplicationDirectory, &[])?;
        let ids: Vec<u32> = data
            .chunks_exact(3)
            .map(|chunk| util::be_uint(chunk) as u32)
            .collect();
        debug!("Applications: {:06X?}", ids);
        Ok(ids)
    }

    pub fn select_app(&mut self, app_id: u32) -> Result<()> {
        let id = app_id.to_be_bytes();
        self.send(Command::SelectApplication, &id[1..])?;
        Ok(())
    }

    pub fn get_file_list(&mut self) -> Result<Vec<u8>> {
        self.send(Command::GetFiles, &[])
    }

    pub fn get_file_settings(&mut self, file_id: u8) -> Result<FileSettings> {
        FileSettings::parse(&self.send(Command::GetFileSettings, &[file_id])?)
    }

    /// Reads a whole standard or backup file.
    pub fn read_file(&mut self, file_id: u8) -> Result<Vec<u8>> {
        self.send(Command::ReadData, &[file_id, 0, 0, 0, 0, 0, 0])
    }

    /// Reads every record of a linear or cyclic record file.
    pub fn read_record(&mut self, file_id: u8) -> Result<Vec<u8>> {
        self.send(Command::ReadRecord, &[file_id, 0, 0, 0, 0, 0, 0])
    }

    pub fn get_value(&mut self, file_id: u8) -> Result<Vec<u8>> {
        self.send(Command::GetValue, &[file_id])
    }
}
