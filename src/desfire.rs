//! MIFARE DESFire: applications full of files.
//!
//! We only ever read files with "free" access rights; anything that needs a key comes
//! back as an Unauthorized file rather than failing the whole card.
//!
//! NXP doesn't publish the datasheet, but libfreefare is a decent stand-in:
//! https://github.com/nfc-tools/libfreefare
pub mod file;
pub mod manufacturing;
pub mod protocol;
pub mod settings;

pub use file::DesfireFile;
pub use manufacturing::ManufacturingData;
pub use protocol::DesfireProtocol;
pub use settings::{FileSettings, FileType, SettingsDetail};

use chrono::{DateTime, Utc};
use tracing::{debug, trace_span, warn};

use crate::transport::Transport;
use crate::util::ByteArray;
use crate::{Error, Result};

pub type IResult<'a, T> = nom::IResult<&'a [u8], T>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesfireApplication {
    /// 24-bit application ID.
    pub id: u32,
    pub files: Vec<DesfireFile>,
}

impl DesfireApplication {
    pub fn file(&self, id: u8) -> Option<&DesfireFile> {
        self.files.iter().find(|f| f.id() == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesfireCard {
    pub tag_id: ByteArray,
    pub scanned_at: DateTime<Utc>,
    pub manufacturing_data: ManufacturingData,
    pub applications: Vec<DesfireApplication>,
}

impl DesfireCard {
    pub fn application(&self, id: u32) -> Option<&DesfireApplication> {
        self.applications.iter().find(|app| app.id == id)
    }

    /// Shorthand for the contents of a standard file.
    pub fn file_data(&self, app_id: u32, file_id: u8) -> Option<&[u8]> {
        self.application(app_id)?.file(file_id)?.data()
    }
}

/// Reads every application and file we're allowed to see.
pub fn read_card<T: Transport>(transport: T, tag_id: &[u8]) -> Result<DesfireCard> {
    let span = trace_span!("desfire", tag_id = hex::encode_upper(tag_id));
    let _enter = span.enter();

    let mut proto = DesfireProtocol::new(transport);
    debug!("Reading manufacturing data...");
    let manufacturing_data = proto.get_manufacturing_data()?;

    let mut applications = Vec::new();
    for app_id in proto.get_app_list()? {
        debug!(app_id = format!("{:06X}", app_id), "Reading application...");
        proto.select_app(app_id)?;

        let mut files = Vec::new();
        for file_id in proto.get_file_list()? {
            files.push(read_file(&mut proto, file_id)?);
        }
        applications.push(DesfireApplication { id: app_id, files });
    }

    Ok(DesfireCard {
        tag_id: tag_id.into(),
        scanned_at: Utc::now(),
        manufacturing_data,
        applications,
    })
}

fn read_file<T: Transport>(proto: &mut DesfireProtocol<T>, id: u8) -> Result<DesfireFile> {
    let settings = match proto.get_file_settings(id) {
        Ok(settings) => settings,
        Err(err) => return degrade(id, None, err),
    };
    debug!(file = id, file_type = %settings.file_type, "Reading file...");

    let raw = match settings.file_type {
        FileType::Standard | FileType::Backup => proto.read_file(id),
        FileType::Value => proto.get_value(id),
        FileType::LinearRecord | FileType::CyclicRecord => proto.read_record(id),
    };
    match raw.and_then(|raw| DesfireFile::decode(id, settings, &raw)) {
        Ok(file) => Ok(file),
        Err(err) => degrade(id, Some(settings), err),
    }
}

/// Pins a failure on a single file, unless the transport itself went away.
fn degrade(id: u8, settings: Option<FileSettings>, err: Error) -> Result<DesfireFile> {
    if err.is_transport() {
        return Err(err);
    }
    warn!(file = id, %err, "Couldn't read file");
    let error = err.to_string();
    Ok(if err.is_access_denied() {
        DesfireFile::Unauthorized {
            id,
            settings,
            error,
        }
    } else {
        DesfireFile::Invalid {
            id,
            settings,
            error,
        }
    })
}
