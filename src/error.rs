use std::io::Error as IoError;

use err_derive::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(display = "IO Error: {}", cause)]
    IoError { cause: IoError },
    #[error(display = "raw read returned fewer bytes than requested ({} of {})", got, wanted)]
    InsufficientData { got: usize, wanted: usize },
    #[error(display = "file is encrypted but its encryption key is unknown")]
    UnknownEncryptionKey,
    #[error(display = "compression type unsupported: {}", kind)]
    UnsupportedCodec { kind: String },
    #[error(display = "corrupt data: {}", reason)]
    CorruptData { reason: String },
    #[error(display = "not supported: {}", reason)]
    NotSupported { reason: String },
}

impl From<IoError> for Error {
    fn from(other: IoError) -> Self {
        Error::IoError { cause: other }
    }
}

impl Error {
    pub(crate) fn not_supported<S: Into<String>>(reason: S) -> Error {
        Error::NotSupported {
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt<S: Into<String>>(reason: S) -> Error {
        Error::CorruptData {
            reason: reason.into(),
        }
    }
}
