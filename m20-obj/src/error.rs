use std::{error::Error, fmt, io};

#[derive(Debug)]
pub enum ObjError {
    Io(io::Error),
    BadMagic,
    BadVersion(u32),
    Truncated,
    TooManyStrings,
}

impl fmt::Display for ObjError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjError::Io(err) => write!(f, "{}", err),
            ObjError::BadMagic => write!(f, "not an M20 object file (bad magic)"),
            ObjError::BadVersion(v) => write!(f, "unsupported object file version {}", v),
            ObjError::Truncated => write!(f, "object file is truncated"),
            ObjError::TooManyStrings => write!(f, "too many labels (string table index >= 65536)"),
        }
    }
}

impl Error for ObjError {}

impl From<io::Error> for ObjError {
    fn from(err: io::Error) -> ObjError {
        ObjError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, ObjError>;
