use std::io;

#[derive(Debug)]
pub enum Error {
    IOError(io::Error),
    MalformedFile(&'static str),
    InvalidParameterSets(String),
    Other(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IOError(err) => err.fmt(f),
            Error::MalformedFile(reason) => write!(f, "malformed file: {}", reason),
            Error::InvalidParameterSets(reason) => write!(f, "invalid parameter sets: {}", reason),
            Error::Other(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IOError(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
