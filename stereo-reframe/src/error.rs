use snafu::Snafu;

use crate::{sink::SinkError, source::SourceError};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid configuration: {message}"))]
    Config { message: String },
    #[snafu(context(false), display("source error: {source}"))]
    Source { source: SourceError },
    #[snafu(display("resampling failed: {message}"))]
    Resample { message: String },
    #[snafu(display("encoder error: {message}"))]
    Encode { message: String },
    #[snafu(context(false), display("sink error: {source}"))]
    Sink { source: SinkError },
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
