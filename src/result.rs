use std::fmt::Display;

use miette::miette;

#[derive(Debug)]
pub enum Error {
    /// The provider reported that the requested stream cannot be served.
    UnavailableStream,

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Miette(miette!("{err}"))
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::UnavailableStream => miette!("Unavailable stream"),
            Error::Miette(err) => err,
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

/// Shorthand to build an `Err` out of a simple message.
pub fn bail<T, D: Display + Send + Sync + 'static>(msg: D) -> Result<T> {
    Err(Error::Miette(miette!("{msg}")))
}

pub type Result<T> = std::result::Result<T, Error>;
