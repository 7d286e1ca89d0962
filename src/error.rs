//! Error taxonomy for the generator.
//!
//! Runtime errors raised while (de)serializing message values live in
//! [`crate::wire`]; everything the generator itself can fail with is here.

use std::io;

use thiserror::Error;

/// Errors produced while loading specs or generating code.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed `.msg`/`.srv` input text.
    #[error("invalid message specification: {0}")]
    InvalidMsgSpec(String),

    /// Reference to a type that is not registered in the [`crate::MsgContext`].
    ///
    /// Usually means a dependency package is missing from the search path.
    #[error("unknown type [{0}]; check that dependencies are declared on the search path")]
    UnknownType(String),

    /// Generator-internal failure: invalid array spec, illegal package name,
    /// malformed dynamic text dump, recursive embedded type.
    #[error("message generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Exit code the command line driver maps this error to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidMsgSpec(_) => 1,
            Error::UnknownType(_) | Error::Generation(_) => 2,
            Error::Io(_) => 3,
        }
    }
}
