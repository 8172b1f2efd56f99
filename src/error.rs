use core::fmt::Debug;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("instance already started")]
    AlreadyStarted,
    #[error("instance already closed")]
    InstanceClosed,
    #[error("Failed to encode with bincode")]
    Encoding(#[from] bincode::Error),
    #[error("Message signature is not valid")]
    InvalidSignature,
    #[error("Could not construct public key from {len} bytes")]
    InvalidPublicKey { len: usize },
    #[error("Invalid SVP: {0}")]
    InvalidSvp(String),
    #[error("Invalid commit certificate: {0}")]
    InvalidCertificate(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("We experienced an IO error")]
    IO(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
