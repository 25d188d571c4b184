//! Error taxonomy (§7): configuration, resource, and runtime errors.
//!
//! Configuration and resource errors are fatal and carry a human-readable
//! message; there is no retry path anywhere in this crate. A caller that
//! wraps `run_quantity` in a binary is expected to map `KpmError` to a
//! process exit code itself — the core never calls `std::process::exit`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KpmError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("resource allocation failed: {message}")]
    Resource { message: String },

    #[error("runtime error at local site {site}: {message}")]
    Runtime { site: usize, message: String },
}

impl KpmError {
    pub fn config(message: impl Into<String>) -> Self {
        KpmError::Config {
            message: message.into(),
        }
    }

    pub fn resource(message: impl Into<String>) -> Self {
        KpmError::Resource {
            message: message.into(),
        }
    }

    pub fn runtime(site: usize, message: impl Into<String>) -> Self {
        KpmError::Runtime {
            site,
            message: message.into(),
        }
    }
}

pub type KpmResult<T> = Result<T, KpmError>;
