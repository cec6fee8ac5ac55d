use thiserror::Error;

use super::signature::SignatureError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Invalid type signature {signature:?}")]
    InvalidType {
        signature: String,
        #[source]
        source: SignatureError,
    },

    #[error("Unable to read the signature of {operation}")]
    InvalidServiceConfiguration {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unexpected response from LogOnWithPassword: {0}")]
    UnexpectedAuthenticationResponse(String),

    #[error("Unknown endpoint {0}")]
    UnknownEndpoint(String),

    #[error("Unknown service {0}")]
    UnknownService(String),

    #[error("Unknown port {port} in service {service}")]
    UnknownPort { service: String, port: String },

    #[error("Service description has no service with a port")]
    NoServiceAvailable,

    #[error(transparent)]
    Soap(#[from] panopto_util::error::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
