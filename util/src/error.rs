use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error in service description")]
    Wsdl(#[from] panopto_wsdl::error::Error),

    #[error("HTTP request failed")]
    Reqwest(#[from] reqwest::Error),

    #[error("Unable to parse URL")]
    Url(#[from] url::ParseError),

    #[error("Error reading XML")]
    Xml(#[from] quick_xml::Error),

    #[error("Unknown service {0}")]
    UnknownService(String),

    #[error("Unknown port {port} in service {service}")]
    UnknownPort { service: String, port: String },

    #[error("Unknown binding {0}")]
    UnknownBinding(String),

    #[error("Client is not bound to a port")]
    Unbound,

    #[error("Unknown operation {0}")]
    UnknownOperation(String),

    #[error("Operation {operation} has no argument {argument}")]
    UnknownArgument { operation: String, argument: String },

    #[error("Argument {argument} expects {expected}")]
    ArgumentType {
        argument: String,
        expected: &'static str,
    },

    #[error("SOAP fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}
