use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to parse provided URL")]
    UrlParseError(#[from] url::ParseError),

    #[error("Unable to convert provided path")]
    PathConversionError(Option<std::io::Error>),

    #[error("Unable to open file")]
    FileOpenError(#[from] std::io::Error),

    #[error("Unable to get file from server")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Unable to load {url}")]
    LoadError {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Unsupported URL scheme {0}")]
    UnsupportedScheme(String),

    #[error("Error parsing XML input")]
    XmlParseError(#[from] quick_xml::Error),

    #[error("Element {element} is missing the {attribute} attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("Element {parent} has no {element} child")]
    MissingElement {
        parent: String,
        element: &'static str,
    },

    #[error("Namespace prefix {0:?} is not declared")]
    UnresolvedPrefix(String),

    #[error("No target namespace in scope for {0}")]
    NoTargetNamespace(String),

    #[error("Invalid occurrence bound {0:?}")]
    InvalidOccurs(String),

    #[error("Unexpected {0} outside of its parent block")]
    UnexpectedNesting(&'static str),

    #[error("Unknown {kind} {name}")]
    UnknownReference { kind: &'static str, name: String },
}
