use std::path::Path;
use url::Url;

mod loader;
mod parser;

pub mod error;
pub mod signature;
pub mod types;

pub use loader::{DefaultLoader, Loader};

/// Accepts either a URL or a local path, relative paths being resolved against the working directory.
pub fn resolve_url(url: &str) -> Result<Url, error::Error> {
    match Url::parse(url) {
        Ok(url) => Ok(url),

        Err(url::ParseError::RelativeUrlWithoutBase) => Url::from_file_path(
            &Path::new(url)
                .canonicalize()
                .map_err(|err| error::Error::PathConversionError(Some(err)))?,
        )
        .map_err(|()| error::Error::PathConversionError(None)),

        Err(err) => Err(err.into()),
    }
}

pub fn parse<S: AsRef<str>>(
    url: S,
) -> Result<(types::Definition, types::Namespaces), error::Error> {
    parse_with(url, &DefaultLoader)
}

pub fn parse_with<S: AsRef<str>>(
    url: S,
    loader: &dyn Loader,
) -> Result<(types::Definition, types::Namespaces), error::Error> {
    parser::parse(resolve_url(url.as_ref())?, loader)
}

/// Parses an already fetched document, loading anything it imports through `loader`.
pub fn parse_document(
    url: &Url,
    document: &[u8],
    loader: &dyn Loader,
) -> Result<(types::Definition, types::Namespaces), error::Error> {
    parser::parse_document(url.clone(), document, loader)
}
