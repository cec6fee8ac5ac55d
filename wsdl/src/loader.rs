use tracing::debug;
use url::Url;

use super::error;

/// Fetches the raw bytes of a document referenced while parsing.
pub trait Loader {
    fn load(&self, url: &Url) -> Result<Vec<u8>, error::Error>;
}

/// Loads `file` URLs from disk and `http(s)` URLs with a blocking reqwest request.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLoader;

impl Loader for DefaultLoader {
    fn load(&self, url: &Url) -> Result<Vec<u8>, error::Error> {
        debug!("Loading {}", url);

        match url.scheme() {
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| error::Error::PathConversionError(None))?;

                Ok(std::fs::read(path)?)
            }

            "http" | "https" => {
                let response = reqwest::blocking::get(url.clone())?.error_for_status()?;
                Ok(response.bytes()?.to_vec())
            }

            scheme => Err(error::Error::UnsupportedScheme(scheme.to_owned())),
        }
    }
}

impl<L: Loader + ?Sized> Loader for &L {
    fn load(&self, url: &Url) -> Result<Vec<u8>, error::Error> {
        (**self).load(url)
    }
}
