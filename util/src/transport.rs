use bytes::Bytes;
use panopto_wsdl::{error::Error as WsdlError, DefaultLoader, Loader};
use reqwest::blocking::{Client as Reqwest, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::error::Error;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// An undecoded HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Blocking HTTP used for fetching service descriptions and posting envelopes.
pub trait Transport: Send + Sync {
    fn get(&self, url: &Url, headers: &[(String, String)]) -> Result<RawResponse, Error>;

    fn post(&self, request: HttpRequest) -> Result<RawResponse, Error>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Reqwest,
}

/// Resolves imports of a service description through a [`Transport`].
pub struct TransportLoader<'t> {
    transport: &'t dyn Transport,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Reqwest::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            client: Reqwest::builder().timeout(timeout).build()?,
        })
    }

    fn send(request: RequestBuilder, headers: &[(String, String)]) -> Result<RawResponse, Error> {
        let response = headers
            .iter()
            .fold(request, |request, (name, value)| {
                request.header(name.as_str(), value.as_str())
            })
            .send()?;

        Self::convert(response)
    }

    fn convert(response: Response) -> Result<RawResponse, Error> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();

        let body = response.bytes()?;
        trace!("Received {} bytes with status {}", body.len(), status);

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &Url, headers: &[(String, String)]) -> Result<RawResponse, Error> {
        debug!("GET {}", url);
        Self::send(self.client.get(url.clone()), headers)
    }

    fn post(&self, request: HttpRequest) -> Result<RawResponse, Error> {
        debug!("POST {}", request.url);
        Self::send(
            self.client.post(request.url).body(request.body),
            &request.headers,
        )
    }
}

impl<'t> TransportLoader<'t> {
    pub fn new(transport: &'t dyn Transport) -> Self {
        Self { transport }
    }
}

impl Loader for TransportLoader<'_> {
    fn load(&self, url: &Url) -> Result<Vec<u8>, WsdlError> {
        if url.scheme() == "file" {
            return DefaultLoader.load(url);
        }

        let load_error = |source: Error| WsdlError::LoadError {
            url: url.to_string(),
            source: Box::new(source),
        };

        let response = self.transport.get(url, &[]).map_err(load_error)?;

        if !response.is_success() {
            return Err(load_error(Error::Status {
                status: response.status,
                body: response.text(),
            }));
        }

        Ok(response.body.to_vec())
    }
}
