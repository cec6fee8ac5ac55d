#![allow(dead_code)]

use bytes::Bytes;
use panopto_util::{error::Error, HttpRequest, RawResponse, Transport};
use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};
use url::Url;

pub const HOST: &str = "panopto.example.com";

pub const USAGE_REPORTING: &str = include_str!("../../../wsdl/tests/fixtures/UsageReporting.wsdl");
pub const AUTH: &str = include_str!("../../../wsdl/tests/fixtures/Auth.wsdl");

pub const USAGE_REPORTING_WSDL: &str =
    "http://panopto.example.com/Panopto/PublicAPI/4.0/UsageReporting.svc?singleWsdl";
pub const AUTH_WSDL: &str = "https://panopto.example.com/Panopto/PublicAPI/4.2/Auth.svc?singleWsdl";
pub const AUTH_ADDRESS: &str = "https://panopto.example.com/Panopto/PublicAPI/4.2/Auth.svc";

/// Serves fixed documents for GET and queued responses for POST, recording every request.
#[derive(Default)]
pub struct ScriptedTransport {
    documents: HashMap<String, String>,
    responses: Mutex<VecDeque<RawResponse>>,
    fetched: Mutex<Vec<Url>>,
    posted: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Serves the auth and usage reporting descriptions of [`HOST`].
    pub fn panopto() -> Self {
        Self::default()
            .with_document(AUTH_WSDL, AUTH)
            .with_document(USAGE_REPORTING_WSDL, USAGE_REPORTING)
    }

    pub fn with_document(mut self, url: &str, document: &str) -> Self {
        self.documents.insert(url.to_owned(), document.to_owned());
        self
    }

    pub fn respond(&self, response: RawResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn fetched(&self) -> Vec<Url> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn posted(&self) -> Vec<HttpRequest> {
        self.posted.lock().unwrap().clone()
    }

    pub fn posted_to(&self, address: &str) -> Vec<HttpRequest> {
        self.posted()
            .into_iter()
            .filter(|request| request.url.as_str() == address)
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &Url, _: &[(String, String)]) -> Result<RawResponse, Error> {
        self.fetched.lock().unwrap().push(url.clone());

        Ok(match self.documents.get(url.as_str()) {
            Some(document) => response(200, &[], document),
            None => response(404, &[], "not found"),
        })
    }

    fn post(&self, request: HttpRequest) -> Result<RawResponse, Error> {
        self.posted.lock().unwrap().push(request);

        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| response(500, &[], "no response scripted")))
    }
}

pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> RawResponse {
    RawResponse {
        status,
        headers: headers
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        body: Bytes::from(body.to_owned()),
    }
}

pub fn envelope(body: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>{}</s:Body></s:Envelope>"#,
        body
    )
}

pub fn log_on_response(status: u16, result: &str, cookies: &[&str]) -> RawResponse {
    let headers: Vec<_> = cookies.iter().map(|cookie| ("Set-Cookie", *cookie)).collect();

    response(
        status,
        &headers,
        &envelope(&format!(
            r#"<LogOnWithPasswordResponse xmlns="http://tempuri.org/"><LogOnWithPasswordResult>{}</LogOnWithPasswordResult></LogOnWithPasswordResponse>"#,
            result
        )),
    )
}
