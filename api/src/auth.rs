use once_cell::sync::OnceCell;
use panopto_util::{
    arguments, envelope::SOAP_ENVELOPE_NAMESPACE, xml, Client, ReqwestTransport, Transport,
};
use std::{fmt, sync::Arc};
use tracing::{debug, info, warn};

use super::{
    endpoints::{self, Endpoint, AUTH_ENDPOINT},
    error::{Error, Result},
    proxy::ServiceProxy,
};

const TEMPURI: &str = "http://tempuri.org/";
const AUTH_BINDING: &str = "BasicHttpBinding_IAuth";
const LOG_ON_OPERATION: &str = "LogOnWithPassword";

/// Where a Panopto server lives and who to log on as.
#[derive(Clone)]
pub struct Credential {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Fetch the service description and send calls over https.
    pub use_tls: bool,

    /// Log on, if not already, and attach the session cookie before returning.
    pub authenticate_now: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            use_tls: false,
            authenticate_now: true,
        }
    }
}

enum LoginFailure {
    Rejected,
    Failed(Error),
}

impl From<Error> for LoginFailure {
    fn from(err: Error) -> Self {
        LoginFailure::Failed(err)
    }
}

/// Hands out clients for the services of one Panopto server, sharing a single
/// logged on session between all of them.
///
/// The session is established at most once, even when several threads ask for it
/// at the same time. [`AuthenticationManager::reauthenticate`] discards it.
pub struct AuthenticationManager {
    credential: Credential,
    transport: Arc<dyn Transport>,
    session: OnceCell<String>,
}

/// Reads the boolean result out of a `LogOnWithPassword` response envelope.
pub fn parse_log_on_response(body: &[u8]) -> Result<bool> {
    let unexpected =
        || Error::UnexpectedAuthenticationResponse(String::from_utf8_lossy(body).into_owned());

    let envelope = xml::Element::parse(body).map_err(|_| unexpected())?;

    let result = envelope
        .path(&[
            (SOAP_ENVELOPE_NAMESPACE, "Body"),
            (TEMPURI, "LogOnWithPasswordResponse"),
            (TEMPURI, "LogOnWithPasswordResult"),
        ])
        .ok_or_else(unexpected)?;

    Ok(result.text.trim().eq_ignore_ascii_case("true"))
}

impl AuthenticationManager {
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self> {
        Self::with_transport(host, username, password, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        host: &str,
        username: &str,
        password: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        if host.is_empty() {
            return Err(Error::InvalidArgument("a host is required"));
        }

        if username.is_empty() {
            return Err(Error::InvalidArgument("a username is required"));
        }

        Ok(Self {
            credential: Credential {
                host: host.to_owned(),
                username: username.to_owned(),
                password: password.to_owned(),
            },
            transport,
            session: OnceCell::new(),
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// The path of a named endpoint, or every known name when none is given.
    pub fn resolve_endpoint(name: Option<&str>) -> Result<Endpoint> {
        endpoints::resolve(name)
    }

    pub fn endpoint_path(name: &str) -> Result<String> {
        endpoints::path(name).ok_or_else(|| Error::UnknownEndpoint(name.to_owned()))
    }

    pub fn endpoint_names() -> Vec<&'static str> {
        endpoints::names()
    }

    /// The session cookie, once logged on.
    pub fn session_token(&self) -> Option<&str> {
        self.session.get().map(String::as_str)
    }

    fn endpoint_url(&self, path: &str, use_tls: bool) -> String {
        format!(
            "{}://{}/{}",
            if use_tls { "https" } else { "http" },
            self.credential.host,
            path.trim_start_matches('/')
        )
    }

    // Registered names resolve through the endpoint table; anything with a '/' is a path
    fn resolve_path(endpoint: &str) -> Result<String> {
        match endpoints::path(endpoint) {
            Some(path) => Ok(path),
            None if endpoint.contains('/') => Ok(endpoint.to_owned()),
            None => Err(Error::UnknownEndpoint(endpoint.to_owned())),
        }
    }

    /// A client for `endpoint`, which is either a registered name or a path on the host.
    ///
    /// A rejected login is logged and the client returned without a session.
    pub fn get_raw_client(&self, endpoint: &str, options: ClientOptions) -> Result<Client> {
        let path = Self::resolve_path(endpoint)?;
        let url = format!("{}?singleWsdl", self.endpoint_url(&path, options.use_tls));

        let mut client = Client::from_url_with(&url, self.transport.clone())?;

        if options.use_tls {
            if let Some(bound) = client.bound().map(|bound| bound.address.clone()) {
                if bound.scheme() != "https" {
                    let address = self.endpoint_url(&path, true);
                    debug!("Redirecting {} to {}", bound, address);
                    client.set_address(&address)?;
                }
            }
        }

        if options.authenticate_now && !self.ensure_authenticated(&mut client)? {
            warn!(
                "Log on as {} was rejected, {} is not authenticated",
                self.credential.username, endpoint
            );
        }

        Ok(client)
    }

    pub fn get_client(&self, endpoint: &str, options: ClientOptions) -> Result<ServiceProxy> {
        ServiceProxy::new(Some(self.get_raw_client(endpoint, options)?))
    }

    /// Logs on if needed and attaches the session cookie to `client`.
    ///
    /// Returns `false` without touching the client when the login is rejected.
    pub fn ensure_authenticated(&self, client: &mut Client) -> Result<bool> {
        if !self.authenticate()? {
            return Ok(false);
        }

        if let Some(token) = self.session_token() {
            client.set_header("Cookie", token);
        }

        Ok(true)
    }

    /// Logs on unless a session already exists.
    pub fn authenticate(&self) -> Result<bool> {
        match self.session.get_or_try_init(|| self.log_on()) {
            Ok(_) => Ok(true),
            Err(LoginFailure::Rejected) => Ok(false),
            Err(LoginFailure::Failed(err)) => Err(err),
        }
    }

    /// Discards the current session and logs on again.
    pub fn reauthenticate(&mut self) -> Result<bool> {
        if self.session.take().is_some() {
            debug!("Discarded session for {}", self.credential.username);
        }

        self.authenticate()
    }

    fn log_on(&self) -> Result<String, LoginFailure> {
        let path = Self::endpoint_path(AUTH_ENDPOINT)?;
        info!(
            "Logging on to {} as {}",
            self.credential.host, self.credential.username
        );

        let mut client = self.get_raw_client(
            &path,
            ClientOptions {
                use_tls: true,
                authenticate_now: false,
            },
        )?;

        client
            .bind_to(TEMPURI, AUTH_BINDING, &self.endpoint_url(&path, true))
            .map_err(Error::from)?;

        let response = client
            .call_raw(
                LOG_ON_OPERATION,
                &arguments! {
                    "userKey" => self.credential.username.as_str(),
                    "password" => self.credential.password.as_str(),
                },
            )
            .map_err(Error::from)?;

        if response.status != 200 {
            warn!("Log on failed with HTTP status {}", response.status);
            return Err(LoginFailure::Rejected);
        }

        if !parse_log_on_response(&response.body)? {
            warn!("Log on as {} was refused", self.credential.username);
            return Err(LoginFailure::Rejected);
        }

        let cookies = response.header_all("Set-Cookie");
        if cookies.is_empty() {
            return Err(LoginFailure::Failed(
                Error::UnexpectedAuthenticationResponse(
                    "log on succeeded without a Set-Cookie header".to_owned(),
                ),
            ));
        }

        info!("Logged on as {}", self.credential.username);
        Ok(cookies.join(", "))
    }
}
