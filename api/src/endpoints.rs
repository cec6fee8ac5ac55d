use super::error::{Error, Result};

pub const ENDPOINT_BASE: &str = "Panopto/PublicAPI";

pub const AUTH_ENDPOINT: &str = "Auth";

/// Registered services and the API version each is served at.
pub const ENDPOINTS: &[(&str, &str)] = &[
    ("AccessManagement", "4.0"),
    ("Auth", "4.2"),
    ("RemoteRecorderManagement", "4.2"),
    ("SessionManagement", "4.6"),
    ("UsageReporting", "4.0"),
    ("UserManagement", "4.0"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Path(String),
    Names(Vec<&'static str>),
}

pub fn version(name: &str) -> Option<&'static str> {
    ENDPOINTS
        .iter()
        .find(|(endpoint, _)| *endpoint == name)
        .map(|(_, version)| *version)
}

/// `Panopto/PublicAPI/<version>/<name>.svc` for a registered name.
pub fn path(name: &str) -> Option<String> {
    version(name).map(|version| format!("{}/{}/{}.svc", ENDPOINT_BASE, version, name))
}

/// Registered names, sorted and without duplicates.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = ENDPOINTS.iter().map(|(name, _)| *name).collect();
    names.sort_unstable();
    names.dedup();
    names
}

pub fn resolve(name: Option<&str>) -> Result<Endpoint> {
    match name {
        Some(name) => path(name)
            .map(Endpoint::Path)
            .ok_or_else(|| Error::UnknownEndpoint(name.to_owned())),

        None => Ok(Endpoint::Names(names())),
    }
}
