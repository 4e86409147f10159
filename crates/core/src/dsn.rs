use url::Url;

use crate::error::{FaultlineError, Result};

/// Connection details decoded from a Sentry DSN
/// (`{scheme}://{public}:{secret}@{host}[:{port}][/{base}]/{project}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    pub scheme: String,
    /// Host, with `:port` appended when the DSN names a port.
    pub host: String,
    /// Path prefix in front of the project id, without trailing slash. Empty when absent.
    pub base_path: String,
    pub project_id: u64,
    pub public_key: String,
    pub secret_key: Option<String>,
}

impl Dsn {
    pub fn parse(dsn: &str) -> Result<Self> {
        let url = Url::parse(dsn.trim())
            .map_err(|e| FaultlineError::invalid_dsn(format!("not a valid URI: {e}")))?;

        let scheme = url.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(FaultlineError::invalid_dsn(format!(
                "unsupported scheme {scheme:?}"
            )));
        }

        let mut host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| FaultlineError::invalid_dsn("missing host"))?
            .to_string();
        // `Url::port` hides a default port even when it was written out.
        if let Some(port) = url
            .port()
            .or_else(|| names_port(dsn.trim()).then(|| url.port_or_known_default())?)
        {
            host.push_str(&format!(":{port}"));
        }

        let public_key = url.username();
        if public_key.is_empty() {
            return Err(FaultlineError::invalid_dsn("missing public key"));
        }
        let secret_key = url
            .password()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let path = url.path().trim_end_matches('/');
        let (base_path, project) = path
            .rsplit_once('/')
            .ok_or_else(|| FaultlineError::invalid_dsn("missing project id"))?;
        let project_id = project.parse::<u64>().map_err(|_| {
            FaultlineError::invalid_dsn(format!("project id {project:?} is not an integer"))
        })?;

        Ok(Self {
            scheme,
            host,
            base_path: base_path.to_string(),
            project_id,
            public_key: public_key.to_string(),
            secret_key,
        })
    }

    /// Endpoint of the legacy `store` API for this project
    pub fn store_url(&self) -> String {
        format!(
            "{}://{}{}/api/{}/store/",
            self.scheme, self.host, self.base_path, self.project_id
        )
    }
}

/// Whether the authority part of `dsn` ends in an explicit `:port`.
fn names_port(dsn: &str) -> bool {
    let rest = dsn.split_once("://").map_or(dsn, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    host_port
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}
