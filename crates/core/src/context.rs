//! Snapshot of the execution environment an event is captured in.
//!
//! The host fills a [`CaptureContext`] from its request state and passes it
//! to event construction; nothing in this crate reads process-global
//! request data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use woothee::parser::{Parser, WootheeResult};

#[derive(Debug, Clone, Default)]
pub struct CaptureContext {
    pub server_name: Option<String>,
    pub release: Option<String>,
    pub environment: Option<String>,
    pub platform: Option<String>,
    pub app: AppInfo,
    pub runtime: RuntimeInfo,
    pub user: UserInfo,
    pub request: Option<RequestInfo>,
    pub user_agent: Option<String>,
    pub modules: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct AppInfo {
    pub name: String,
    pub version: Option<String>,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: "DokuWiki".to_string(),
            version: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub name: String,
    pub version: Option<String>,
    pub os: Option<String>,
    /// Server API the runtime is embedded through (cli, fpm-fcgi, apache2handler, ...)
    pub sapi: Option<String>,
    pub server: Option<String>,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            name: "PHP".to_string(),
            version: None,
            os: Some(std::env::consts::OS.to_string()),
            sapi: None,
            server: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl UserInfo {
    pub fn is_empty(&self) -> bool {
        self.ip_address.is_none() && self.username.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_string: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl RequestInfo {
    /// Build request data from its raw parts. `env` carries `REMOTE_ADDR` when known.
    pub fn new(
        secure: bool,
        host: &str,
        uri: &str,
        method: &str,
        remote_addr: Option<&str>,
    ) -> Self {
        let scheme = if secure { "https" } else { "http" };
        let query_string = uri
            .split_once('?')
            .map(|(_, q)| q.to_string())
            .filter(|q| !q.is_empty());

        let mut env = BTreeMap::new();
        if let Some(addr) = remote_addr {
            env.insert("REMOTE_ADDR".to_string(), addr.to_string());
        }

        Self {
            url: Some(format!("{scheme}://{host}{uri}")),
            method: Some(method.to_string()),
            cookies: None,
            query_string,
            headers: BTreeMap::new(),
            env,
        }
    }
}

/// Browser and OS details derived from a User-Agent string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
}

impl BrowserInfo {
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.trim().is_empty() {
            return Self::default();
        }

        let parser = Parser::new();
        match parser.parse(user_agent) {
            Some(result) => Self::from_woothee_result(&result),
            None => Self::default(),
        }
    }

    fn from_woothee_result(result: &WootheeResult) -> Self {
        Self {
            name: Self::clean(result.name),
            version: Self::clean(result.version),
            os: Self::clean(result.os),
        }
    }

    fn clean(value: &str) -> Option<String> {
        let value = value.trim();
        if value.is_empty() || value == "UNKNOWN" {
            None
        } else {
            Some(value.to_string())
        }
    }
}
