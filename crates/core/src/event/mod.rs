//! Event model: one normalized error report in the shape of the store API.

mod level;
mod throwable;

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub use level::{Level, NativeErrorKind, native_error_name};
pub use throwable::{CapturedException, RawError, Throwable};

use crate::{
    context::{BrowserInfo, CaptureContext, RequestInfo, UserInfo},
    error::Result,
    frames::{Frame, frames_from_native},
};

/// Client identifier sent as User-Agent and `sentry_client`
pub const CLIENT: &str = "faultline/";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top-level keys a patch may never replace
pub const RESERVED_KEYS: [&str; 2] = ["event_id", "timestamp"];

const TYPED_KEYS: [&str; 13] = [
    "level",
    "logger",
    "platform",
    "server_name",
    "release",
    "environment",
    "sdk",
    "user",
    "request",
    "contexts",
    "exception",
    "modules",
    "extra",
];

pub type Contexts = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sdk {
    pub name: String,
    pub version: String,
}

impl Default for Sdk {
    fn default() -> Self {
        Self {
            name: CLIENT.trim_end_matches('/').to_string(),
            version: VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

/// One causal layer of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub stacktrace: Stacktrace,
}

/// Exception records, oldest cause first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionList {
    pub values: Vec<ExceptionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_id: String,
    #[serde(with = "timestamp_format")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    pub level: Level,
    pub logger: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub sdk: Sdk,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestInfo>,
    #[serde(default)]
    pub contexts: Contexts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionList>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    /// Caller-supplied top-level fields without a typed counterpart
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Partial event merged over the defaults. Every `Some` field replaces the
/// default wholesale; there is deliberately no way to set `event_id` or
/// `timestamp`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub level: Option<Level>,
    pub logger: Option<String>,
    pub platform: Option<String>,
    pub server_name: Option<String>,
    pub release: Option<String>,
    pub environment: Option<String>,
    pub sdk: Option<Sdk>,
    pub user: Option<UserInfo>,
    pub request: Option<RequestInfo>,
    pub contexts: Option<Contexts>,
    pub exception: Option<ExceptionList>,
    pub modules: Option<BTreeMap<String, String>>,
    pub extra: Option<BTreeMap<String, Value>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl EventPatch {
    /// Route an untyped JSON object into a patch. Reserved keys are kept in
    /// `other` here and dropped when the patch is applied.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}

impl Event {
    pub fn new(ctx: &CaptureContext) -> Self {
        let browser = ctx.user_agent.as_deref().map(BrowserInfo::from_user_agent);

        Self {
            event_id: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now().trunc_subsecs(0),
            level: Level::Error,
            logger: "default".to_string(),
            platform: ctx.platform.clone().unwrap_or_else(|| "php".to_string()),
            server_name: ctx.server_name.clone(),
            release: ctx.release.clone(),
            environment: ctx.environment.clone(),
            sdk: Sdk::default(),
            user: (!ctx.user.is_empty()).then(|| ctx.user.clone()),
            request: ctx.request.clone(),
            contexts: build_contexts(ctx, browser.as_ref()),
            exception: None,
            modules: ctx.modules.clone(),
            extra: BTreeMap::new(),
            other: Map::new(),
        }
    }

    /// Defaults from `ctx`, then `patch` merged over them
    pub fn with_patch(ctx: &CaptureContext, patch: EventPatch) -> Self {
        let mut event = Self::new(ctx);
        event.merge(patch);
        event
    }

    pub fn from_exception(ctx: &CaptureContext, err: &dyn Throwable) -> Self {
        let mut event = Self::new(ctx);
        event.add_cause(err);
        event
    }

    pub fn from_raw_error(ctx: &CaptureContext, err: &RawError) -> Self {
        let mut event = Self::new(ctx);
        event.set_from_raw_error(err);
        event
    }

    pub fn id(&self) -> &str {
        &self.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Shallow merge, last write wins per top-level key.
    pub fn merge(&mut self, patch: EventPatch) {
        let EventPatch {
            level,
            logger,
            platform,
            server_name,
            release,
            environment,
            sdk,
            user,
            request,
            contexts,
            exception,
            modules,
            extra,
            other,
        } = patch;

        if let Some(level) = level {
            self.level = level;
        }
        if let Some(logger) = logger {
            self.logger = logger;
        }
        if let Some(platform) = platform {
            self.platform = platform;
        }
        if let Some(sdk) = sdk {
            self.sdk = sdk;
        }
        if let Some(contexts) = contexts {
            self.contexts = contexts;
        }
        if let Some(modules) = modules {
            self.modules = modules;
        }
        if let Some(extra) = extra {
            self.extra = extra;
        }
        self.server_name = server_name.or(self.server_name.take());
        self.release = release.or(self.release.take());
        self.environment = environment.or(self.environment.take());
        self.user = user.or(self.user.take());
        self.request = request.or(self.request.take());
        self.exception = exception.or(self.exception.take());

        for (key, value) in other {
            if RESERVED_KEYS.contains(&key.as_str()) || TYPED_KEYS.contains(&key.as_str()) {
                tracing::debug!(key = %key, event_id = %self.event_id, "ignoring reserved override");
                continue;
            }
            self.other.insert(key, value);
        }
    }

    pub fn set_severity_from_native(&mut self, code: u32) {
        self.level = Level::from_native(code);
    }

    /// Append `err` and its causal chain to the exception list.
    ///
    /// Records land root cause first. The level is assigned per record in
    /// that same order, so the outermost error's severity is written last
    /// and wins; an error without a severity resets it to `error`.
    pub fn add_cause(&mut self, err: &dyn Throwable) {
        let mut chain = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            chain.push(e);
            current = e.previous();
        }

        for e in chain.into_iter().rev() {
            self.level = e.severity().map(Level::from_native).unwrap_or(Level::Error);
            self.exception
                .get_or_insert_with(ExceptionList::default)
                .values
                .push(ExceptionRecord {
                    kind: e.kind().to_string(),
                    value: e.message().to_string(),
                    stacktrace: Stacktrace {
                        frames: frames_from_native(e.trace()),
                    },
                });
        }
    }

    /// Replace the exception list with a single record for a native error
    /// that has no call stack beyond its own site.
    pub fn set_from_raw_error(&mut self, err: &RawError) {
        self.exception = Some(ExceptionList {
            values: vec![ExceptionRecord {
                kind: native_error_name(err.code).to_string(),
                value: err.message.clone(),
                stacktrace: Stacktrace {
                    frames: vec![Frame {
                        filename: err.file.clone(),
                        function: String::new(),
                        lineno: err.line,
                        colno: None,
                        vars: BTreeMap::new(),
                    }],
                },
            }],
        });
        self.set_severity_from_native(err.code);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reload a previously serialized event, keeping its id.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn build_contexts(ctx: &CaptureContext, browser: Option<&BrowserInfo>) -> Contexts {
    fn block(entries: Vec<(&str, Option<&str>)>) -> BTreeMap<String, Value> {
        entries
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), Value::from(v))))
            .collect()
    }

    let mut contexts = Contexts::new();
    contexts.insert(
        "app".to_string(),
        block(vec![
            ("app_name", Some(ctx.app.name.as_str())),
            ("app_version", ctx.app.version.as_deref()),
        ]),
    );
    contexts.insert(
        "runtime".to_string(),
        block(vec![
            ("name", Some(ctx.runtime.name.as_str())),
            ("version", ctx.runtime.version.as_deref()),
            ("os", ctx.runtime.os.as_deref()),
            ("sapi", ctx.runtime.sapi.as_deref()),
            ("server", ctx.runtime.server.as_deref()),
        ]),
    );

    if let (Some(ua), Some(browser)) = (ctx.user_agent.as_deref(), browser) {
        contexts.insert(
            "browser".to_string(),
            block(vec![
                ("ua", Some(ua)),
                ("name", browser.name.as_deref()),
                ("version", browser.version.as_deref()),
            ]),
        );
        if let Some(os) = browser.os.as_deref() {
            contexts.insert("os".to_string(), block(vec![("name", Some(os))]));
        }
    }

    contexts
}

mod timestamp_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT)
            .map(|naive| naive.and_utc())
            .or_else(|_| DateTime::parse_from_rfc3339(&raw).map(|ts| ts.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}
