//! Capture entry points and the retry pass.
//!
//! Every capture path degrades to "queued for later": nothing here returns an
//! error to the host or panics. The only data-loss path is a failed write to
//! the pending queue, which is logged at `error`.

use std::{
    borrow::Cow,
    sync::{Mutex, PoisonError},
};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{
    client::DeliveryClient,
    config::Settings,
    context::CaptureContext,
    dsn::Dsn,
    error::Result,
    event::{
        Event, EventPatch, ExceptionList, ExceptionRecord, RawError, Stacktrace, Throwable,
    },
    frames::parse_javascript_stack,
    queue::PendingQueue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Delivered,
    Queued,
    /// Delivery failed and the event could not be written to the queue either
    Lost,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub delivered: usize,
    /// Ids listed but gone by the time they were loaded
    pub missing: usize,
    pub failed: usize,
}

/// Error report posted by the browser-side listener
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowserReport {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default, alias = "additionalData")]
    pub additional_data: Map<String, Value>,
}

pub struct Reporter {
    settings: Settings,
    queue: PendingQueue,
    client: DeliveryClient,
    last_handled: Mutex<Option<RawError>>,
}

impl Reporter {
    pub fn new(settings: Settings) -> Result<Self> {
        let client = DeliveryClient::new(settings.timeout())?;
        let queue = PendingQueue::new(settings.cache_dir.clone());
        Ok(Self {
            settings,
            queue,
            client,
            last_handled: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Deliver the event, queueing it when delivery is impossible or fails.
    pub async fn log_event(&self, event: Event) -> CaptureOutcome {
        match self.deliver(&event).await {
            Ok(()) => CaptureOutcome::Delivered,
            Err(e) => {
                tracing::warn!(event_id = %event.id(), error = %e, "delivery failed, queueing event");
                match self.queue.persist(&event).await {
                    Ok(_) => CaptureOutcome::Queued,
                    Err(e) => {
                        tracing::error!(event_id = %event.id(), error = %e, "event lost: could not queue it");
                        CaptureOutcome::Lost
                    }
                }
            }
        }
    }

    /// Unhandled exception hook
    pub async fn capture_exception(
        &self,
        ctx: &CaptureContext,
        err: &dyn Throwable,
    ) -> CaptureOutcome {
        let event = Event::from_exception(&self.context(ctx), err);
        self.log_event(event).await
    }

    /// Native error hook. Returns `None` when the error mask excludes `err.code`.
    pub async fn capture_native_error(
        &self,
        ctx: &CaptureContext,
        err: RawError,
    ) -> Option<CaptureOutcome> {
        *self
            .last_handled
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err.clone());

        if !self.settings.wants(err.code) {
            tracing::debug!(code = err.code, "native error excluded by error mask");
            return None;
        }

        let event = Event::from_raw_error(&self.context(ctx), &err);
        Some(self.log_event(event).await)
    }

    /// Shutdown hook for the last error of the process. Skipped when there is
    /// none or when the native error hook already handled it.
    pub async fn capture_fatal(
        &self,
        ctx: &CaptureContext,
        last_error: Option<RawError>,
    ) -> Option<CaptureOutcome> {
        let err = last_error?;
        let already_handled = self
            .last_handled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            == Some(&err);
        if already_handled {
            return None;
        }

        let event = Event::from_raw_error(&self.context(ctx), &err);
        Some(self.log_event(event).await)
    }

    /// Turn a browser error report into a `javascript` event.
    pub async fn capture_browser_error(
        &self,
        ctx: &CaptureContext,
        report: BrowserReport,
    ) -> CaptureOutcome {
        let event = self.browser_event(ctx, report);
        self.log_event(event).await
    }

    pub fn browser_event(&self, ctx: &CaptureContext, report: BrowserReport) -> Event {
        let base = EventPatch {
            logger: Some("javascript".to_string()),
            exception: Some(ExceptionList {
                values: vec![ExceptionRecord {
                    kind: report.name,
                    value: report.message,
                    stacktrace: Stacktrace {
                        frames: parse_javascript_stack(&report.stack),
                    },
                }],
            }),
            ..Default::default()
        };
        let mut event = Event::with_patch(&self.context(ctx), base);

        if !report.additional_data.is_empty() {
            match EventPatch::from_map(report.additional_data.clone()) {
                Ok(patch) => event.merge(patch),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed additional data, keeping it as extra");
                    event.extra.insert(
                        "additional_data".to_string(),
                        Value::Object(report.additional_data),
                    );
                }
            }
        }
        event
            .extra
            .insert("original_stack".to_string(), Value::String(report.stack));
        event
    }

    /// Retry every queued event once, deleting those that get delivered.
    pub async fn retry_pending(&self) -> Result<RetrySummary> {
        let ids = self.queue.list_pending().await?;
        let mut summary = RetrySummary::default();
        if ids.is_empty() {
            return Ok(summary);
        }

        let dsn = match self.dsn() {
            Ok(dsn) => dsn,
            Err(e) => {
                tracing::warn!(error = %e, pending = ids.len(), "cannot retry pending events");
                summary.attempted = ids.len();
                summary.failed = ids.len();
                return Ok(summary);
            }
        };

        for id in ids {
            summary.attempted += 1;
            let event = match self.queue.load(&id).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    summary.missing += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "unreadable pending event");
                    summary.failed += 1;
                    continue;
                }
            };

            match self.client.send(&event, &dsn).await {
                Ok(()) => {
                    summary.delivered += 1;
                    if let Err(e) = self.queue.delete(&id).await {
                        tracing::error!(event_id = %id, error = %e, "delivered event could not be removed from queue");
                    }
                }
                Err(e) => {
                    tracing::warn!(event_id = %id, error = %e, "retry failed, event stays queued");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            attempted = summary.attempted,
            delivered = summary.delivered,
            failed = summary.failed,
            "retry pass finished"
        );
        Ok(summary)
    }

    async fn deliver(&self, event: &Event) -> Result<()> {
        let dsn = self.dsn()?;
        self.client.send(event, &dsn).await
    }

    /// Parsed fresh for every attempt so configuration changes apply immediately.
    fn dsn(&self) -> Result<Dsn> {
        let raw = self.settings.dsn.as_deref().unwrap_or_default();
        Dsn::parse(raw)
    }

    fn context<'a>(&self, ctx: &'a CaptureContext) -> Cow<'a, CaptureContext> {
        match &self.settings.environment {
            Some(env) => {
                let mut ctx = ctx.clone();
                ctx.environment = Some(env.clone());
                Cow::Owned(ctx)
            }
            None => Cow::Borrowed(ctx),
        }
    }
}
