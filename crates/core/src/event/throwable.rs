use crate::frames::NativeFrame;

/// A captured error with an optional causal predecessor.
///
/// `previous` points from the outermost error towards the root cause.
pub trait Throwable {
    /// Classification name, reported as the exception type
    fn kind(&self) -> &str;
    fn message(&self) -> &str;
    /// Call stack at the throw site, innermost call first
    fn trace(&self) -> &[NativeFrame] {
        &[]
    }
    /// Native error code for errors converted from warnings, notices, etc.
    fn severity(&self) -> Option<u32> {
        None
    }
    fn previous(&self) -> Option<&dyn Throwable> {
        None
    }
}

/// Owned exception data handed over by a host error hook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedException {
    pub kind: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub trace: Vec<NativeFrame>,
    pub severity: Option<u32>,
    pub previous: Option<Box<CapturedException>>,
}

impl CapturedException {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_severity(mut self, code: u32) -> Self {
        self.severity = Some(code);
        self
    }

    pub fn with_trace(mut self, trace: Vec<NativeFrame>) -> Self {
        self.trace = trace;
        self
    }

    pub fn caused_by(mut self, previous: CapturedException) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    /// Capture a Rust error together with its `source()` chain.
    pub fn from_std_error<E: std::error::Error + 'static>(err: &E) -> Self {
        let mut captured = Self::new(short_type_name::<E>(), err.to_string());
        captured.previous = err
            .source()
            .map(|source| Box::new(Self::from_error_source(source)));
        captured
    }

    fn from_error_source(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut captured = Self::new("Error", err.to_string());
        captured.previous = err
            .source()
            .map(|source| Box::new(Self::from_error_source(source)));
        captured
    }
}

impl Throwable for CapturedException {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn message(&self) -> &str {
        &self.message
    }

    fn trace(&self) -> &[NativeFrame] {
        &self.trace
    }

    fn severity(&self) -> Option<u32> {
        self.severity
    }

    fn previous(&self) -> Option<&dyn Throwable> {
        self.previous.as_deref().map(|p| p as &dyn Throwable)
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// A native error record without a live call stack, e.g. the last error seen at shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawError {
    pub code: u32,
    pub message: String,
    pub file: String,
    pub line: u32,
}
