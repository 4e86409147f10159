use serde::{Deserialize, Serialize};

/// Sentry log levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warning,
    #[default]
    Error,
    Fatal,
}

impl Level {
    /// Severity for a native error classification code. Unknown codes are errors.
    pub fn from_native(code: u32) -> Self {
        NativeErrorKind::from_code(code)
            .map(NativeErrorKind::level)
            .unwrap_or(Level::Error)
    }
}

/// Native (PHP-style) error classifications, with their bit values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NativeErrorKind {
    Error = 1,
    Warning = 2,
    Parse = 4,
    Notice = 8,
    CoreError = 16,
    CoreWarning = 32,
    CompileError = 64,
    CompileWarning = 128,
    UserError = 256,
    UserWarning = 512,
    UserNotice = 1024,
    Strict = 2048,
    RecoverableError = 4096,
    Deprecated = 8192,
    UserDeprecated = 16384,
}

impl NativeErrorKind {
    /// Mask selecting every classification
    pub const ALL: u32 = 32767;

    pub const VARIANTS: [NativeErrorKind; 15] = [
        NativeErrorKind::Error,
        NativeErrorKind::Warning,
        NativeErrorKind::Parse,
        NativeErrorKind::Notice,
        NativeErrorKind::CoreError,
        NativeErrorKind::CoreWarning,
        NativeErrorKind::CompileError,
        NativeErrorKind::CompileWarning,
        NativeErrorKind::UserError,
        NativeErrorKind::UserWarning,
        NativeErrorKind::UserNotice,
        NativeErrorKind::Strict,
        NativeErrorKind::RecoverableError,
        NativeErrorKind::Deprecated,
        NativeErrorKind::UserDeprecated,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        Self::VARIANTS.into_iter().find(|kind| kind.code() == code)
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn level(self) -> Level {
        use NativeErrorKind::*;
        match self {
            Error | Parse | CoreError | CompileError | UserError | RecoverableError => Level::Error,
            Warning | CoreWarning | CompileWarning | UserWarning | Deprecated | UserDeprecated => {
                Level::Warning
            }
            Notice | UserNotice | Strict => Level::Info,
        }
    }

    pub fn name(self) -> &'static str {
        use NativeErrorKind::*;
        match self {
            Error => "E_ERROR",
            Warning => "E_WARNING",
            Parse => "E_PARSE",
            Notice => "E_NOTICE",
            CoreError => "E_CORE_ERROR",
            CoreWarning => "E_CORE_WARNING",
            CompileError => "E_COMPILE_ERROR",
            CompileWarning => "E_COMPILE_WARNING",
            UserError => "E_USER_ERROR",
            UserWarning => "E_USER_WARNING",
            UserNotice => "E_USER_NOTICE",
            Strict => "E_STRICT",
            RecoverableError => "E_RECOVERABLE_ERROR",
            Deprecated => "E_DEPRECATED",
            UserDeprecated => "E_USER_DEPRECATED",
        }
    }
}

/// Name used as the exception type for a native error code
pub fn native_error_name(code: u32) -> &'static str {
    NativeErrorKind::from_code(code)
        .map(NativeErrorKind::name)
        .unwrap_or("E_UNKNOWN_ERROR_TYPE")
}
