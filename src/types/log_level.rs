use crate::ffi;
use std::ffi::c_int;
use std::fmt;

/// Severity of a native library log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LogLevel {
    None = ffi::MOSQ_LOG_NONE,
    Info = ffi::MOSQ_LOG_INFO,
    Notice = ffi::MOSQ_LOG_NOTICE,
    Warning = ffi::MOSQ_LOG_WARNING,
    Error = ffi::MOSQ_LOG_ERR,
    Debug = ffi::MOSQ_LOG_DEBUG,
    Subscribe = ffi::MOSQ_LOG_SUBSCRIBE,
    Unsubscribe = ffi::MOSQ_LOG_UNSUBSCRIBE,
    Websockets = ffi::MOSQ_LOG_WEBSOCKETS,
    All = ffi::MOSQ_LOG_ALL,
}

impl LogLevel {
    pub const ALL_LEVELS: [LogLevel; 10] = [
        LogLevel::None,
        LogLevel::Info,
        LogLevel::Notice,
        LogLevel::Warning,
        LogLevel::Error,
        LogLevel::Debug,
        LogLevel::Subscribe,
        LogLevel::Unsubscribe,
        LogLevel::Websockets,
        LogLevel::All,
    ];

    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// `tracing` level used when forwarding native log lines.
    pub fn tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Info | LogLevel::Notice => tracing::Level::INFO,
            LogLevel::Debug | LogLevel::Subscribe | LogLevel::Unsubscribe => tracing::Level::DEBUG,
            LogLevel::None | LogLevel::Websockets | LogLevel::All => tracing::Level::TRACE,
        }
    }
}

impl TryFrom<c_int> for LogLevel {
    type Error = c_int;

    fn try_from(raw: c_int) -> Result<Self, c_int> {
        Self::ALL_LEVELS
            .into_iter()
            .find(|level| level.as_raw() == raw)
            .ok_or(raw)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::None => "NONE",
            LogLevel::Info => "INFO",
            LogLevel::Notice => "NOTICE",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
            LogLevel::Subscribe => "SUBSCRIBE",
            LogLevel::Unsubscribe => "UNSUBSCRIBE",
            LogLevel::Websockets => "WEBSOCKETS",
            LogLevel::All => "ALL",
        };
        f.write_str(name)
    }
}
