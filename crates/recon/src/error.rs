use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (negative tolerance, zero concurrency, etc.).
    ConfigValidation(String),
    /// Missing required column in CSV input.
    MissingColumn { column: String },
    /// Amount is not a decimal with at most two fractional digits.
    AmountParse { value: String },
    /// Amount parsed but its magnitude exceeds `Money::MAX_ABS`.
    AmountOutOfRange { value: String },
    /// Date is neither `YYYY-MM-DD` nor RFC 3339.
    DateParse { value: String },
    /// A comparison provider failed for one table pair.
    Provider { pair: String, message: String },
    /// A comparison fetch did not finish within `fetchTimeoutMs`.
    Timeout { pair: String, millis: u64 },
    /// IO / CSV reader error.
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::AmountParse { value } => write!(f, "cannot parse amount '{value}'"),
            Self::AmountOutOfRange { value } => {
                write!(f, "amount '{value}' is outside the supported range")
            }
            Self::DateParse { value } => write!(f, "cannot parse date '{value}'"),
            Self::Provider { pair, message } => write!(f, "{pair}: provider error: {message}"),
            Self::Timeout { pair, millis } => {
                write!(f, "{pair}: comparison fetch timed out after {millis}ms")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
