use thiserror::Error;

use std::io::Error as IoError;

/// Top level error, as returned by the parser run loop and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parsing error: {0}")]
    Parsing(#[from] ParsingError),

    #[error("Formatting error: {0}")]
    Formatting(#[from] FormattingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("File i/o error: {0}")]
    FileIo(#[from] IoError),

    /// The error counter went past the configured maximum.
    /// Maps to exit code -2 in the CLI.
    #[error("Maximum number of errors ({0}) exceeded - aborting")]
    MaxErrorsExceeded(u32),

    #[error("Cannot output record; output is closed or never opened")]
    OutputClosed,
}

/// Errors raised while interpreting message content.
/// Each one is recoverable at message (or value) granularity.
#[derive(Debug, Error)]
pub enum ParsingError {
    #[error("Mal-formed positional fields: [{0}]")]
    MalformedPositionalFields(String),

    #[error("Bad date string: [{0}]")]
    BadDateString(String),

    #[error("Bad observation time: [{0}]")]
    BadObservationTime(String),

    #[error("Invalid day: [{0}]")]
    BadDayOfYear(String),

    #[error("Invalid relative time value")]
    BadRelativeTime,

    #[error("Bad creation time: [{0}]")]
    BadCreationTime(String),

    #[error("Invalid SHEF time zone: [{0}]")]
    InvalidTimeZone(String),

    #[error("Cannot instantiate time zone [{0}]")]
    TimeZoneInstantiation(String),

    #[error("Cannot move a date/time between legacy and modern time zone models")]
    MixedZoneModels,

    #[error("Invalid date/time: [{0}]")]
    InvalidDateTime(String),

    #[error(
        "Invalid time: [{0}]. 02:00:00..02:59:59 is not allowed on date of \
         transition to Daylight Saving with time zone [{1}]"
    )]
    SpringForwardGap(String, String),

    #[error("Non-zero minutes or seconds on hour = 24")]
    NonZeroPastMidnight,

    #[error("End-of-month interval specified on non-end-of-month date [{0}]")]
    NotEndOfMonth(String),

    #[error("Invalid parameter code: [{0}]")]
    InvalidParameterCode(String),

    #[error("Invalid parameter code: [{0}] - {1} is send code for {2}")]
    SendCodeConflict(String, String, String),

    #[error("Parameter code [{0}] must be 2-7 characters long")]
    ParameterCodeLength(String),

    #[error("Invalid PE code: [{0}]")]
    InvalidPeCode(String),

    #[error("Invalid duration code [{0}] in parameter code [{1}]")]
    InvalidDurationCode(char, String),

    #[error("Invalid type and source code [{0}] in parameter code [{1}]")]
    InvalidTypeSourceCode(String, String),

    #[error("Invalid extremum code [{0}] in parameter code [{1}]")]
    InvalidExtremumCode(char, String),

    #[error("Invalid probability code [{0}] in parameter code [{1}]")]
    InvalidProbabilityCode(char, String),

    #[error("Bad data qualifier: [{0}]")]
    BadQualifier(String),

    #[error("Invalid duration code variable [{0}]")]
    InvalidDurationVariable(String),

    #[error("Invalid interval value: [{0}]")]
    InvalidInterval(String),

    #[error("No valid duration code for time interval [{0}]")]
    NoDurationForInterval(String),

    #[error("Interval is specified before parameter")]
    IntervalBeforeParameter,

    #[error("Interval specified more than once")]
    IntervalRedeclared,

    #[error("Parameter code specified more than once")]
    ParameterRedeclared,

    #[error("Value encountered before parameter code")]
    ValueBeforeParameter,

    #[error("Value encountered before interval")]
    ValueBeforeInterval,

    #[error("Null field in data definition")]
    NullFieldInDefinition,

    #[error("Invalid value: [{0}]")]
    InvalidValue(String),

    #[error("Missing value")]
    MissingValue,

    #[error("Value [{0}] is not valid for pe_code [{1}]")]
    TraceNotAllowed(String, String),

    #[error("Invalid retained comment [{0}]")]
    InvalidComment(String),

    #[error("Cannot use relative date/time offsets with send codes QY, HY, or PY")]
    RelativeWithPrev7am,

    #[error("Cannot use Zulu/UTC time zone with send codes QY, HY, or PY")]
    UtcWithPrev7am,

    #[error("Cannot use data interval [{0}] with send codes QY, HY, or PY")]
    IntervalWithPrev7am(String),

    #[error("Invalid .B message: [{0}]")]
    InvalidDotBMessage(String),

    #[error("Unexpected data string item: [{0}]")]
    UnexpectedItem(String),

    #[error("Invalid data string")]
    InvalidDataString,
}

/// Errors raised while loading a SHEFPARM overlay.
/// All of these are critical: the run aborts with exit code -1.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No such file: [{0}]")]
    NoSuchFile(String),

    #[error("{0}: Invalid line at line {1}: [{2}]")]
    InvalidLine(String, usize, String),

    #[error("{0}: Unexpected section \"[{1}]\" at line {2}")]
    UnexpectedSection(String, char, usize),

    #[error("{0}: No section for line {1} [{2}]")]
    OrphanLine(String, usize, String),

    #[error("{0}: Invalid data qualifier [{1}]")]
    InvalidQualifier(String, String),

    #[error("Cannot use non-integer value [{0}] for duration code [{1}]")]
    NonIntegerDuration(String, char),

    #[error("{0}: Malformed record in section [{1}]: [{2}]")]
    MalformedRecord(String, char, String),
}

/// Errors that may rise while rendering output records.
#[derive(Debug, Error)]
pub enum FormattingError {
    #[error("i/o: output error")]
    OutputError(#[from] IoError),

    #[error("No duration specified for parameter code [{0}]")]
    MissingDurationVariable(String),

    #[error("No numeric value for duration code [{0}]")]
    UnknownDurationCode(char),

    #[error("No numeric value for probability code [{0}]")]
    UnknownProbabilityCode(char),

    #[error("Location [{0}] must be 3 to 8 characters in length")]
    BadLocation(String),
}
