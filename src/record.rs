//! Parsed observation records.

use crate::{datetime::DateTime, errors::FormattingError, parameter::ParameterCode};

/// Position of a record within a `.E` series.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeSeriesCode {
    /// Not part of a time series.
    #[default]
    None,
    /// First value of a series.
    First,
    /// Any later value of a series.
    Subsequent,
}

impl TimeSeriesCode {
    pub fn as_number(self) -> u8 {
        match self {
            TimeSeriesCode::None => 0,
            TimeSeriesCode::First => 1,
            TimeSeriesCode::Subsequent => 2,
        }
    }
}

/// One parsed value, ready for rendering.
///
/// Observation and creation times are always stored in UTC (of whichever
/// zone model produced them); values are in English units unless the
/// physical element was unknown, in which case they pass through untouched.
#[derive(Debug, Clone)]
pub struct OutputRecord {
    pub location: String,
    pub parameter_code: ParameterCode,
    /// The code exactly as typed in the message.
    pub orig_parameter_code: String,
    pub obs_time: DateTime,
    pub create_time: Option<DateTime>,
    pub value: f64,
    pub qualifier: char,
    pub revised: bool,
    /// Duration variable `(unit, value)` backing a `V` duration code.
    pub duration_unit: char,
    pub duration_value: Option<i32>,
    /// Source field of the enclosing `.B` message.
    pub message_source: Option<String>,
    pub time_series_code: TimeSeriesCode,
    /// Retained comment, still wrapped in its original quotes.
    pub comment: Option<String>,
}

impl OutputRecord {
    /// Validate the fields that have hard width requirements downstream.
    pub(crate) fn validate(&self) -> Result<(), FormattingError> {
        if !(3..=8).contains(&self.location.len()) {
            return Err(FormattingError::BadLocation(self.location.clone()));
        }
        Ok(())
    }

    /// Comment text without the surrounding quotes.
    pub(crate) fn comment_text(&self) -> Option<&str> {
        self.comment.as_deref().map(|c| {
            let c = c.strip_prefix(['"', '\'']).unwrap_or(c);
            c.strip_suffix(['"', '\'']).unwrap_or(c)
        })
    }
}
