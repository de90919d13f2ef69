//! NWS Standard Hydrologic Exchange Format (SHEF) parser.
#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/*
 * shef decodes SHEF text messages into normalized observation records and
 * renders them in the two legacy shefit text formats.
 *
 * Documentation: https://docs.rs/shef
 */

#[cfg(test)]
mod tests;

mod assembler;
mod datetime;
mod defaults;
mod diagnostics;
mod errors;
mod formatting;
mod grammar;
mod parameter;
mod parser;
mod record;
mod shefparm;
mod timezone;

pub use assembler::Message;
pub use datetime::{CalendarDelta, DateTime, TimeOffset};
pub use defaults::{SendCode, Tables};
pub use diagnostics::Diagnostics;
pub use errors::{ConfigError, Error, FormattingError, ParsingError};
pub use formatting::OutputFormat;
pub use parameter::ParameterCode;
pub use parser::{ShefParser, Summary};
pub use record::{OutputRecord, TimeSeriesCode};
pub use timezone::{LegacyZone, ModernZone, Zone};

pub mod prelude {
    pub use crate::{
        CalendarDelta, ConfigError, DateTime, Diagnostics, Error, FormattingError, LegacyZone,
        Message, ModernZone, OutputFormat, OutputRecord, ParameterCode, ParsingError, SendCode,
        ShefParser, Summary, Tables, TimeOffset, TimeSeriesCode, Zone,
    };

    // Pub re-export
    pub use chrono::TimeDelta;
}
