//! The SHEF parser proper.
//!
//! [ShefParser] owns the live code tables, the message assembler, the
//! diagnostics counters and the output handle. The three message-type
//! parsers live in submodules and share the interpretation helpers here:
//! positional header, date/time operators, creation times, value tokens and
//! unit conversion. Parsing state is kept in locals of each message parser
//! and threaded through these helpers explicitly.

mod dot_a;
mod dot_b;
mod dot_e;

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::Path,
};

use chrono::TimeDelta;
use itertools::Itertools;

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;

use crate::{
    assembler::Assembler,
    datetime::{is_leap, CalendarDelta, DateTime, TimeOffset},
    defaults::Tables,
    diagnostics::Diagnostics,
    errors::{Error, FormattingError, ParsingError},
    formatting::OutputFormat,
    grammar::{
        self, continuation_pattern, glue_date_operators, POSITIONAL_FIELDS, RETAINED_COMMENT,
        REPLACEMENT_SPLIT, REPLACEMENT_STRIP, VALUE,
    },
    record::OutputRecord,
    timezone::{LegacyZone, Zone},
};

/// Unit system in effect for subsequent values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Units {
    English,
    Si,
}

/// Decoded positional header fields, shared by all message types.
pub(crate) struct Positional {
    pub revised: bool,
    pub location: String,
    pub zone_code: String,
    pub zone: Zone,
    pub date: DateTime,
    pub century_specified: bool,
    /// Byte offset just past the positional fields.
    pub body_start: usize,
}

/// Run totals, reported by the CLI at shutdown.
#[derive(Debug, Default, Clone)]
pub struct Summary {
    pub lines_read: usize,
    pub message_count: usize,
    pub value_count: usize,
    pub warning_count: u32,
    pub error_count: u32,
    pub messages_with_warnings: u32,
    pub messages_with_errors: u32,
}

pub struct ShefParser {
    tables: Tables,
    output_format: OutputFormat,
    shefit_times: bool,
    reject_problematic: bool,
    diagnostics: Diagnostics,
    assembler: Assembler,
    output: Option<Box<dyn Write>>,
    output_name: String,
}

impl ShefParser {
    /// Build a parser: program defaults, optionally overlaid by a SHEFPARM
    /// file. A missing or malformed SHEFPARM is a critical error.
    pub fn new(
        output_format: OutputFormat,
        shefparm: Option<&Path>,
        shefit_times: bool,
        reject_problematic: bool,
    ) -> Result<Self, Error> {
        let mut tables = Tables::default();
        let mut diagnostics = Diagnostics::new(tables.max_error_count());
        if let Some(path) = shefparm {
            tables.apply_shefparm(path, &mut diagnostics)?;
            diagnostics.set_max_error_count(tables.max_error_count());
        }
        Ok(Self {
            tables,
            output_format,
            shefit_times,
            reject_problematic,
            diagnostics,
            assembler: Assembler::new(),
            output: None,
            output_name: String::new(),
        })
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn shefit_times(&self) -> bool {
        self.shefit_times
    }

    /// Attach a line input. `None` reads standard input; a path ending in
    /// `.gz` is decoded transparently when the `flate2` feature is on.
    pub fn set_input(&mut self, path: Option<&Path>) -> Result<(), Error> {
        match path {
            None => {
                self.diagnostics.set_input_name("<stdin>");
                self.assembler
                    .set_input(Box::new(BufReader::new(std::io::stdin())));
            }
            Some(path) => {
                let name = path.display().to_string();
                let fd = File::open(path)?;
                #[cfg(feature = "flate2")]
                if name.to_ascii_lowercase().ends_with(".gz") {
                    self.diagnostics.set_input_name(&name);
                    self.assembler
                        .set_input(Box::new(BufReader::new(GzDecoder::new(fd))));
                    log::debug!("Message input set to {} (gzip)", name);
                    return Ok(());
                }
                self.diagnostics.set_input_name(&name);
                self.assembler.set_input(Box::new(BufReader::new(fd)));
                log::debug!("Message input set to {}", name);
            }
        }
        Ok(())
    }

    /// Attach an arbitrary reader (used by tests).
    pub fn set_input_reader(&mut self, name: &str, reader: Box<dyn BufRead>) {
        self.diagnostics.set_input_name(name);
        self.assembler.set_input(reader);
    }

    /// Attach the record output. `None` writes standard output.
    pub fn set_output(&mut self, path: Option<&Path>, append: bool) -> Result<(), Error> {
        self.close_output()?;
        match path {
            None => {
                self.output = Some(Box::new(std::io::stdout()));
                self.output_name = "<stdout>".to_string();
            }
            Some(path) => {
                let fd = if append {
                    OpenOptions::new().create(true).append(true).open(path)?
                } else {
                    File::create(path)?
                };
                self.output = Some(Box::new(fd));
                self.output_name = path.display().to_string();
            }
        }
        log::debug!("Data output set to {}", self.output_name);
        Ok(())
    }

    pub fn set_output_writer(&mut self, name: &str, writer: Box<dyn Write>) {
        self.output = Some(writer);
        self.output_name = name.to_string();
    }

    /// Close the output, emitting the trailing newline the legacy readers
    /// expect.
    pub fn close_output(&mut self) -> Result<(), Error> {
        if let Some(mut output) = self.output.take() {
            log::debug!("Closing output {}", self.output_name);
            output
                .write_all(b"\n")
                .and_then(|_| output.flush())
                .map_err(FormattingError::OutputError)?;
        }
        Ok(())
    }

    fn write_record(&mut self, record: &OutputRecord) -> Result<(), Error> {
        let Some(output) = self.output.as_mut() else {
            return Err(Error::OutputClosed);
        };
        let line = record.render(self.output_format, &self.tables)?;
        output
            .write_all(line.as_bytes())
            .and_then(|_| output.write_all(b"\n"))
            .map_err(FormattingError::OutputError)?;
        Ok(())
    }

    /// Parse every message on the input, handing each record to `sink`.
    pub fn parse_records<F>(&mut self, mut sink: F) -> Result<Summary, Error>
    where
        F: FnMut(&mut Self, OutputRecord) -> Result<(), Error>,
    {
        let mut summary = Summary::default();
        loop {
            let message = match self.assembler.next_message(&mut self.diagnostics) {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => return Err(e),
            };
            summary.message_count += 1;
            match self.parse_message(&message.text) {
                Ok(records) => {
                    for record in records {
                        summary.value_count += 1;
                        sink(self, record)?;
                    }
                }
                Err(Error::Parsing(e)) => {
                    self.diagnostics.error(&e.to_string())?;
                }
                Err(e) => return Err(e),
            }
        }
        summary.lines_read = self.assembler.lines_read();
        summary.warning_count = self.diagnostics.warning_count();
        summary.error_count = self.diagnostics.error_count();
        summary.messages_with_warnings = self.diagnostics.messages_with_warnings();
        summary.messages_with_errors = self.diagnostics.messages_with_errors();
        Ok(summary)
    }

    /// Parse the whole input to the attached output.
    pub fn run(&mut self) -> Result<Summary, Error> {
        let summary = self.parse_records(|parser, record| parser.write_record(&record))?;
        Ok(summary)
    }

    /// Dispatch one assembled message to its type parser.
    pub(crate) fn parse_message(&mut self, text: &str) -> Result<Vec<OutputRecord>, Error> {
        let upper = text.get(..2).unwrap_or("").to_ascii_uppercase();
        match upper.as_str() {
            ".A" => self.parse_dot_a(text),
            ".E" => self.parse_dot_e(text),
            ".B" => self.parse_dot_b(text),
            _ => Ok(Vec::new()),
        }
    }

    pub(crate) fn utc_zone(&self) -> Zone {
        Zone::utc(self.shefit_times)
    }

    /// Resolve a header zone code under the configured model.
    pub(crate) fn get_time_zone(&self, code: &str) -> Result<Zone, ParsingError> {
        Zone::for_code(code, self.shefit_times)
    }

    /// Decode the positional fields common to all message types.
    pub(crate) fn parse_positional(&self, message: &str) -> Result<Positional, ParsingError> {
        let m = POSITIONAL_FIELDS
            .captures(message)
            .ok_or_else(|| ParsingError::MalformedPositionalFields(message.to_string()))?;
        let revised = message
            .as_bytes()
            .get(2)
            .map(|b| b.to_ascii_uppercase() == b'R')
            .unwrap_or(false);
        let location = m[1].to_ascii_uppercase();
        let zone_code = m
            .get(6)
            .map(|z| z.as_str().to_ascii_uppercase())
            .unwrap_or_else(|| "Z".to_string());
        let (y, mo, d, century_specified) =
            self.parse_header_date(&m[2].to_ascii_uppercase(), &zone_code)?;
        let zone = self.get_time_zone(&zone_code)?;
        let date = DateTime::new(y, mo, d, 0, 0, 0, zone)?;
        Ok(Positional {
            revised,
            location,
            zone_code,
            zone,
            date,
            century_specified,
            body_start: m.get(0).map(|g| g.end()).unwrap_or(0),
        })
    }

    /// Resolve the header date string (mmdd, yymmdd or ccyymmdd) to a civil
    /// date. Two-digit years roll back a century when more than ten years in
    /// the future; four-digit forms pick the closest year, by month distance
    /// in the legacy model and by elapsed time in the modern one.
    pub(crate) fn parse_header_date(
        &self,
        datestr: &str,
        zone_code: &str,
    ) -> Result<(i32, u32, u32, bool), ParsingError> {
        let bad = || ParsingError::BadDateString(datestr.to_string());
        // the closest-year arithmetic runs in the legacy zone model either
        // way; only the returned civil date escapes this function
        let zone = Zone::Legacy(zone_code.parse::<LegacyZone>().map_err(|_| bad())?);
        let now = DateTime::now_in(zone);
        let (cy, cm, cd) = (now.year(), now.month(), now.day());

        let digits = |range: std::ops::Range<usize>| -> Result<u32, ParsingError> {
            datestr.get(range).and_then(|s| s.parse().ok()).ok_or_else(bad)
        };

        let mut century_specified = false;
        let (mut y, m, d) = match datestr.len() {
            4 => (cy, digits(0..2)?, digits(2..4)?),
            6 => {
                let century = cy / 100;
                let mut year = century * 100 + digits(0..2)? as i32;
                if year - cy > 10 {
                    year -= 100;
                }
                (year, digits(2..4)?, digits(4..6)?)
            }
            8 => {
                century_specified = true;
                (digits(0..4)? as i32, digits(4..6)?, digits(6..8)?)
            }
            _ => return Err(bad()),
        };

        if !(1700..=2100).contains(&y)
            || !(1..=12).contains(&m)
            || !(1..=crate::datetime::last_day(y, m)).contains(&d)
        {
            return Err(bad());
        }

        if datestr.len() == 4 {
            if self.shefit_times {
                // closest year by month distance
                let month_diff = cm as i32 - m as i32;
                if month_diff > 6 {
                    y += 1;
                } else if month_diff < -6 {
                    y -= 1;
                } else if month_diff == -6 && cd < d {
                    y -= 1;
                } else if month_diff == 6 && cd > d {
                    y += 1;
                }
            } else {
                // closest year by elapsed time
                let cur_date = DateTime::new(cy, cm, cd, 0, 0, 0, zone).map_err(|_| bad())?;
                let dateval = DateTime::new(y, m, d, 0, 0, 0, zone).map_err(|_| bad())?;
                let prev_year = dateval.add_months(-12, false).map_err(|_| bad())?;
                let cur_diff = dateval.since(&cur_date);
                let prev_diff = cur_date.since(&prev_year);
                if prev_diff < cur_diff {
                    y = prev_year.year();
                }
            }
        }

        Ok((y, m, d, century_specified))
    }

    /// Interpret one date/time operator (or an `@`-glued chain) against a
    /// base time. Absolute operators return a new observation time;
    /// relative (`DR`) operators return a pending delta in `.B` mode and
    /// apply immediately otherwise.
    pub(crate) fn observation_time(
        &self,
        base_time: &DateTime,
        token: &str,
        century_specified: bool,
        dot_b: bool,
    ) -> Result<(Option<DateTime>, Option<TimeOffset>, bool), ParsingError> {
        let token = token.to_ascii_uppercase();
        let subtokens: Vec<&str> = token.trim_matches('@').split('@').collect();
        if subtokens.len() > 1 && subtokens[0].as_bytes().get(1) == Some(&b'J') {
            return Err(ParsingError::BadObservationTime(format!(
                "{}]/[{}",
                subtokens[0], subtokens[1]
            )));
        }

        let bt = base_time;
        let mut obstime = Some(*base_time);
        let mut relative: Option<TimeOffset> = None;
        for subtoken in subtokens {
            let result = self.apply_time_operator(bt, subtoken, century_specified, dot_b);
            match result {
                Ok((t, r)) => {
                    obstime = t;
                    if r.is_some() {
                        relative = r;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok((obstime, relative, century_specified))
    }

    fn apply_time_operator(
        &self,
        bt: &DateTime,
        subtoken: &str,
        century_specified: bool,
        dot_b: bool,
    ) -> Result<(Option<DateTime>, Option<TimeOffset>), ParsingError> {
        let bad = || ParsingError::BadObservationTime(subtoken.to_string());
        if subtoken.len() < 3 {
            return Err(bad());
        }
        let cur_time = DateTime::now_in(self.utc_zone());
        let v = &subtoken[2..];
        let length = v.len();
        let field = |range: std::ops::Range<usize>| -> Result<u32, ParsingError> {
            v.get(range).and_then(|s| s.parse().ok()).ok_or_else(bad)
        };
        let zone = bt.zone();
        let build = |y: i32, mo: u32, d: u32, h: u32, n: u32, s: u32| {
            DateTime::new(y, mo, d, h, n, s, zone).map_err(|e| match e {
                ParsingError::SpringForwardGap(..) => e,
                _ => bad(),
            })
        };

        let obstime = match subtoken.as_bytes()[1] {
            b'S' => match length {
                2 => build(bt.year(), bt.month(), bt.day(), bt.hour(), bt.minute(), field(0..2)?)?,
                _ => return Err(bad()),
            },
            b'N' => match length {
                4 => build(bt.year(), bt.month(), bt.day(), bt.hour(), field(0..2)?, field(2..4)?)?,
                2 => build(bt.year(), bt.month(), bt.day(), bt.hour(), field(0..2)?, bt.second())?,
                _ => return Err(bad()),
            },
            b'H' => match length {
                6 => build(bt.year(), bt.month(), bt.day(), field(0..2)?, field(2..4)?, field(4..6)?)?,
                4 => build(bt.year(), bt.month(), bt.day(), field(0..2)?, field(2..4)?, bt.second())?,
                2 => build(bt.year(), bt.month(), bt.day(), field(0..2)?, bt.minute(), bt.second())?,
                _ => return Err(bad()),
            },
            b'D' => match length {
                8 => build(bt.year(), bt.month(), field(0..2)?, field(2..4)?, field(4..6)?, field(6..8)?)?,
                6 => build(bt.year(), bt.month(), field(0..2)?, field(2..4)?, field(4..6)?, bt.second())?,
                4 => build(bt.year(), bt.month(), field(0..2)?, field(2..4)?, bt.minute(), bt.second())?,
                2 => build(bt.year(), bt.month(), field(0..2)?, bt.hour(), bt.minute(), bt.second())?,
                _ => return Err(bad()),
            },
            b'M' => match length {
                10 => build(bt.year(), field(0..2)?, field(2..4)?, field(4..6)?, field(6..8)?, field(8..10)?)?,
                8 => build(bt.year(), field(0..2)?, field(2..4)?, field(4..6)?, field(6..8)?, bt.second())?,
                6 => build(bt.year(), field(0..2)?, field(2..4)?, field(4..6)?, bt.minute(), bt.second())?,
                4 => build(bt.year(), field(0..2)?, field(2..4)?, bt.hour(), bt.minute(), bt.second())?,
                2 => build(bt.year(), field(0..2)?, bt.day(), bt.hour(), bt.minute(), bt.second())?,
                _ => return Err(bad()),
            },
            b'Y' => {
                if length < 2 {
                    return Err(bad());
                }
                let century_base = if century_specified {
                    bt.year() - bt.year() % 100
                } else {
                    cur_time.year() - cur_time.year() % 100
                };
                let mut y = century_base + field(0..2)? as i32;
                if y - cur_time.year() > 10 {
                    y -= 100;
                }
                match length {
                    12 => build(y, field(2..4)?, field(4..6)?, field(6..8)?, field(8..10)?, field(10..12)?)?,
                    10 => build(y, field(2..4)?, field(4..6)?, field(6..8)?, field(8..10)?, bt.second())?,
                    8 => build(y, field(2..4)?, field(4..6)?, field(6..8)?, bt.minute(), bt.second())?,
                    6 => build(y, field(2..4)?, field(4..6)?, bt.hour(), bt.minute(), bt.second())?,
                    4 => build(y, field(2..4)?, bt.day(), bt.hour(), bt.minute(), bt.second())?,
                    2 => build(y, bt.month(), bt.day(), bt.hour(), bt.minute(), bt.second())?,
                    _ => return Err(bad()),
                }
            }
            b'T' => match length {
                14 => build(field(0..4)? as i32, field(4..6)?, field(6..8)?, field(8..10)?, field(10..12)?, field(12..14)?)?,
                12 => build(field(0..4)? as i32, field(4..6)?, field(6..8)?, field(8..10)?, field(10..12)?, 0)?,
                10 => build(field(0..4)? as i32, field(4..6)?, field(6..8)?, field(8..10)?, 0, 0)?,
                8 => build(field(0..4)? as i32, field(4..6)?, field(6..8)?, bt.hour(), 0, 0)?,
                6 => build(field(0..4)? as i32, field(4..6)?, bt.day(), bt.hour(), 0, 0)?,
                4 => build(field(0..4)? as i32, bt.month(), bt.day(), bt.hour(), 0, 0)?,
                2 => build(100 * field(0..2)? as i32 + bt.year() % 100, bt.month(), bt.day(), bt.hour(), 0, 0)?,
                _ => return Err(bad()),
            },
            b'J' => {
                let julian = |y: i32, doy: u32| -> Result<DateTime, ParsingError> {
                    if doy > if is_leap(y) { 366 } else { 365 } {
                        return Err(ParsingError::BadDayOfYear(subtoken.to_string()));
                    }
                    build(y, 1, 1, bt.hour(), bt.minute(), bt.second())?
                        .add(TimeDelta::days(doy as i64 - 1))
                        .map_err(|_| bad())
                };
                match length {
                    7 => julian(field(0..4)? as i32, field(4..7)?)?,
                    5 => {
                        let mut y = cur_time.year() - cur_time.year() % 100 + field(0..2)? as i32;
                        if y - cur_time.year() > 10 {
                            y -= 100;
                        }
                        julian(y, field(2..5)?)?
                    }
                    1..=3 => julian(bt.year(), v.parse().map_err(|_| bad())?)?,
                    _ => return Err(bad()),
                }
            }
            b'R' => {
                // relative deltas are held pending for .B and applied
                // immediately for .A/.E
                let value: i32 = subtoken.get(3..).and_then(|s| s.parse().ok()).ok_or_else(bad)?;
                if value.abs() > 99 {
                    return Err(ParsingError::BadRelativeTime);
                }
                let offset = match subtoken.as_bytes()[2] {
                    b'S' => TimeOffset::Clock(TimeDelta::seconds(value as i64)),
                    b'N' => TimeOffset::Clock(TimeDelta::minutes(value as i64)),
                    b'H' => TimeOffset::Clock(TimeDelta::hours(value as i64)),
                    b'D' => TimeOffset::Clock(TimeDelta::days(value as i64)),
                    b'M' => TimeOffset::Months(CalendarDelta::months(value)),
                    b'E' => TimeOffset::Months(CalendarDelta::end_of_month(value)),
                    b'Y' => TimeOffset::Months(CalendarDelta::months(12 * value)),
                    _ => return Err(bad()),
                };
                if dot_b {
                    return Ok((None, Some(offset)));
                }
                return Ok((Some(bt.add_offset(&offset)?), None));
            }
            _ => return Err(bad()),
        };
        Ok((Some(obstime), None))
    }

    /// Expand a `DC` digit string into a creation time anchored near the
    /// observation time: partial forms roll back whole centuries until they
    /// fall within ten years of it.
    pub(crate) fn creation_time(
        &self,
        obstime: &DateTime,
        token: Option<&str>,
    ) -> Result<Option<DateTime>, ParsingError> {
        let Some(s) = token else {
            return Ok(None);
        };
        let bad = || ParsingError::BadCreationTime(s.to_string());
        let cur_time = DateTime::now_in(self.utc_zone());
        let threshold = DateTime::new(
            obstime.year(),
            obstime.month(),
            obstime.day(),
            0,
            0,
            0,
            obstime.zone(),
        )
        .and_then(|t| t.add_months(120, false))
        .map_err(|_| bad())?;

        let field = |range: std::ops::Range<usize>| -> Result<u32, ParsingError> {
            s.get(range).and_then(|f| f.parse().ok()).ok_or_else(bad)
        };
        let zone = obstime.zone();

        let mut dt = match s.len() {
            12 => {
                // explicit century: no rollback
                return DateTime::new(
                    field(0..4)? as i32,
                    field(4..6)?,
                    field(6..8)?,
                    field(8..10)?,
                    field(10..12)?,
                    0,
                    zone,
                )
                .map(Some)
                .map_err(|_| bad());
            }
            10 => {
                let y = cur_time.year() - cur_time.year() % 100 + field(0..2)? as i32;
                DateTime::new(y, field(2..4)?, field(4..6)?, field(6..8)?, field(8..10)?, 0, zone)
                    .map_err(|_| bad())?
            }
            8 => DateTime::new(
                obstime.year(),
                field(0..2)?,
                field(2..4)?,
                field(4..6)?,
                field(6..8)?,
                0,
                zone,
            )
            .map_err(|_| bad())?,
            6 => DateTime::new(
                obstime.year(),
                field(0..2)?,
                field(2..4)?,
                field(4..6)?,
                0,
                0,
                zone,
            )
            .map_err(|_| bad())?,
            4 => {
                let hour = if zone.is_utc() { 12 } else { 24 };
                DateTime::new(obstime.year(), field(0..2)?, field(2..4)?, hour, 0, 0, zone)
                    .map_err(|_| bad())?
            }
            _ => return Err(bad()),
        };
        while dt > threshold {
            dt = dt.add_months(-1200, false).map_err(|_| bad())?;
        }
        Ok(Some(dt))
    }

    /// Convert a value to English units for a physical element.
    /// A factor of -1.0 is the Celsius to Fahrenheit conversion; an unknown
    /// element passes through untransformed.
    pub(crate) fn english_unit_value(&self, value: f64, parameter: &str) -> f64 {
        let key: String = parameter.chars().take(2).collect::<String>().to_ascii_uppercase();
        match self.tables.conversion_factor(&key) {
            Some(factor) if factor == -1.0 => value * 1.8 + 32.0,
            Some(factor) => value * factor,
            None => value,
        }
    }

    /// Decode a value token: numeric, trace, or missing, with an optional
    /// trailing qualifier letter. SI values convert to English on the spot.
    pub(crate) fn parse_value_token(
        &self,
        token: &str,
        pe_code: &str,
        units: Units,
    ) -> Result<(f64, Option<char>), ParsingError> {
        let stripped = RETAINED_COMMENT.replace_all(token, "");
        let stripped = stripped.trim();
        let Some(m) = VALUE.captures(stripped) else {
            return parse_value_token_alt(token);
        };

        let mut qualifier: Option<char> = None;
        let value = if let Some(numeric) = m.get(2) {
            let text = numeric.as_str();
            let mut value: f64 = text.parse().map_err(|_| {
                ParsingError::InvalidValue(token.to_string())
            })?;
            if units == Units::English && matches!(pe_code, "PC" | "PP") && !text.contains('.') {
                // whole-number precipitation arrives in hundredths
                value /= 100.0;
            } else if units == Units::Si && value != -9999.0 {
                value = self.english_unit_value(value, pe_code);
            }
            if value == 0.0 {
                value = 0.0; // normalize -0.0
            }
            value
        } else if let Some(trace) = m.get(3) {
            if !matches!(pe_code, "PC" | "PP") {
                return Err(ParsingError::TraceNotAllowed(
                    trace.as_str().to_string(),
                    pe_code.to_string(),
                ));
            }
            0.001
        } else if let Some(missing) = m.get(4) {
            let text = missing.as_str().to_ascii_uppercase();
            if text.len() > 1 {
                let last = text.chars().last().unwrap_or(' ');
                if last.is_ascii_alphabetic() && m.get(5).map(|q| q.as_str().is_empty()).unwrap_or(true)
                {
                    qualifier = Some(last);
                }
            }
            -9999.0
        } else {
            return Err(ParsingError::InvalidValue(token.to_string()));
        };

        if qualifier.is_none() {
            qualifier = m
                .get(5)
                .map(|q| q.as_str())
                .filter(|q| !q.is_empty())
                .and_then(|q| q.chars().next())
                .map(|c| c.to_ascii_uppercase());
        }
        Ok((value, qualifier))
    }

    /// Common tokenization of `.A`/`.E` data strings: glue date operators,
    /// strip continuation headers, protect retained comments, and split on
    /// slashes then on collapsed separators.
    pub(crate) fn tokenize_a_e_data(
        &self,
        datastr: &str,
        message_type: char,
        is_revised: bool,
    ) -> Vec<Vec<String>> {
        let datastr = glue_date_operators(datastr);
        let mut lines: Vec<String> = datastr.trim().split('\n').map(|s| s.to_string()).collect();

        let mut prev = 0usize;
        for i in 0..lines.len() {
            let stripped = continuation_pattern(message_type, is_revised)
                .replace(&lines[i], "")
                .trim()
                .to_string();
            lines[i] = stripped;
            if lines[i].is_empty() {
                continue;
            }
            if i > 0 && !lines[prev].is_empty() {
                // implicit slash across a line boundary
                if !lines[prev].ends_with('/') && !lines[i].starts_with('/') {
                    lines[i] = format!("/{}", lines[i]);
                }
            }
            prev = i;
            // separate retained comments from values, then protect their
            // whitespace while the separators collapse
            lines[i] = RETAINED_COMMENT.replace_all(&lines[i], " $1").into_owned();
            lines[i] = grammar::hide_quoted_whitespace(&lines[i]);
            lines[i] = lines[i].split_whitespace().join(" ");
            lines[i] = grammar::swap_hidden_whitespace(&lines[i]);
        }

        let joined = lines.concat();
        let joined = joined.trim_matches('/');
        joined
            .split('/')
            .map(|token| {
                let stripped = REPLACEMENT_STRIP.replace_all(token, "");
                REPLACEMENT_SPLIT
                    .split(&stripped)
                    .map(|s| s.to_string())
                    .collect()
            })
            .collect()
    }
}

/// Character-level fallback for value shapes the pattern rejects, e.g. a
/// qualifier letter jammed against a following comment.
fn parse_value_token_alt(token: &str) -> Result<(f64, Option<char>), ParsingError> {
    let chars: Vec<char> = token.chars().collect();
    let mut value: Option<f64> = None;
    let mut qualifier: Option<char> = None;
    let mut has_digit = false;
    let mut has_decimal = false;
    let mut error = false;

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_digit() {
            has_digit = true;
        } else if c == '-' || c == '+' {
            if i != 0 {
                error = true;
                break;
            }
        } else if c == '.' {
            if has_decimal {
                error = true;
                break;
            }
            has_decimal = true;
        } else if c.is_alphabetic() {
            if has_digit {
                let numeric: String = chars[..i].iter().collect();
                value = numeric.parse().ok();
                if value.is_none() {
                    error = true;
                    break;
                }
                qualifier = Some(c);
                if i + 1 < chars.len() {
                    let next = chars[i + 1];
                    if !next.is_whitespace() && next != '\'' && next != '"' {
                        error = true;
                    }
                }
                break;
            } else {
                error = true;
                break;
            }
        } else {
            error = true;
            break;
        }
    }

    if error || value.is_none() {
        let residue = REPLACEMENT_SPLIT.replace_all(token, "");
        if residue.trim().is_empty() {
            return Err(ParsingError::MissingValue);
        }
        return Err(ParsingError::InvalidValue(token.to_string()));
    }
    Ok((value.unwrap_or(-9999.0), qualifier))
}
