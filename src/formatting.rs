//! Fixed-column rendering of output records.
//!
//! Two shapes, mirroring the `shefit` reference program: the verbose
//! default (`-1`) and the compact (`-2`). Column math here is deliberate,
//! down to space-padded years and the truncated parameter display for send
//! codes; downstream loaders consume these lines with fixed-width scanners.

use crate::{
    datetime::DateTime,
    defaults::{builtin_duration_number, builtin_probability_number, duration_variable_base, Tables},
    errors::FormattingError,
    record::OutputRecord,
};

/// Output variant, selected once per run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputFormat {
    /// shefit `-1`: verbose fixed columns.
    #[default]
    Text1,
    /// shefit `-2`: packed fields.
    Text2,
}

impl OutputFormat {
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(OutputFormat::Text1),
            2 => Some(OutputFormat::Text2),
            _ => None,
        }
    }
}

fn obs_time_verbose(t: &DateTime) -> String {
    format!(
        "{:4}-{:02}-{:02} {:02}:{:02}:{:02}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

fn obs_time_compact(t: &DateTime) -> String {
    format!(
        "{:4}{:2}{:2}{:2}{:2}{:2}",
        t.year(),
        t.month(),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

impl OutputRecord {
    /// Numeric duration: the variable base plus value for a `V` duration,
    /// otherwise the built-in table value (with the PE default standing in
    /// for `Z`).
    fn duration_number(&self) -> Result<i32, FormattingError> {
        let code = self.parameter_code.duration();
        if code == 'V' {
            if self.duration_unit != 'Z' {
                if let (Some(base), Some(value)) = (
                    duration_variable_base(self.duration_unit),
                    self.duration_value,
                ) {
                    return Ok(base + value);
                }
            }
            return Err(FormattingError::MissingDurationVariable(
                self.parameter_code.as_str().to_string(),
            ));
        }
        builtin_duration_number(code, self.parameter_code.pe())
            .ok_or(FormattingError::UnknownDurationCode(code))
    }

    fn probability_number(&self) -> Result<f64, FormattingError> {
        let code = self.parameter_code.probability();
        builtin_probability_number(code).ok_or(FormattingError::UnknownProbabilityCode(code))
    }

    /// The format-1 parameter column: the code as typed when it was
    /// complete (with `Z` type displayed as `R`), the full resolved code
    /// otherwise - except that a send code expanding to fewer than seven
    /// characters keeps the historical 6-character display.
    fn parameter_column(&self, tables: &Tables) -> String {
        let orig = &self.orig_parameter_code;
        if orig.len() == 7 {
            if orig.as_bytes()[3] as char == 'Z' {
                format!("{}R{}", &orig[..3], &orig[4..])
            } else {
                orig.clone()
            }
        } else {
            let resolved = self.parameter_code.as_str();
            let shortened = orig.len() >= 2
                && tables
                    .send_code(&orig[..2])
                    .map(|send| send.expansion.len() != 7)
                    .unwrap_or(false);
            if shortened {
                format!("{} ", &resolved[..6])
            } else {
                resolved.to_string()
            }
        }
    }

    /// Render in the requested format, without a trailing newline.
    pub fn render(&self, format: OutputFormat, tables: &Tables) -> Result<String, FormattingError> {
        self.validate()?;
        match format {
            OutputFormat::Text1 => self.render_verbose(tables),
            OutputFormat::Text2 => self.render_compact(),
        }
    }

    fn render_verbose(&self, tables: &Tables) -> Result<String, FormattingError> {
        let mut out = String::with_capacity(128);
        out.push_str(&format!("{:<10}", self.location));
        out.push_str(&obs_time_verbose(&self.obs_time));
        out.push_str("  ");
        match &self.create_time {
            Some(t) => {
                out.push_str(&obs_time_verbose(t));
                out.push_str("  ");
            }
            None => out.push_str("0000-00-00 00:00:00  "),
        }
        out.push_str(&self.parameter_column(tables));
        out.push_str(&format!("{:15.4}", self.value));
        out.push(' ');
        out.push(self.qualifier);
        out.push_str(&format!("{:9.3}", self.probability_number()?));
        out.push_str("  ");
        out.push_str(&format!("{:04}", self.duration_number()?));
        out.push_str(&format!("{:2}", self.revised as u8));
        out.push_str(&format!("{:2}", self.time_series_code.as_number()));
        out.push_str("  ");
        match &self.message_source {
            Some(source) => out.push_str(&format!("{:<8}", source)),
            None => out.push_str("        "),
        }
        out.push_str("  ");
        match self.comment_text() {
            Some(comment) => out.push_str(&format!("\"{}\"", comment)),
            None => out.push_str("\" \""),
        }
        Ok(out)
    }

    fn render_compact(&self) -> Result<String, FormattingError> {
        let mut out = String::with_capacity(96);
        out.push_str(&format!("{:<8}", self.location));
        out.push_str(&obs_time_compact(&self.obs_time));
        out.push(' ');
        match &self.create_time {
            Some(t) => out.push_str(&obs_time_compact(t)),
            None => out.push_str("   0 0 0 0 0 0"),
        }
        out.push_str(&format!("{:>3}", self.parameter_code.pe()));
        out.push_str(&format!("{:>2}", self.parameter_code.type_code()));
        out.push(self.parameter_code.source_code());
        out.push(self.parameter_code.extremum());
        out.push_str(&format!("{:10.3}", self.value));
        out.push_str(&format!("{:>2}", self.qualifier));
        out.push_str(&format!("{:6.2}", self.probability_number()?));
        out.push_str(&format!("{:5}", self.duration_number()?));
        out.push_str(&format!("{:2}", self.revised as u8));
        out.push(' ');
        match &self.message_source {
            Some(source) => out.push_str(&format!("{:<8}", source)),
            None => out.push_str("        "),
        }
        out.push_str(&format!("{}", self.time_series_code.as_number()));
        if let Some(comment) = self.comment_text() {
            out.push_str(&format!("\n        \"{}\"", comment));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        datetime::DateTime,
        defaults::Tables,
        parameter::resolve_parameter_code,
        record::{OutputRecord, TimeSeriesCode},
        timezone::{LegacyZone, Zone},
    };

    fn record(orig: &str, value: f64) -> OutputRecord {
        let tables = Tables::default();
        let (code, _) = resolve_parameter_code(&tables, orig).unwrap();
        OutputRecord {
            location: "LOCA".to_string(),
            parameter_code: code,
            orig_parameter_code: orig.to_string(),
            obs_time: DateTime::new(2024, 5, 1, 12, 0, 0, Zone::Legacy(LegacyZone::Z)).unwrap(),
            create_time: None,
            value,
            qualifier: 'Z',
            revised: false,
            duration_unit: 'Z',
            duration_value: None,
            message_source: None,
            time_series_code: TimeSeriesCode::None,
            comment: None,
        }
    }

    #[test]
    fn verbose_columns() {
        let tables = Tables::default();
        let formatted = record("HG", 12.34)
            .render(OutputFormat::Text1, &tables)
            .unwrap();
        assert_eq!(
            formatted,
            "LOCA      2024-05-01 12:00:00  0000-00-00 00:00:00  HGIRZZZ        12.3400 Z   -1.000  0000 0 0            \" \""
        );
    }

    #[test]
    fn verbose_send_code_display() {
        let tables = Tables::default();
        // PP expands through the send code PPD (3 chars): 6-char display
        let formatted = record("PP", 0.5).render(OutputFormat::Text1, &tables).unwrap();
        assert!(formatted.contains("  PPDRZZ     "));
        // QY expands to a full 7-char code: full display
        let formatted = record("QY", 9.0).render(OutputFormat::Text1, &tables).unwrap();
        assert!(formatted.contains("  QRIRZZZ"));
    }

    #[test]
    fn verbose_z_type_display() {
        let tables = Tables::default();
        let mut rec = record("HGIRZZZ", 1.0);
        rec.orig_parameter_code = "HGIZZZZ".to_string();
        rec.parameter_code = resolve_parameter_code(&tables, "HGIZZZZ").unwrap().0;
        let formatted = rec.render(OutputFormat::Text1, &tables).unwrap();
        // typed Z type displays as R
        assert!(formatted.contains("  HGIRZZZ"));
    }

    #[test]
    fn compact_columns() {
        let tables = Tables::default();
        let mut rec = record("HG", 12.34);
        rec.comment = Some("\"stage ok\"".to_string());
        let formatted = rec.render(OutputFormat::Text2, &tables).unwrap();
        let mut lines = formatted.lines();
        assert_eq!(
            lines.next().unwrap(),
            "LOCA    2024 5 112 0 0    0 0 0 0 0 0 HG RZZ    12.340 Z -1.00    0 0         0"
        );
        assert_eq!(lines.next().unwrap(), "        \"stage ok\"");
    }

    #[test]
    fn duration_variable_rendering() {
        let tables = Tables::default();
        let (code, _) = resolve_parameter_code(&tables, "HGVRZZZ").unwrap();
        let mut rec = record("HG", 1.0);
        rec.parameter_code = code;
        rec.orig_parameter_code = "HGVRZZZ".to_string();
        // V duration without a variable is a formatting error
        assert!(rec.render(OutputFormat::Text1, &tables).is_err());

        rec.duration_unit = 'H';
        rec.duration_value = Some(6);
        let formatted = rec.render(OutputFormat::Text1, &tables).unwrap();
        assert!(formatted.contains(" 1006 0 0"));
    }
}
