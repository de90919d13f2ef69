//! `.B` / `.BR` messages: a multi-line header declaring a parameter list,
//! then one body line per location with positional values, closed by
//! `.END`.

use chrono::TimeDelta;

use crate::{
    datetime::{DateTime, TimeOffset},
    errors::{Error, ParsingError},
    grammar::{
        self, glue_date_operators, DOT_B_BODY_LINE, DOT_B_HEADER_LINES, OBS_TIME_CHAIN,
        RETAINED_COMMENT,
    },
    parameter::{resolve_parameter_code, ParameterCode},
    record::{OutputRecord, TimeSeriesCode},
};

use super::{ShefParser, Units};

/// One parameter declared in a `.B` header, with the time/unit/qualifier
/// state in effect at its declaration.
struct DotBParameterInfo {
    parameter_code: ParameterCode,
    orig_parameter_code: String,
    obstime: DateTime,
    use_prev_7am: bool,
    relativetime: Option<TimeOffset>,
    createtime: Option<DateTime>,
    units: Units,
    qualifier: char,
    duration_unit: char,
    duration_value: Option<i32>,
}

impl DotBParameterInfo {
    #[allow(clippy::too_many_arguments)]
    fn new(
        parser: &ShefParser,
        parameter_code: ParameterCode,
        orig_parameter_code: String,
        obstime: DateTime,
        use_prev_7am: bool,
        relativetime: Option<TimeOffset>,
        createtime_str: Option<&str>,
        createtime: Option<DateTime>,
        units: Units,
        qualifier: char,
        duration_unit: char,
        duration_value: Option<i32>,
    ) -> Result<Self, ParsingError> {
        if use_prev_7am {
            if relativetime.is_some() {
                return Err(ParsingError::RelativeWithPrev7am);
            }
            if obstime.zone().is_utc() {
                return Err(ParsingError::UtcWithPrev7am);
            }
        }

        let createtime = match createtime {
            Some(t) => Some(t),
            None => {
                let mut anchor = obstime;
                if let Some(shift) = &relativetime {
                    anchor = anchor.to_utc()?.add_offset(shift)?;
                }
                parser.creation_time(&anchor, createtime_str)?
            }
        };

        Ok(Self {
            parameter_code,
            orig_parameter_code,
            obstime,
            use_prev_7am,
            relativetime,
            createtime,
            units,
            qualifier,
            duration_unit,
            duration_value,
        })
    }

    /// Combine the header state with one body value, replicating the
    /// shefit order of operations: calendar part of the shift in local
    /// time, conversion to UTC, then the sub-day part of the shift.
    #[allow(clippy::too_many_arguments)]
    fn output_record(
        &self,
        parser: &ShefParser,
        revised: bool,
        msg_source: &str,
        location: &str,
        obstime_override: Option<DateTime>,
        relativetime_override: Option<TimeOffset>,
        createtime_override_str: Option<&str>,
        units_override: Option<Units>,
        duration_unit: Option<char>,
        duration_value: Option<i32>,
        value: f64,
        qualifier: Option<char>,
        comment: Option<String>,
    ) -> Result<OutputRecord, ParsingError> {
        if self.use_prev_7am {
            if let Some(t) = &obstime_override {
                if t.zone().is_utc() {
                    return Err(ParsingError::UtcWithPrev7am);
                }
            }
            if relativetime_override.is_some() {
                return Err(ParsingError::RelativeWithPrev7am);
            }
        }

        let shift = relativetime_override.or(self.relativetime);
        let mut obst = obstime_override.unwrap_or(self.obstime);

        if self.use_prev_7am {
            if obst.hour() < 7 {
                obst = obst.add(TimeDelta::days(-1))?;
            }
            obst = obst.replace(None, None, None, Some(7), Some(0), Some(0), None)?;
        } else if let Some(shift) = &shift {
            match shift {
                TimeOffset::Months(delta) => {
                    obst = obst.add_months(delta.months, false)?;
                }
                TimeOffset::Clock(delta) => {
                    let seconds = delta.num_seconds();
                    let days = (seconds.abs() / 86400) * if seconds < 0 { -1 } else { 1 };
                    obst = obst.add(TimeDelta::days(days))?;
                }
            }
        }

        let local_zone = obst.zone();
        let mut obst = obst.to_utc()?;
        if let Some(TimeOffset::Clock(delta)) = &shift {
            let seconds = delta.num_seconds();
            let remainder = if seconds > 0 {
                seconds.rem_euclid(86400)
            } else {
                -((-seconds).rem_euclid(86400))
            };
            obst = obst.add(TimeDelta::seconds(remainder))?;
        }

        let create = match createtime_override_str {
            Some(s) => parser.creation_time(&obst.to_zone(local_zone)?, Some(s))?,
            None => self.createtime,
        };
        let create = match create {
            Some(t) => Some(t.to_utc()?),
            None => None,
        };

        let mut value = value;
        if units_override == Some(Units::Si) {
            value = parser.english_unit_value(value, self.parameter_code.as_str());
        }

        Ok(OutputRecord {
            location: location.to_string(),
            parameter_code: self.parameter_code.clone(),
            orig_parameter_code: self.orig_parameter_code.clone(),
            obs_time: obst,
            create_time: create,
            value,
            qualifier: qualifier.unwrap_or(self.qualifier),
            revised,
            duration_unit: duration_unit.unwrap_or(self.duration_unit),
            duration_value: if duration_unit.is_some() {
                duration_value
            } else {
                self.duration_value
            },
            message_source: Some(msg_source.to_string()),
            time_series_code: TimeSeriesCode::None,
            comment,
        })
    }
}

/// Split a body field on whitespace, keeping quoted comments attached to
/// the value they follow.
fn retokenize(tokens: Vec<String>) -> Vec<String> {
    let mut new_tokens: Vec<String> = Vec::new();
    for token in tokens {
        if token.is_empty() {
            new_tokens.push(token);
            continue;
        }
        let hidden = grammar::hide_quoted_whitespace(&token);
        for piece in hidden.split_whitespace() {
            if piece.starts_with(['\'', '"']) && !new_tokens.is_empty() {
                if let Some(last) = new_tokens.last_mut() {
                    last.push(' ');
                    last.push_str(piece);
                }
            } else {
                new_tokens.push(piece.to_string());
            }
        }
    }
    new_tokens
        .into_iter()
        .map(|t| grammar::unhide_quoted_whitespace(&t))
        .collect()
}

/// Zero-pad a short date-override tail to its natural field width.
fn pad_override(token: &str) -> String {
    let selector = token
        .as_bytes()
        .get(1)
        .map(|b| b.to_ascii_uppercase())
        .unwrap_or(0);
    let padded = |width: usize| {
        let mut s = token.to_string();
        while s.len() < width {
            s.push('0');
        }
        s
    };
    match selector {
        b'M' if token.len() > 6 => padded(12),
        b'D' if token.len() > 4 => padded(10),
        b'H' => padded(8),
        b'N' if token.len() == 4 => padded(6),
        _ => token.to_string(),
    }
}

impl ShefParser {
    pub(crate) fn parse_dot_b(&mut self, message: &str) -> Result<Vec<OutputRecord>, Error> {
        // separate the header block from the body
        let header_match = DOT_B_HEADER_LINES
            .find(message)
            .ok_or_else(|| ParsingError::InvalidDotBMessage(message.to_string()))?;
        let mut header_lines: Vec<String> = header_match
            .as_str()
            .trim()
            .split('\n')
            .map(|s| s.to_string())
            .collect();
        header_lines[0] = header_lines[0].trim().to_string();
        let mut header = header_lines[0].clone();
        for line in &header_lines[1..] {
            let tag_len = line.split_whitespace().next().map(|w| w.len()).unwrap_or(0);
            let rest = line.get(tag_len..).unwrap_or("").trim();
            if !rest.is_empty() && !header.ends_with('/') && !rest.starts_with('/') {
                header.push('/');
            }
            header.push_str(rest);
        }
        let body_lines: Vec<&str> = message
            .get(header_match.end()..)
            .unwrap_or("")
            .trim()
            .split('\n')
            .collect();
        let body = if body_lines.len() > 1 {
            body_lines[..body_lines.len() - 1].join("\n")
        } else {
            String::new()
        };

        let positional = self.parse_positional(message)?;
        let msg_source = positional.location.clone();
        let zone = positional.zone;
        let mut century_specified = positional.century_specified;

        // default observation time: noon for Zulu, 24:00 otherwise
        let default_obstime = if positional.zone_code == "Z" {
            DateTime::new(
                positional.date.year(),
                positional.date.month(),
                positional.date.day(),
                12,
                0,
                0,
                zone,
            )?
        } else {
            DateTime::new(
                positional.date.year(),
                positional.date.month(),
                positional.date.day(),
                24,
                0,
                0,
                zone,
            )?
        };

        // ---- parameter control fields ----
        let param_str = header
            .get(positional.body_start..)
            .unwrap_or("")
            .trim()
            .to_string();
        let param_str = glue_date_operators(&param_str);
        let param_tokens: Vec<String> = param_str
            .trim_matches('/')
            .split('/')
            .map(|s| s.trim().trim_matches('@').to_string())
            .collect();

        let mut obstime: Option<DateTime> = Some(default_obstime);
        let mut obstime_specified = false;
        let mut last_explicit_time = default_obstime;
        let mut relativetime: Option<TimeOffset> = None;
        let mut createtime_str: Option<String> = None;
        let mut createtime: Option<DateTime> = None;
        let mut qualifier = 'Z';
        let mut units = Units::English;
        let mut duration_unit = 'Z';
        let mut duration_value: Option<i32> = None;
        let mut hdr_param_info: Vec<Option<DotBParameterInfo>> = Vec::new();
        let mut param_count = 0usize;
        let mut last: Option<usize> = None;
        let mut obstime_error: Option<ParsingError> = None;
        let mut outrecs: Vec<OutputRecord> = Vec::new();

        for token in &param_tokens {
            let result: Result<(), ParsingError> = (|| {
                if OBS_TIME_CHAIN.is_match(token) {
                    let mut pos = 0usize;
                    loop {
                        let rest = token.get(pos..).unwrap_or("");
                        let Some(m) = OBS_TIME_CHAIN.captures(rest) else {
                            return Err(ParsingError::UnexpectedItem(rest.to_string()));
                        };
                        let operator = m[1].to_ascii_uppercase();
                        match self.observation_time(
                            &last_explicit_time,
                            &operator,
                            century_specified,
                            true,
                        ) {
                            Ok((t, r, century)) => {
                                century_specified = century;
                                obstime = t;
                                if r.is_some() {
                                    relativetime = r;
                                    obstime_specified = false;
                                } else {
                                    let Some(t) = t else {
                                        return Err(ParsingError::BadObservationTime(
                                            token.to_string(),
                                        ));
                                    };
                                    last_explicit_time = t;
                                    obstime_specified = true;
                                }
                            }
                            Err(e) => {
                                obstime_error = Some(e);
                            }
                        }
                        pos += m.get(0).map(|g| g.end()).unwrap_or(0);
                        if pos >= token.len() {
                            break;
                        }
                    }
                    Ok(())
                } else if grammar::is_create_time(token) {
                    createtime_str = Some(token[2..].to_string());
                    Ok(())
                } else if grammar::is_unit_system(token) {
                    units = if token.as_bytes()[2].to_ascii_uppercase() == b'E' {
                        Units::English
                    } else {
                        Units::Si
                    };
                    Ok(())
                } else if grammar::is_data_qualifier(token) {
                    qualifier = (token.as_bytes()[2] as char).to_ascii_uppercase();
                    if !self.tables.qualifier_codes.contains(&qualifier) {
                        return Err(ParsingError::BadQualifier(qualifier.to_string()));
                    }
                    Ok(())
                } else if grammar::is_duration_variable(token) {
                    duration_unit = (token.as_bytes()[2] as char).to_ascii_uppercase();
                    if duration_unit == 'Z' {
                        duration_value = None;
                    } else {
                        let value: i32 = token
                            .get(3..)
                            .and_then(|s| s.parse().ok())
                            .ok_or_else(|| ParsingError::InvalidDurationVariable(token.clone()))?;
                        if value > 99 {
                            return Err(ParsingError::InvalidDurationVariable(token.clone()));
                        }
                        duration_value = Some(value);
                    }
                    Ok(())
                } else if grammar::is_parameter_code(token) {
                    let code = token.to_ascii_uppercase();
                    if code.len() < 2 {
                        return Err(ParsingError::InvalidPeCode(code));
                    }
                    if !self.tables.send_codes.contains_key(&code)
                        && self.tables.conversion_factor(&code[..2]).is_none()
                    {
                        self.diagnostics.warning(&format!(
                            "Unknown PE code: [{}], value(s) will be untransformed",
                            &code[..2]
                        ));
                    }
                    let (parameter_code, use_prev_7am) =
                        resolve_parameter_code(&self.tables, &code)?;
                    if let Some(e) = obstime_error.take() {
                        return Err(e);
                    }

                    if createtime_str.is_some() && createtime.is_none() {
                        let info = DotBParameterInfo::new(
                            self,
                            parameter_code,
                            code,
                            last_explicit_time,
                            use_prev_7am,
                            relativetime,
                            createtime_str.as_deref(),
                            None,
                            units,
                            qualifier,
                            duration_unit,
                            duration_value,
                        )?;
                        createtime = info.createtime;
                        hdr_param_info.push(Some(info));
                    } else {
                        if obstime_specified {
                            relativetime = None;
                        } else if relativetime.is_none() {
                            if let Some(index) = last {
                                relativetime = hdr_param_info
                                    .get(index)
                                    .and_then(|i| i.as_ref())
                                    .and_then(|i| i.relativetime);
                            }
                        }
                        let info = DotBParameterInfo::new(
                            self,
                            parameter_code,
                            code,
                            last_explicit_time,
                            use_prev_7am,
                            relativetime,
                            None,
                            createtime,
                            units,
                            qualifier,
                            duration_unit,
                            duration_value,
                        )?;
                        hdr_param_info.push(Some(info));
                    }
                    param_count += 1;
                    last = Some(hdr_param_info.len() - 1);
                    obstime_specified = false;
                    relativetime = None;
                    Ok(())
                } else if token.is_empty() {
                    Ok(())
                } else {
                    Err(ParsingError::UnexpectedItem(token.clone()))
                }
            })();

            if let Err(e) = result {
                self.diagnostics.error(&e.to_string())?;
                if matches!(e, ParsingError::UnexpectedItem(_)) || self.reject_problematic {
                    return Ok(Vec::new());
                }
                // keep the body columns aligned with the failed parameter
                hdr_param_info.push(None);
            }
        }

        // ---- body ----
        let body = body.replace(',', "\n");
        let mut last: Option<usize> = None;
        for bodyline in body.split('\n') {
            let bodyline = bodyline.trim();
            if !DOT_B_BODY_LINE.is_match(bodyline) {
                if !bodyline.is_empty() {
                    self.diagnostics.error(&format!(
                        "Invalid item in body line or packed report: [{}]",
                        bodyline
                    ))?;
                    if self.reject_problematic {
                        return Ok(Vec::new());
                    }
                }
                continue;
            }

            let location = bodyline
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string();
            let bodytokens: Vec<String> = bodyline
                .get(location.len()..)
                .unwrap_or("")
                .trim()
                .split('/')
                .map(|s| s.trim().to_string())
                .collect();
            let bodytokens = retokenize(bodytokens);

            let mut p = 0usize;
            let mut outrec_pos = 0usize;
            let mut createtime_override_str: Option<String> = None;
            let mut default_qualifier: Option<char> = None;
            let mut units_override: Option<Units> = None;
            let mut last_explicit_time: Option<DateTime> = None;
            let mut duration_unit = 'Z';
            let mut duration_value: Option<i32> = None;
            let mut skip_parameter = false;
            let mut time_overrides: Vec<Option<DateTime>> = vec![None; hdr_param_info.len()];
            let mut relativetime_overrides: Vec<Option<TimeOffset>> =
                vec![None; hdr_param_info.len()];

            for token in &bodytokens {
                if p >= hdr_param_info.len() {
                    if !token.is_empty() {
                        self.diagnostics.warning(&format!(
                            "Too many tokens in .B body line [{}]. Header contains {} valid parameters",
                            bodyline,
                            hdr_param_info.len()
                        ));
                    }
                    break;
                }
                if token.is_empty() {
                    p += 1;
                    continue;
                }

                let result: Result<(), ParsingError> = (|| {
                    if grammar::is_obs_time(token) {
                        // per-row observation time override
                        let base = last_explicit_time
                            .or(obstime)
                            .or_else(|| {
                                hdr_param_info
                                    .get(p)
                                    .and_then(|i| i.as_ref())
                                    .map(|i| i.obstime)
                            })
                            .unwrap_or(default_obstime);
                        let padded = pad_override(token);
                        match self.observation_time(&base, &padded, century_specified, true) {
                            Ok((t, r, century)) => {
                                century_specified = century;
                                if let Some(r) = r {
                                    relativetime_overrides[p] = Some(r);
                                } else {
                                    last_explicit_time = t;
                                    time_overrides[p] = t;
                                }
                                Ok(())
                            }
                            Err(e) => {
                                skip_parameter = true;
                                Err(e)
                            }
                        }
                    } else if grammar::is_create_time(token) {
                        createtime_override_str = Some(token[2..].to_string());
                        Ok(())
                    } else if grammar::is_unit_system(token) {
                        units_override = Some(if token.as_bytes()[2].to_ascii_uppercase() == b'E' {
                            Units::English
                        } else {
                            Units::Si
                        });
                        Ok(())
                    } else if grammar::is_data_qualifier(token) {
                        default_qualifier = Some(token.as_bytes()[2] as char);
                        Ok(())
                    } else if grammar::is_duration_variable(token) {
                        duration_unit = (token.as_bytes()[2] as char).to_ascii_uppercase();
                        if duration_unit == 'Z' {
                            duration_value = None;
                        } else {
                            duration_value = token.get(3..).and_then(|s| s.parse().ok());
                        }
                        Ok(())
                    } else {
                        // a value, possibly followed by a retained comment
                        if let Some(info) =
                            hdr_param_info.get(p).and_then(|i| i.as_ref())
                        {
                            let parsed =
                                self.parse_value_token(token, info.parameter_code.pe(), info.units);
                            let (value, value_qualifier) = match parsed {
                                Ok(parsed) => parsed,
                                Err(e) => {
                                    p += 1;
                                    outrec_pos += 1;
                                    return Err(e);
                                }
                            };
                            let mut qualifier = value_qualifier;
                            if qualifier.is_none() {
                                qualifier = default_qualifier;
                            }
                            if let Some(q) = qualifier {
                                if !self.tables.qualifier_codes.contains(&q.to_ascii_uppercase())
                                {
                                    self.diagnostics.warning(&format!(
                                        "Unknown data qualifier: [{}], qualifier set to Z",
                                        q
                                    ));
                                }
                            }
                            let comment = RETAINED_COMMENT
                                .find(token)
                                .map(|m| m.as_str().to_string());

                            if p > 0 {
                                if time_overrides[p].is_none() {
                                    if let Some(index) = last {
                                        if time_overrides[index].is_some() {
                                            time_overrides[p] = time_overrides[index];
                                        }
                                    }
                                }
                                if relativetime_overrides[p].is_none() {
                                    if let Some(index) = last {
                                        if relativetime_overrides[index].is_some() {
                                            relativetime_overrides[p] =
                                                relativetime_overrides[index];
                                        }
                                    }
                                }
                            }

                            if !skip_parameter {
                                if info.parameter_code.is_forecast() && info.createtime.is_none() {
                                    self.diagnostics.warning(&format!(
                                        "Forecast parameter [{}] value [{}] does not have creation date",
                                        info.parameter_code, value
                                    ));
                                }
                                let record = info.output_record(
                                    self,
                                    positional.revised,
                                    &msg_source,
                                    &location,
                                    time_overrides[p].or(last_explicit_time),
                                    relativetime_overrides[p],
                                    createtime_override_str.as_deref(),
                                    units_override,
                                    if duration_unit != 'Z' {
                                        Some(duration_unit)
                                    } else {
                                        None
                                    },
                                    if duration_unit != 'Z' {
                                        duration_value
                                    } else {
                                        None
                                    },
                                    value,
                                    qualifier,
                                    comment,
                                )?;
                                outrecs.push(record);
                                outrec_pos += 1;
                                last = Some(p);
                            } else {
                                skip_parameter = false;
                            }
                        }
                        duration_unit = 'Z';
                        duration_value = None;
                        p += 1;
                        Ok(())
                    }
                })();

                if let Err(e) = result {
                    self.diagnostics.error(&e.to_string())?;
                    if self.reject_problematic {
                        return Ok(Vec::new());
                    }
                }
            }

            if outrec_pos < param_count {
                self.diagnostics.warning(&format!(
                    "Value count ({}) is less than parameter count ({}) for location [{}]",
                    outrec_pos, param_count, location
                ));
            }
        }
        Ok(outrecs)
    }
}
