//! `.E` / `.ER` messages: one parameter, a declared interval, and a run of
//! slash-separated values forming an evenly spaced series.

use chrono::TimeDelta;

use crate::{
    datetime::{CalendarDelta, DateTime, TimeOffset},
    errors::{Error, ParsingError},
    grammar::{self, OBS_TIME_CHAIN},
    parameter::{resolve_parameter_code, ParameterCode},
    record::{OutputRecord, TimeSeriesCode},
};

use super::{ShefParser, Units};

/// Flatten token groups to singletons, attaching quoted comments to the
/// value that precedes them.
fn retokenize(tokens: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut new_tokens: Vec<Vec<String>> = Vec::new();
    for token in tokens {
        for subtoken in token {
            if subtoken.starts_with(['\'', '"']) && !new_tokens.is_empty() {
                if let Some(last) = new_tokens.last_mut() {
                    last.push(subtoken);
                }
            } else {
                new_tokens.push(vec![subtoken]);
            }
        }
    }
    new_tokens
}

impl ShefParser {
    pub(crate) fn parse_dot_e(&mut self, message: &str) -> Result<Vec<OutputRecord>, Error> {
        let positional = self.parse_positional(message)?;
        let zone = positional.zone;
        let mut century_specified = positional.century_specified;

        let datastr = message
            .get(positional.body_start..)
            .unwrap_or("")
            .trim()
            .to_string();
        let tokens = self.tokenize_a_e_data(&datastr, 'E', positional.revised);

        let default_hour = if positional.zone_code == "Z" { 12 } else { 0 };
        let mut obstime = DateTime::new(
            positional.date.year(),
            positional.date.month(),
            positional.date.day(),
            default_hour,
            0,
            0,
            zone,
        )?;
        let original_obstime = obstime;
        let mut last_explicit_time = obstime;

        let mut parameter_code: Option<ParameterCode> = None;
        let mut orig_parameter_code = String::new();
        let mut use_prev_7am = false;
        let mut createtime_str: Option<String> = None;
        let mut interval: Option<TimeOffset> = None;
        let mut time_series_code = TimeSeriesCode::None;
        let mut default_qualifier = 'Z';
        let mut units = Units::English;
        let mut duration_unit = 'Z';
        let mut duration_value: Option<i32> = None;
        let mut outrecs: Vec<OutputRecord> = Vec::new();

        let tokens = retokenize(tokens);
        for i in 0..tokens.len() {
            if tokens[i].len() > 1 && !tokens[i][1].starts_with(['\'', '"']) {
                self.diagnostics
                    .error(&ParsingError::InvalidDataString.to_string())?;
            }
            let token = tokens[i][0].clone();
            let mut parsed_value: Option<(f64, char)> = None;
            let mut comment: Option<String> = None;

            if OBS_TIME_CHAIN.is_match(&token) {
                // date operators rebase the series
                let mut pos = 0usize;
                loop {
                    let Some(rest) = token.get(pos..) else { break };
                    let Some(m) = OBS_TIME_CHAIN.captures(rest) else {
                        break;
                    };
                    let operator = m[1].to_ascii_uppercase();
                    let selector = token
                        .as_bytes()
                        .get(pos + 1)
                        .map(|b| b.to_ascii_uppercase())
                        .unwrap_or(0);
                    let result = if selector == b'J' || selector == b'R' {
                        if selector == b'R' && use_prev_7am {
                            Err(ParsingError::RelativeWithPrev7am)
                        } else {
                            last_explicit_time.to_utc().and_then(|base| {
                                self.observation_time(&base, &operator, century_specified, false)
                            })
                        }
                    } else {
                        self.observation_time(&original_obstime, &operator, century_specified, false)
                    };
                    match result {
                        Ok((t, _, century)) => {
                            if let Some(t) = t {
                                obstime = t;
                            }
                            century_specified = century;
                            if selector != b'J' && selector != b'R' {
                                last_explicit_time = obstime;
                            }
                        }
                        Err(e) => {
                            self.diagnostics.error(&e.to_string())?;
                            if self.reject_problematic {
                                return Ok(Vec::new());
                            }
                            break;
                        }
                    }
                    pos += m.get(1).map(|g| g.end()).unwrap_or(0) + 1;
                }
                if token.get(pos..).map(|s| !s.is_empty()).unwrap_or(false) {
                    self.diagnostics
                        .error(&ParsingError::UnexpectedItem(token.clone()).to_string())?;
                    return Ok(if self.reject_problematic {
                        Vec::new()
                    } else {
                        outrecs
                    });
                }
                time_series_code = TimeSeriesCode::First;
            } else if grammar::is_create_time(&token) {
                createtime_str = Some(token[2..].to_string());
                obstime = last_explicit_time;
                time_series_code = TimeSeriesCode::First;
            } else if grammar::is_unit_system(&token) {
                units = if token.as_bytes()[2].to_ascii_uppercase() == b'E' {
                    Units::English
                } else {
                    Units::Si
                };
            } else if grammar::is_data_qualifier(&token) {
                default_qualifier = (token.as_bytes()[2] as char).to_ascii_uppercase();
                if !self.tables.qualifier_codes.contains(&default_qualifier) {
                    self.diagnostics.error(
                        &ParsingError::BadQualifier(default_qualifier.to_string()).to_string(),
                    )?;
                    return Ok(if self.reject_problematic {
                        Vec::new()
                    } else {
                        outrecs
                    });
                }
            } else if grammar::is_duration_variable(&token) {
                duration_unit = (token.as_bytes()[2] as char).to_ascii_uppercase();
                if duration_unit == 'Z' {
                    duration_value = None;
                } else {
                    let value: i32 = token
                        .get(3..)
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| ParsingError::InvalidDurationVariable(token.clone()))?;
                    if value > 99 {
                        return Err(ParsingError::InvalidDurationVariable(token.clone()).into());
                    }
                    duration_value = Some(value);
                }
                time_series_code = TimeSeriesCode::First;
            } else if grammar::is_interval(&token) {
                // the interval also selects the duration position of the
                // parameter code
                let Some(code) = parameter_code.take() else {
                    return Err(ParsingError::IntervalBeforeParameter.into());
                };
                if use_prev_7am {
                    return Err(ParsingError::IntervalWithPrev7am(token.clone()).into());
                }
                if interval.is_some() {
                    self.diagnostics
                        .error(&ParsingError::IntervalRedeclared.to_string())?;
                    return Ok(if self.reject_problematic {
                        Vec::new()
                    } else {
                        outrecs
                    });
                }
                time_series_code = TimeSeriesCode::First;
                let interval_unit = (token.as_bytes()[2] as char).to_ascii_uppercase();
                let interval_value: i32 = token
                    .get(3..)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| ParsingError::InvalidInterval(token.clone()))?;
                if interval_value.abs() > 99 {
                    return Err(ParsingError::InvalidInterval(token.clone()).into());
                }
                let mut duration_code = interval_value;
                interval = Some(match interval_unit {
                    'S' => {
                        duration_code += 7000;
                        TimeOffset::Clock(TimeDelta::seconds(interval_value as i64))
                    }
                    'N' => TimeOffset::Clock(TimeDelta::minutes(interval_value as i64)),
                    'H' => {
                        duration_code += 1000;
                        TimeOffset::Clock(TimeDelta::hours(interval_value as i64))
                    }
                    'D' => {
                        duration_code += 2000;
                        TimeOffset::Clock(TimeDelta::days(interval_value as i64))
                    }
                    'M' => {
                        duration_code += 3000;
                        TimeOffset::Months(CalendarDelta::months(interval_value))
                    }
                    'E' => {
                        duration_code += 3000;
                        TimeOffset::Months(CalendarDelta::end_of_month(interval_value))
                    }
                    _ => {
                        duration_code += 4000;
                        TimeOffset::Months(CalendarDelta::months(12 * interval_value))
                    }
                });
                let Some(duration_id) = self.tables.duration_ids.get(&duration_code).copied()
                else {
                    self.diagnostics
                        .error(&ParsingError::NoDurationForInterval(token.clone()).to_string())?;
                    return Ok(if self.reject_problematic {
                        Vec::new()
                    } else {
                        outrecs
                    });
                };
                let rebuilt = format!(
                    "{}{}{}",
                    code.pe(),
                    duration_id,
                    &code.as_str()[3..]
                );
                parameter_code = Some(ParameterCode::from_resolved(rebuilt));
            } else if grammar::is_parameter_code(&token) {
                if parameter_code.is_some() {
                    self.diagnostics
                        .error(&ParsingError::ParameterRedeclared.to_string())?;
                    return Ok(if self.reject_problematic {
                        Vec::new()
                    } else {
                        outrecs
                    });
                }
                let code = token.to_ascii_uppercase();
                if code.len() < 2 {
                    self.diagnostics
                        .error(&ParsingError::InvalidPeCode(code.clone()).to_string())?;
                    return Ok(if self.reject_problematic {
                        Vec::new()
                    } else {
                        outrecs
                    });
                }
                if !self.tables.send_codes.contains_key(&code)
                    && self.tables.conversion_factor(&code[..2]).is_none()
                {
                    self.diagnostics.warning(&format!(
                        "Unknown PE code: [{}], value(s) will be untransformed",
                        &code[..2]
                    ));
                }
                let resolved = resolve_parameter_code(&self.tables, &code)?;
                parameter_code = Some(resolved.0);
                use_prev_7am = resolved.1;
                orig_parameter_code = code;
                if use_prev_7am {
                    if obstime.zone().is_utc() {
                        return Err(ParsingError::UtcWithPrev7am.into());
                    }
                    if interval.is_some() {
                        return Err(ParsingError::IntervalWithPrev7am(token.clone()).into());
                    }
                }
            } else if grammar::is_value(&token) {
                let Some(code) = &parameter_code else {
                    return Err(ParsingError::ValueBeforeParameter.into());
                };
                let (value, qualifier) =
                    self.parse_value_token(&token.to_ascii_uppercase(), code.pe(), units)?;
                let mut qualifier = qualifier.unwrap_or(default_qualifier);
                if !self.tables.qualifier_codes.contains(&qualifier) {
                    self.diagnostics.warning(&format!(
                        "Unknown data qualifier: [{}], qualifier set to Z",
                        qualifier
                    ));
                    qualifier = 'Z';
                }
                if let Some(text) = tokens[i].get(1) {
                    if text.starts_with(['\'', '"']) {
                        comment = Some(text.clone());
                    } else {
                        self.diagnostics
                            .error(&ParsingError::InvalidComment(text.clone()).to_string())?;
                    }
                }
                parsed_value = Some((value, qualifier));
            } else if token.is_empty() {
                // an empty slot advances the series clock without a record
                if parameter_code.is_none() || interval.is_none() {
                    return Err(ParsingError::NullFieldInDefinition.into());
                }
                if let Some(step) = &interval {
                    obstime = obstime.add_offset(step)?;
                }
                time_series_code = TimeSeriesCode::Subsequent;
            } else if token.starts_with(['\'', '"']) {
                self.diagnostics
                    .error("Comment encountered before value")?;
                if self.reject_problematic {
                    return Ok(Vec::new());
                }
            } else {
                self.diagnostics
                    .error(&ParsingError::UnexpectedItem(token.clone()).to_string())?;
                if self.reject_problematic {
                    return Ok(Vec::new());
                }
                if let Some(step) = &interval {
                    obstime = obstime.add_offset(step)?;
                }
                continue;
            }

            if let Some((value, qualifier)) = parsed_value {
                let Some(code) = parameter_code.clone() else {
                    return Err(ParsingError::ValueBeforeParameter.into());
                };
                if interval.is_none() {
                    return Err(ParsingError::ValueBeforeInterval.into());
                }

                if code.is_forecast() && createtime_str.is_none() {
                    self.diagnostics.warning(&format!(
                        "Forecast parameter [{}] value [{}] does not have creation date",
                        code, value
                    ));
                }

                let create_time = match self.creation_time(&obstime, createtime_str.as_deref())? {
                    Some(t) => Some(t.to_utc()?),
                    None => None,
                };
                outrecs.push(OutputRecord {
                    location: positional.location.clone(),
                    parameter_code: code,
                    orig_parameter_code: orig_parameter_code.clone(),
                    obs_time: obstime.to_utc()?,
                    create_time,
                    value,
                    qualifier,
                    revised: positional.revised,
                    duration_unit,
                    duration_value,
                    message_source: None,
                    time_series_code,
                    comment,
                });
                time_series_code = TimeSeriesCode::Subsequent;

                if let Some(step) = interval.clone() {
                    match obstime.add_offset(&step) {
                        Ok(t) => obstime = t,
                        Err(e) => {
                            self.diagnostics.error(&e.to_string())?;
                            return Ok(if self.reject_problematic {
                                Vec::new()
                            } else {
                                outrecs
                            });
                        }
                    }
                }
            }
        }
        Ok(outrecs)
    }
}
