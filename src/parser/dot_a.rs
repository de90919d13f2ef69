//! `.A` / `.AR` messages: one location, slash-separated parameter/value
//! pairs with interleaved state setters.

use chrono::TimeDelta;

use crate::{
    datetime::DateTime,
    errors::{Error, ParsingError},
    grammar::{self, OBS_TIME_CHAIN},
    parameter::resolve_parameter_code,
    record::{OutputRecord, TimeSeriesCode},
};

use super::{ShefParser, Units};

/// Regroup tokens the way shefit tolerates sloppy slash usage: a lone
/// parameter code adopts the following token as its value unless that token
/// is itself a parameter code, and date/unit setters embedded in a value
/// group split back out.
fn retokenize(tokens: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut new_tokens: Vec<Vec<String>> = Vec::new();
    let mut skip = false;
    for i in 0..tokens.len() {
        if skip {
            skip = false;
            continue;
        }
        if tokens[i].len() == 1 {
            let token = &tokens[i][0];
            if grammar::is_parameter_code(token) && !token.starts_with('D') {
                if i < tokens.len() - 1 {
                    let next = &tokens[i + 1][0];
                    if grammar::is_parameter_code(next) && !next.starts_with('D') {
                        new_tokens.push(tokens[i].clone());
                    } else {
                        let mut merged = tokens[i].clone();
                        merged.extend(tokens[i + 1].iter().cloned());
                        new_tokens.push(merged);
                        skip = true;
                    }
                } else {
                    new_tokens.push(tokens[i].clone());
                }
            } else {
                new_tokens.push(tokens[i].clone());
            }
        } else {
            let mut count = 0;
            for j in 0..tokens[i].len() {
                if grammar::is_obs_time_chain(&tokens[i][j])
                    || grammar::is_unit_system(&tokens[i][j])
                {
                    new_tokens.push(vec![tokens[i][j].clone()]);
                    count += 1;
                } else {
                    new_tokens.push(tokens[i][count..].to_vec());
                    break;
                }
            }
        }
    }
    new_tokens
}

impl ShefParser {
    pub(crate) fn parse_dot_a(&mut self, message: &str) -> Result<Vec<OutputRecord>, Error> {
        let positional = self.parse_positional(message)?;
        let zone = positional.zone;
        let mut century_specified = positional.century_specified;

        let datastr = message
            .get(positional.body_start..)
            .unwrap_or("")
            .trim()
            .to_string();
        let tokens = self.tokenize_a_e_data(&datastr, 'A', positional.revised);

        // default observation time: noon for Zulu, midnight otherwise
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
        let mut last_explicit_time = obstime;
        let mut createtime_str: Option<String> = None;
        let mut default_qualifier = 'Z';
        let mut units = Units::English;
        let mut duration_unit = 'Z';
        let mut duration_value: Option<i32> = None;
        let mut relative_specified = false;
        let mut outrecs: Vec<OutputRecord> = Vec::new();

        let tokens = retokenize(tokens);
        let partial = |parser: &Self, outrecs: Vec<OutputRecord>| {
            if parser.reject_problematic {
                Vec::new()
            } else {
                outrecs
            }
        };

        for i in 0..tokens.len() {
            if tokens[i].len() == 1 {
                let token = tokens[i][0].clone();
                if OBS_TIME_CHAIN.is_match(&token) {
                    // one or more date operators set the observation time
                    // for subsequent values
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
                            self.observation_time(
                                &last_explicit_time,
                                &operator,
                                century_specified,
                                false,
                            )
                        } else {
                            self.observation_time(&obstime, &operator, century_specified, false)
                        };
                        match result {
                            Ok((t, _, century)) => {
                                if let Some(t) = t {
                                    obstime = t;
                                }
                                century_specified = century;
                                if selector == b'R' {
                                    relative_specified = true;
                                } else if selector != b'J' {
                                    last_explicit_time = obstime;
                                    relative_specified = false;
                                }
                            }
                            Err(e) => {
                                self.diagnostics.error(&e.to_string())?;
                                return Ok(partial(self, outrecs));
                            }
                        }
                        pos += m.get(1).map(|g| g.end()).unwrap_or(0) + 1;
                    }
                    if token.get(pos..).map(|s| !s.is_empty()).unwrap_or(false) {
                        self.diagnostics
                            .error(&ParsingError::UnexpectedItem(token.clone()).to_string())?;
                        return Ok(partial(self, outrecs));
                    }
                } else if grammar::is_create_time(&token) {
                    createtime_str = Some(token[2..].to_string());
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
                        return Ok(partial(self, outrecs));
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
                } else if token.is_empty() {
                    // NULL field
                } else if grammar::is_parameter_code(&token) && !token.starts_with('D') {
                    // parameter code with no value: NULL field
                } else {
                    self.diagnostics
                        .error(&ParsingError::UnexpectedItem(token.clone()).to_string())?;
                    return Ok(partial(self, outrecs));
                }
                continue;
            }

            // a data value group: parameter code, value, optional comment
            let code = tokens[i][0].to_ascii_uppercase();
            if code.len() < 2 {
                self.diagnostics
                    .error(&ParsingError::InvalidPeCode(code.clone()).to_string())?;
                return Ok(Vec::new());
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
                match resolve_parameter_code(&self.tables, &code) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        self.diagnostics.error(&e.to_string())?;
                        if self.reject_problematic {
                            return Ok(Vec::new());
                        }
                        continue;
                    }
                };
            let orig_parameter_code = code;

            if use_prev_7am {
                if relative_specified {
                    self.diagnostics
                        .error(&ParsingError::RelativeWithPrev7am.to_string())?;
                    if self.reject_problematic {
                        return Ok(Vec::new());
                    }
                    continue;
                }
                if obstime.zone().is_utc() {
                    self.diagnostics
                        .error(&ParsingError::UtcWithPrev7am.to_string())?;
                    if self.reject_problematic {
                        return Ok(Vec::new());
                    }
                    continue;
                }
                // at or before 07:00 local the value belongs to the
                // previous day
                let mut t = obstime;
                if t.hour() < 7 {
                    t = t.add(TimeDelta::days(-1))?;
                }
                obstime = DateTime::new(t.year(), t.month(), t.day(), 7, 0, 0, t.zone())?;
            }

            let value_token = tokens[i][1].to_ascii_uppercase();
            let (value, qualifier) =
                match self.parse_value_token(&value_token, parameter_code.pe(), units) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        let got = if grammar::is_obs_time_chain(&value_token) {
                            Some("observation time")
                        } else if grammar::is_create_time(&value_token) {
                            Some("creation time")
                        } else if grammar::is_unit_system(&value_token) {
                            Some("unit system")
                        } else if grammar::is_data_qualifier(&value_token) {
                            Some("data qualifier")
                        } else if grammar::is_duration_variable(&value_token) {
                            Some("duration code")
                        } else {
                            None
                        };
                        match got {
                            Some(kind) => {
                                self.diagnostics.error(&format!(
                                    "Expected value for parameter [{}], got, {} [{}]",
                                    parameter_code, kind, value_token
                                ))?;
                                if self.reject_problematic {
                                    return Ok(Vec::new());
                                }
                                break;
                            }
                            None => {
                                self.diagnostics.error(&e.to_string())?;
                                if self.reject_problematic {
                                    return Ok(Vec::new());
                                }
                                continue;
                            }
                        }
                    }
                };

            let mut qualifier = qualifier.unwrap_or(default_qualifier);
            if !self.tables.qualifier_codes.contains(&qualifier) {
                self.diagnostics.warning(&format!(
                    "Unknown data qualifier: [{}], qualifier set to Z",
                    qualifier
                ));
                qualifier = 'Z';
            }

            let mut comment = tokens[i].get(2).cloned().filter(|c| !c.is_empty());
            if let Some(text) = &comment {
                if !text.starts_with(['\'', '"']) {
                    self.diagnostics
                        .error(&ParsingError::InvalidComment(text.clone()).to_string())?;
                    comment = None;
                }
            }

            if parameter_code.is_forecast() && createtime_str.is_none() {
                self.diagnostics.warning(&format!(
                    "Forecast parameter [{}] value [{}] does not have creation date",
                    parameter_code, value
                ));
            }

            let create_time = match self.creation_time(&obstime, createtime_str.as_deref())? {
                Some(t) => Some(t.to_utc()?),
                None => None,
            };
            outrecs.push(OutputRecord {
                location: positional.location.clone(),
                parameter_code,
                orig_parameter_code,
                obs_time: obstime.to_utc()?,
                create_time,
                value,
                qualifier,
                revised: positional.revised,
                duration_unit,
                duration_value,
                message_source: None,
                time_series_code: TimeSeriesCode::None,
                comment,
            });
        }
        Ok(outrecs)
    }
}
