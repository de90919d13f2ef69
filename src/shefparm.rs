//! SHEFPARM overlay.
//!
//! A SHEFPARM file mutates the program-default tables before any message is
//! parsed. Layout: `$` comment lines, an optional `SHEFPARM` banner, and
//! numbered section markers:
//!
//! ```text
//! *1   PE CODES AND CONVERSION FACTORS
//! *2   DURATION CODES AND ASSOCIATED VALUES
//! *3   TS CODES
//! *4   EXTREMUM CODES
//! *5   PROBABILITY CODES AND ASSOCIATED VALUES
//! *6   SEND CODES OR DURATION DEFAULTS OTHER THAN I
//! *7   DATA QUALIFIER CODES
//! **   MAX NUMBER OF ERRORS (I4 FORMAT)
//! ```
//!
//! Adding a non-standard code is informational, changing a standard one is
//! a warning, and a malformed file or an invalid data qualifier is critical.

use std::path::Path;

use crate::{
    defaults::{SendCode, Tables},
    diagnostics::Diagnostics,
    errors::{ConfigError, Error},
};

/// Fixed-column field access, tolerant of short lines.
fn field(line: &str, start: usize, end: usize) -> String {
    line.chars().skip(start).take(end - start).collect()
}

fn section_name(section: char) -> &'static str {
    match section {
        '1' => "PE CODES",
        '2' => "DURATION CODES",
        '3' => "TS CODES",
        '4' => "EXTREMUM CODES",
        '5' => "PROBABILITY CODES",
        '6' => "SEND CODES",
        '7' => "DATA QUALIFIER CODES",
        _ => "MAX ERROR COUNT",
    }
}

impl Tables {
    /// Apply a SHEFPARM file on top of the program defaults.
    pub fn apply_shefparm(&mut self, path: &Path, diag: &mut Diagnostics) -> Result<(), Error> {
        let name = path.display().to_string();
        if !path.exists() || path.is_dir() {
            diag.critical(&format!("No such file: [{}]", name));
            return Err(ConfigError::NoSuchFile(name).into());
        }
        let content = std::fs::read_to_string(path)?;

        let mut section: Option<char> = None;
        let mut visited = [false; 8];

        for (index, line) in content.trim().split('\n').enumerate() {
            let line_number = index + 1;
            if line.is_empty()
                || line.starts_with('$')
                || line.to_ascii_uppercase().starts_with("SHEFPARM")
            {
                continue;
            }
            if line.starts_with('*') {
                let Some(marker) = line.chars().nth(1) else {
                    diag.critical(&format!(
                        "{}: Invalid line at line {}: [{}]",
                        name, line_number, line
                    ));
                    return Err(ConfigError::InvalidLine(name, line_number, line.to_string()).into());
                };
                if !matches!(marker, '1'..='7' | '*') {
                    diag.critical(&format!(
                        "{}: Unexpected section \"[{}]\" at line {}",
                        name, marker, line_number
                    ));
                    return Err(ConfigError::UnexpectedSection(name, marker, line_number).into());
                }
                section = Some(marker);
            } else if let Some(marker) = section {
                self.apply_section_line(marker, line, &name, diag)?;
                visited[section_index(marker)] = true;
            } else {
                diag.critical(&format!(
                    "{}: No section for line {} [{}]",
                    name, line_number, line
                ));
                return Err(ConfigError::OrphanLine(name, line_number, line.to_string()).into());
            }
        }

        for marker in ['*', '1', '2', '3', '4', '5', '6', '7'] {
            if !visited[section_index(marker)] {
                diag.info(&format!(
                    "{} does not contain section [{}] ({})",
                    name,
                    marker,
                    section_name(marker)
                ));
            }
        }

        self.rebuild_duration_ids();
        Ok(())
    }

    fn apply_section_line(
        &mut self,
        section: char,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Result<(), Error> {
        match section {
            '1' => self.set_pe_code(line, name, diag),
            '2' => self.set_duration_code(line, name, diag),
            '3' => self.set_ts_code(line, name, diag),
            '4' => self.set_extremum_code(line, name, diag),
            '5' => self.set_probability_code(line, name, diag),
            '6' => self.set_send_code(line, name, diag),
            '7' => self.set_qualifier_code(line, name, diag),
            _ => self.set_max_error_count(line, name, diag),
        }
    }

    fn malformed(
        &self,
        section: char,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Error {
        diag.critical(&format!(
            "{}: Malformed record in section [{}]: [{}]",
            name, section, line
        ));
        ConfigError::MalformedRecord(name.to_string(), section, line.to_string()).into()
    }

    fn set_pe_code(&mut self, line: &str, name: &str, diag: &mut Diagnostics) -> Result<(), Error> {
        let key = field(line, 0, 2);
        let Ok(value) = field(line, 3, 23).trim().parse::<f64>() else {
            return Err(self.malformed('1', line, name, diag));
        };
        match self.pe_conversions.get(&key) {
            None => {
                if !self.send_codes.contains_key(&key) {
                    diag.info(&format!(
                        "{}: Adding non-standard physical element code [{}] with conversion factor [{}]",
                        name, key, value
                    ));
                }
            }
            Some(current) => {
                let ratio = value / current;
                if !(0.9999..=1.001).contains(&ratio) {
                    diag.warning(&format!(
                        "{}: Updating standard physical element code [{}] conversion factor from [{}] to [{}]",
                        name, key, current, value
                    ));
                }
            }
        }
        self.pe_conversions.insert(key, value);
        Ok(())
    }

    fn set_duration_code(
        &mut self,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Result<(), Error> {
        let Some(key) = line.chars().next() else {
            return Err(self.malformed('2', line, name, diag));
        };
        let valstr = field(line, 3, 8);
        let Ok(value) = valstr.trim().parse::<i32>() else {
            diag.critical(&format!(
                "Cannot use non-integer value [{}] for duration code [{}]",
                valstr.trim(),
                key
            ));
            return Err(ConfigError::NonIntegerDuration(valstr.trim().to_string(), key).into());
        };
        match self.duration_codes.get(&key) {
            None => diag.info(&format!(
                "{}: Adding non-standard duration code [{}] with numerical value [{}]",
                name, key, value
            )),
            Some(current) if *current != value => diag.warning(&format!(
                "{}: Updating standard duration code [{}] numerical value from [{}] to [{}]",
                name, key, current, value
            )),
            _ => {}
        }
        self.duration_codes.insert(key, value);
        Ok(())
    }

    fn set_ts_code(&mut self, line: &str, name: &str, diag: &mut Diagnostics) -> Result<(), Error> {
        let key = field(line, 0, 2);
        let enabled = if line.chars().count() > 3 {
            match field(line, 3, 5).trim().parse::<i32>() {
                Ok(value) => value != 0,
                Err(_) => return Err(self.malformed('3', line, name, diag)),
            }
        } else {
            false
        };
        if enabled {
            if !self.ts_codes.contains(&key) {
                diag.info(&format!(
                    "{}: Adding non-standard type-and-source code [{}]",
                    name, key
                ));
                self.ts_codes.insert(key);
            }
        } else if self.ts_codes.contains(&key) {
            diag.warning(&format!(
                "{}: Disabling standard type-and-source code [{}]",
                name, key
            ));
            self.ts_codes.remove(&key);
        }
        Ok(())
    }

    fn set_extremum_code(
        &mut self,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Result<(), Error> {
        let Some(key) = line.chars().next() else {
            return Err(self.malformed('4', line, name, diag));
        };
        let enabled = if line.chars().count() > 3 {
            match field(line, 3, 5).trim().parse::<i32>() {
                Ok(value) => value != 0,
                Err(_) => return Err(self.malformed('4', line, name, diag)),
            }
        } else {
            false
        };
        if enabled {
            if !self.extremum_codes.contains(&key) {
                diag.info(&format!(
                    "{}: Adding non-standard extremum code [{}]",
                    name, key
                ));
                self.extremum_codes.insert(key);
            }
        } else if self.extremum_codes.contains(&key) {
            diag.warning(&format!(
                "{}: Disabling standard extremum code [{}]",
                name, key
            ));
            self.extremum_codes.remove(&key);
        }
        Ok(())
    }

    fn set_probability_code(
        &mut self,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Result<(), Error> {
        let Some(key) = line.chars().next() else {
            return Err(self.malformed('5', line, name, diag));
        };
        let Ok(value) = field(line, 2, 22).trim().parse::<f64>() else {
            return Err(self.malformed('5', line, name, diag));
        };
        match self.probability_codes.get(&key) {
            None => diag.info(&format!(
                "{}: Adding non-standard probability code [{}] with conversion factor [{}]",
                name, key, value
            )),
            Some(current) if *current != value => diag.warning(&format!(
                "{}: Updating standard probability code [{}] conversion factor from [{}] to [{}]",
                name, key, current, value
            )),
            _ => {}
        }
        self.probability_codes.insert(key, value);
        Ok(())
    }

    fn set_send_code(
        &mut self,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Result<(), Error> {
        let key = field(line, 0, 2);
        if key.len() != 2 {
            return Err(self.malformed('6', line, name, diag));
        }
        let expansion = field(line, 3, 10).trim_end().to_string();
        let use_prev_7am = line.chars().nth(12) == Some('1');
        let value = SendCode {
            expansion,
            use_prev_7am,
        };
        match self.send_codes.get(&key) {
            None => diag.info(&format!(
                "{}: Adding non-standard send code [{}] with parameter [{}] and use-prev-0700 = [{}]",
                name, key, value.expansion, value.use_prev_7am
            )),
            Some(current) if *current != value => diag.warning(&format!(
                "{}: Updating standard send code [{}] from parameter [{}] and use-prev-0700 = [{}] to parameter [{}] and use-prev-0700 = [{}]",
                name, key, current.expansion, current.use_prev_7am, value.expansion, value.use_prev_7am
            )),
            _ => {}
        }
        self.send_codes.insert(key, value);
        Ok(())
    }

    fn set_qualifier_code(
        &mut self,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Result<(), Error> {
        let key = field(line, 0, 1);
        let valid = key.len() == 1
            && key.chars().all(|c| c.is_ascii_uppercase())
            && key != "I"
            && key != "O";
        if !valid {
            diag.critical(&format!("{}: Invalid data qualifier [{}]", name, key));
            return Err(ConfigError::InvalidQualifier(name.to_string(), key).into());
        }
        let key = key.chars().next().unwrap_or('Z');
        if !self.qualifier_codes.contains(&key) {
            diag.info(&format!(
                "{}: Adding non-standard data qualifier code [{}]",
                name, key
            ));
            self.qualifier_codes.insert(key);
        }
        Ok(())
    }

    fn set_max_error_count(
        &mut self,
        line: &str,
        name: &str,
        diag: &mut Diagnostics,
    ) -> Result<(), Error> {
        let Ok(value) = field(line, 0, 4).replace(' ', "").parse::<u32>() else {
            return Err(self.malformed('*', line, name, diag));
        };
        if value != self.max_error_count {
            diag.info(&format!("{}: Maximum error count set to [{}]", name, value));
        }
        self.max_error_count = value;
        Ok(())
    }
}

fn section_index(marker: char) -> usize {
    match marker {
        '1'..='7' => marker as usize - '1' as usize,
        _ => 7,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn load(content: &str) -> Result<(Tables, Diagnostics), Error> {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "shefparm-test-{}-{:p}",
            std::process::id(),
            &content
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        drop(file);

        let mut tables = Tables::default();
        let mut diag = Diagnostics::new(500);
        let result = tables.apply_shefparm(&path, &mut diag);
        std::fs::remove_file(&path).ok();
        result.map(|_| (tables, diag))
    }

    #[test]
    fn missing_file_is_critical() {
        let mut tables = Tables::default();
        let mut diag = Diagnostics::new(500);
        assert!(tables
            .apply_shefparm(Path::new("/no/such/SHEFPARM"), &mut diag)
            .is_err());
    }

    #[test]
    fn overlay_sections() {
        let content = "\
$ test overlay
SHEFPARM
*1
XX 2.54
HG 3.2808399
*2
O   0060
*3
XY  1
ZZ
*4
O   1
*6
PP PPD
*7
U
**
 250
";
        let (tables, _) = load(content).unwrap();
        // non-standard PE added
        assert_eq!(tables.conversion_factor("XX"), Some(2.54));
        // identical factor within tolerance: unchanged, no warning path
        assert_eq!(tables.conversion_factor("HG"), Some(3.2808399));
        // new duration code
        assert_eq!(tables.duration_codes.get(&'O'), Some(&60));
        assert_eq!(tables.duration_ids.get(&60), Some(&'O'));
        // TS add and disable
        assert!(tables.ts_codes.contains("XY"));
        assert!(!tables.ts_codes.contains("ZZ"));
        // extremum add
        assert!(tables.extremum_codes.contains(&'O'));
        // send code unchanged, qualifier added, max errors set
        assert_eq!(tables.send_code("PP").unwrap().expansion, "PPD");
        assert!(tables.qualifier_codes.contains(&'U'));
        assert_eq!(tables.max_error_count(), 250);
    }

    #[test]
    fn invalid_qualifier_is_critical() {
        assert!(load("*7\nI\n").is_err());
        assert!(load("*7\nq\n").is_err());
        assert!(load("*7\n1\n").is_err());
    }

    #[test]
    fn orphan_line_is_critical() {
        assert!(load("HG 3.28\n").is_err());
    }

    #[test]
    fn unexpected_section_is_critical() {
        assert!(load("*9\nHG 3.28\n").is_err());
    }
}
