//! Parameter codes and their expansion.
//!
//! A full code is seven positions: PE(2) + duration(1) + type(1) +
//! source(1) + extremum(1) + probability(1). Messages may carry as few as
//! the two PE letters; the remainder is filled from send codes and typed
//! defaults, then validated against the live tables.

use crate::{
    defaults::{
        default_duration_for, Tables, DEFAULT_EXTREMUM, DEFAULT_PROBABILITY, DEFAULT_SOURCE,
        DEFAULT_TYPE,
    },
    errors::ParsingError,
};

/// A validated 7-character parameter code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterCode(String);

impl ParameterCode {
    pub(crate) fn from_resolved(code: String) -> Self {
        debug_assert_eq!(code.len(), 7);
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Physical element pair.
    pub fn pe(&self) -> &str {
        &self.0[..2]
    }

    pub fn duration(&self) -> char {
        self.0.as_bytes()[2] as char
    }

    pub fn type_source(&self) -> &str {
        &self.0[3..5]
    }

    pub fn type_code(&self) -> char {
        self.0.as_bytes()[3] as char
    }

    pub fn source_code(&self) -> char {
        self.0.as_bytes()[4] as char
    }

    pub fn extremum(&self) -> char {
        self.0.as_bytes()[5] as char
    }

    pub fn probability(&self) -> char {
        self.0.as_bytes()[6] as char
    }

    /// Whether the type position marks a forecast.
    pub fn is_forecast(&self) -> bool {
        self.type_code() == 'F'
    }
}

impl std::fmt::Display for ParameterCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Expand a 2-7 character partial code to a full, validated parameter code.
/// Also reports whether a send code with the previous-0700 rule was used.
pub(crate) fn resolve_parameter_code(
    tables: &Tables,
    partial: &str,
) -> Result<(ParameterCode, bool), ParsingError> {
    if partial.split_whitespace().count() != 1 {
        return Err(ParsingError::InvalidParameterCode(partial.to_string()));
    }
    let partial = partial.trim().to_ascii_uppercase();

    // resolve send codes
    let mut use_prev_7am = false;
    let mut from_send_code = false;
    let mut code = partial.clone();
    if partial.len() >= 2 {
        if let Some(send) = tables.send_code(&partial[..2]) {
            use_prev_7am = send.use_prev_7am;
            if partial.len() != 2 && tables.conversion_factor(&partial[..2]).is_none() {
                return Err(ParsingError::SendCodeConflict(
                    partial.clone(),
                    partial[..2].to_string(),
                    send.expansion.clone(),
                ));
            }
            if partial.len() == 2 {
                from_send_code = true;
                code = send.expansion.clone();
            }
        }
    }

    let length = code.len();
    if !(2..=7).contains(&length) {
        return Err(ParsingError::ParameterCodeLength(partial));
    }

    let bytes: Vec<char> = code.chars().collect();
    if length > 2 && bytes[2] == 'Z' && !from_send_code {
        // replace Z duration with the PE default
        let mut replaced = code[..2].to_string();
        replaced.push(default_duration_for(&code[..2]));
        if length > 3 {
            replaced.push_str(&code[3..]);
        }
        code = replaced;
    }
    if length > 3 && code.as_bytes()[3] as char == 'Z' {
        // replace Z type with the default type
        let mut replaced = code[..3].to_string();
        replaced.push(DEFAULT_TYPE);
        if length > 4 {
            replaced.push_str(&code[4..]);
        }
        code = replaced;
    }

    // pad out the unspecified positions
    match length {
        2 => {
            code.push(default_duration_for(&code.clone()[..2]));
            code.push(DEFAULT_TYPE);
            code.push(DEFAULT_SOURCE);
            code.push(DEFAULT_EXTREMUM);
            code.push(DEFAULT_PROBABILITY);
        }
        3 => {
            code.push(DEFAULT_TYPE);
            code.push(DEFAULT_SOURCE);
            code.push(DEFAULT_EXTREMUM);
            code.push(DEFAULT_PROBABILITY);
        }
        4 => {
            code.push(DEFAULT_SOURCE);
            code.push(DEFAULT_EXTREMUM);
            code.push(DEFAULT_PROBABILITY);
        }
        5 => {
            code.push(DEFAULT_EXTREMUM);
            code.push(DEFAULT_PROBABILITY);
        }
        6 => code.push(DEFAULT_PROBABILITY),
        _ => {}
    }

    // validate every derived position against the live tables
    let chars: Vec<char> = code.chars().collect();
    if !tables.duration_codes.contains_key(&chars[2]) {
        return Err(ParsingError::InvalidDurationCode(chars[2], code));
    }
    if !tables.ts_codes.contains(&code[3..5]) {
        return Err(ParsingError::InvalidTypeSourceCode(
            code[3..5].to_string(),
            code.clone(),
        ));
    }
    if !tables.extremum_codes.contains(&chars[5]) {
        return Err(ParsingError::InvalidExtremumCode(chars[5], code));
    }
    if !tables.probability_codes.contains_key(&chars[6]) {
        return Err(ParsingError::InvalidProbabilityCode(chars[6], code));
    }

    Ok((ParameterCode::from_resolved(code), use_prev_7am))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::defaults::Tables;

    fn resolve(partial: &str) -> Result<(ParameterCode, bool), ParsingError> {
        resolve_parameter_code(&Tables::default(), partial)
    }

    #[test]
    fn plain_pe_expands_with_defaults() {
        let (code, prev7) = resolve("HG").unwrap();
        assert_eq!(code.as_str(), "HGIRZZZ");
        assert!(!prev7);
    }

    #[test]
    fn pe_with_default_duration() {
        let (code, _) = resolve("PP").unwrap();
        assert_eq!(code.as_str(), "PPDRZZZ");
        let (code, _) = resolve("TC").unwrap();
        assert_eq!(code.as_str(), "TCSRZZZ");
    }

    #[test]
    fn send_codes() {
        let (code, prev7) = resolve("QY").unwrap();
        assert_eq!(code.as_str(), "QRIRZZZ");
        assert!(prev7);

        let (code, prev7) = resolve("HN").unwrap();
        assert_eq!(code.as_str(), "HGIRZNZ");
        assert!(!prev7);

        // AD expands through ZZ type-and-source
        let (code, _) = resolve("AD").unwrap();
        assert_eq!(code.as_str(), "ADZZZZZ");
    }

    #[test]
    fn z_position_substitution() {
        // Z duration replaced by the PE default, Z type by R
        let (code, _) = resolve("PPZ").unwrap();
        assert_eq!(code.as_str(), "PPDRZZZ");
        let (code, _) = resolve("HGIZ").unwrap();
        assert_eq!(code.as_str(), "HGIRZZZ");
    }

    #[test]
    fn full_codes_pass_through() {
        let (code, _) = resolve("HGIRZXZ").unwrap();
        assert_eq!(code.as_str(), "HGIRZXZ");
    }

    #[test]
    fn resolved_positions_are_always_valid() {
        let tables = Tables::default();
        for partial in ["HG", "PP", "QY", "TAIRZXZ", "HGI", "HGIR", "HGIRZ", "HGIRZX"] {
            let (code, _) = resolve(partial).unwrap();
            assert_eq!(code.as_str().len(), 7);
            assert!(tables.duration_codes.contains_key(&code.duration()));
            assert!(tables.ts_codes.contains(code.type_source()));
            assert!(tables.extremum_codes.contains(&code.extremum()));
            assert!(tables.probability_codes.contains_key(&code.probability()));
        }
    }

    #[test]
    fn rejections() {
        assert!(resolve("H").is_err());
        assert!(resolve("HG QR").is_err());
        assert!(resolve("HGQRZZZX").is_err());
        // bad extremum
        assert!(matches!(
            resolve("HGIRZAZ"),
            Err(ParsingError::InvalidExtremumCode('A', _))
        ));
        // send code followed by inconsistent characters: QY is not a PE
        assert!(matches!(
            resolve("QYX"),
            Err(ParsingError::SendCodeConflict(..))
        ));
        // but PP is both a send code and a PE, so PPD resolves as typed
        let (code, prev7) = resolve("PPD").unwrap();
        assert_eq!(code.as_str(), "PPDRZZZ");
        assert!(!prev7);
    }
}
