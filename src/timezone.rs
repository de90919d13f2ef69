//! SHEF time zone model.
//!
//! The grammar names zones with one or two letters. Two models interpret
//! them, selected once at parser construction:
//!
//! - [ModernZone]: IANA zones (or fixed offsets for the Newfoundland
//!   standard/daylight pair) resolved through the tz database.
//! - [LegacyZone]: the closed shefit set with hard-coded standard offsets
//!   and a table-driven daylight rule. The historical shefit offset bugs
//!   (Yukon, Newfoundland daylight) are part of this model.
//!
//! The two models never mix: conversion between them is an error.

use chrono::FixedOffset;
use chrono_tz::Tz;

use crate::errors::ParsingError;

/// Day-of-month of the winter->summer and summer->winter transitions for
/// years 1976-2040. Before 2007 the months are April/October, afterward
/// March/November. Used only by the legacy model.
#[rustfmt::skip]
const DST_DATES: [(u8, u8); 65] = [
    (26, 31), (24, 30), (30, 29), (29, 28), (27, 26), (26, 25), // 1976-1981
    (25, 31), (24, 30), (29, 28), (28, 27), (27, 26), ( 5, 25), // 1982-1987
    ( 3, 30), ( 2, 29), ( 1, 28), ( 7, 27), ( 5, 25), ( 4, 31), // 1988-1993
    ( 3, 30), ( 2, 29), ( 7, 27), ( 6, 26), ( 5, 25), ( 4, 31), // 1994-1999
    ( 2, 29), ( 1, 28), ( 7, 27), ( 6, 26), ( 4, 31), ( 3, 30), // 2000-2005
    ( 2, 29), (11,  4), ( 9,  2), ( 8,  1), (14,  7), (13,  6), // 2006-2011
    (11,  4), (10,  3), ( 9,  2), ( 8,  1), (13,  6), (12,  5), // 2012-2017
    (11,  4), (10,  3), ( 8,  1), (14,  7), (13,  6), (12,  5), // 2018-2023
    (10,  3), ( 9,  2), ( 8,  1), (14,  7), (12,  5), (11,  4), // 2024-2029
    (10,  3), ( 9,  2), (14,  7), (13,  6), (12,  5), (11,  4), // 2030-2035
    ( 9,  2), ( 8,  1), (14,  7), (13,  6), (11,  4),           // 2036-2040
];

/// Transition days-of-month for a year, clamped to the table range.
pub(crate) fn transition_days(year: i32) -> (u8, u8) {
    let year = year.clamp(1976, 2040);
    DST_DATES[(year - 1976) as usize]
}

/// Transition month pair for a year: April/October before 2007,
/// March/November afterward.
pub(crate) fn transition_months(year: i32) -> (u8, u8) {
    if year.clamp(1976, 2040) < 2007 {
        (4, 10)
    } else {
        (3, 11)
    }
}

/// The shefit rule for whether a civil date/time is in summer time.
pub(crate) fn legacy_summer_time(y: i32, m: u8, d: u8, h: u8, n: u8) -> bool {
    let y = y.clamp(1976, 2040);
    if !(3..=10).contains(&m) {
        return false;
    }
    let (fwd_dom, back_dom) = transition_days(y);
    let (fwd_month, back_month) = transition_months(y);
    if fwd_month < m && m < back_month {
        true
    } else if m == fwd_month {
        d > fwd_dom || (d == fwd_dom && h > 2) || (d == fwd_dom && h == 2 && n > 0)
    } else if m == back_month {
        d < back_dom || (d == back_dom && h < 2) || (d == back_dom && h == 2 && n == 0)
    } else {
        false
    }
}

/// One of the closed set of shefit zone codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::upper_case_acronyms)]
pub enum LegacyZone {
    Z,
    N,
    NS,
    ND,
    A,
    AS,
    AD,
    E,
    ES,
    ED,
    C,
    CS,
    CD,
    M,
    MS,
    MD,
    P,
    PS,
    PD,
    Y,
    YS,
    YD,
    L,
    LS,
    LD,
    H,
    HS,
    HD,
    B,
    BS,
    BD,
    J,
}

impl LegacyZone {
    /// Standard offset in minutes to add to local time to reach UTC.
    /// These are the shefit values, bugs included: ND shares the NS offset
    /// and the Yukon codes predate its move to year-round UTC-7.
    pub fn offset_minutes(self) -> i32 {
        use LegacyZone::*;
        match self {
            Z => 0,
            N | NS | ND => 210,
            A | AS => 240,
            AD => 180,
            E | ES => 300,
            ED => 240,
            C | CS => 360,
            CD => 300,
            M | MS => 420,
            MD => 360,
            P | PS => 480,
            PD => 420,
            Y | YS => 540,
            YD => 480,
            L | LS => 540,
            LD => 480,
            H | HS | HD => 600,
            B | BS => 660,
            BD => 600,
            J => -480,
        }
    }

    /// Whether the daylight table applies: single-letter local zones other
    /// than Z, N and H.
    pub fn observes_dst(self) -> bool {
        use LegacyZone::*;
        matches!(self, A | E | C | M | P | Y | L | B | J)
    }

    pub fn code(self) -> &'static str {
        use LegacyZone::*;
        match self {
            Z => "Z",
            N => "N",
            NS => "NS",
            ND => "ND",
            A => "A",
            AS => "AS",
            AD => "AD",
            E => "E",
            ES => "ES",
            ED => "ED",
            C => "C",
            CS => "CS",
            CD => "CD",
            M => "M",
            MS => "MS",
            MD => "MD",
            P => "P",
            PS => "PS",
            PD => "PD",
            Y => "Y",
            YS => "YS",
            YD => "YD",
            L => "L",
            LS => "LS",
            LD => "LD",
            H => "H",
            HS => "HS",
            HD => "HD",
            B => "B",
            BS => "BS",
            BD => "BD",
            J => "J",
        }
    }
}

impl std::str::FromStr for LegacyZone {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use LegacyZone::*;
        match s.to_ascii_uppercase().as_str() {
            "Z" => Ok(Z),
            "N" => Ok(N),
            "NS" => Ok(NS),
            "ND" => Ok(ND),
            "A" => Ok(A),
            "AS" => Ok(AS),
            "AD" => Ok(AD),
            "E" => Ok(E),
            "ES" => Ok(ES),
            "ED" => Ok(ED),
            "C" => Ok(C),
            "CS" => Ok(CS),
            "CD" => Ok(CD),
            "M" => Ok(M),
            "MS" => Ok(MS),
            "MD" => Ok(MD),
            "P" => Ok(P),
            "PS" => Ok(PS),
            "PD" => Ok(PD),
            "Y" => Ok(Y),
            "YS" => Ok(YS),
            "YD" => Ok(YD),
            "L" => Ok(L),
            "LS" => Ok(LS),
            "LD" => Ok(LD),
            "H" => Ok(H),
            "HS" => Ok(HS),
            "HD" => Ok(HD),
            "B" => Ok(B),
            "BS" => Ok(BS),
            "BD" => Ok(BD),
            "J" => Ok(J),
            other => Err(ParsingError::InvalidTimeZone(other.to_string())),
        }
    }
}

impl std::fmt::Display for LegacyZone {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A zone in the modern model: an IANA identifier or a fixed UTC offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModernZone {
    Named(Tz),
    Fixed(FixedOffset),
}

impl ModernZone {
    /// Map a SHEF zone code onto the tz database.
    /// NS and ND have no IANA equivalent and become fixed offsets.
    pub fn for_code(code: &str) -> Result<Self, ParsingError> {
        let named = |tz: Tz| Ok(ModernZone::Named(tz));
        match code.to_ascii_uppercase().as_str() {
            "Z" => named(chrono_tz::UTC),
            "J" => named(chrono_tz::PRC),
            "H" | "HS" | "HD" => named(chrono_tz::US::Hawaii),
            "B" => named(chrono_tz::Pacific::Midway),
            "BS" => named(chrono_tz::Etc::GMTPlus11),
            "BD" => named(chrono_tz::Etc::GMTPlus10),
            "L" => named(chrono_tz::US::Alaska),
            "LS" => named(chrono_tz::Etc::GMTPlus9),
            "LD" => named(chrono_tz::Etc::GMTPlus8),
            "Y" => named(chrono_tz::Canada::Yukon),
            "YS" => named(chrono_tz::Etc::GMTPlus8),
            "YD" => named(chrono_tz::Etc::GMTPlus7),
            "P" => named(chrono_tz::US::Pacific),
            "PS" => named(chrono_tz::Etc::GMTPlus8),
            "PD" => named(chrono_tz::Etc::GMTPlus7),
            "M" => named(chrono_tz::US::Mountain),
            "MS" => named(chrono_tz::Etc::GMTPlus7),
            "MD" => named(chrono_tz::Etc::GMTPlus6),
            "C" => named(chrono_tz::US::Central),
            "CS" => named(chrono_tz::Etc::GMTPlus6),
            "CD" => named(chrono_tz::Etc::GMTPlus5),
            "E" => named(chrono_tz::US::Eastern),
            "ES" => named(chrono_tz::Etc::GMTPlus5),
            "ED" => named(chrono_tz::Etc::GMTPlus4),
            "A" => named(chrono_tz::Canada::Atlantic),
            "AS" => named(chrono_tz::Etc::GMTPlus4),
            "AD" => named(chrono_tz::Etc::GMTPlus3),
            "N" => named(chrono_tz::Canada::Newfoundland),
            "NS" => FixedOffset::east_opt(-(3 * 3600 + 1800))
                .map(ModernZone::Fixed)
                .ok_or_else(|| ParsingError::TimeZoneInstantiation(code.to_string())),
            "ND" => FixedOffset::east_opt(-(2 * 3600 + 1800))
                .map(ModernZone::Fixed)
                .ok_or_else(|| ParsingError::TimeZoneInstantiation(code.to_string())),
            other => Err(ParsingError::InvalidTimeZone(other.to_string())),
        }
    }

    pub fn is_utc(self) -> bool {
        match self {
            ModernZone::Named(tz) => tz == chrono_tz::UTC,
            ModernZone::Fixed(offset) => offset.utc_minus_local() == 0,
        }
    }
}

impl std::fmt::Display for ModernZone {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ModernZone::Named(tz) => write!(f, "{}", tz.name()),
            ModernZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// The tagged zone model; a parser works entirely within one variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Zone {
    Modern(ModernZone),
    Legacy(LegacyZone),
}

impl Zone {
    /// Resolve a SHEF zone code under the selected model.
    pub fn for_code(code: &str, shefit_times: bool) -> Result<Self, ParsingError> {
        if shefit_times {
            Ok(Zone::Legacy(code.parse()?))
        } else {
            Ok(Zone::Modern(ModernZone::for_code(code)?))
        }
    }

    /// The UTC zone under the selected model.
    pub fn utc(shefit_times: bool) -> Self {
        if shefit_times {
            Zone::Legacy(LegacyZone::Z)
        } else {
            Zone::Modern(ModernZone::Named(chrono_tz::UTC))
        }
    }

    pub fn is_utc(self) -> bool {
        match self {
            Zone::Legacy(zone) => zone == LegacyZone::Z,
            Zone::Modern(zone) => zone.is_utc(),
        }
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, Zone::Legacy(_))
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Zone::Modern(zone) => write!(f, "{}", zone),
            Zone::Legacy(zone) => write!(f, "{}", zone),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn legacy_offsets() {
        assert_eq!(LegacyZone::Z.offset_minutes(), 0);
        assert_eq!(LegacyZone::E.offset_minutes(), 300);
        assert_eq!(LegacyZone::ED.offset_minutes(), 240);
        assert_eq!(LegacyZone::J.offset_minutes(), -480);
        // shefit quirks kept verbatim
        assert_eq!(LegacyZone::ND.offset_minutes(), LegacyZone::NS.offset_minutes());
        assert_eq!(LegacyZone::Y.offset_minutes(), 540);
    }

    #[test]
    fn legacy_dst_scope() {
        assert!(LegacyZone::E.observes_dst());
        assert!(LegacyZone::P.observes_dst());
        assert!(!LegacyZone::Z.observes_dst());
        assert!(!LegacyZone::N.observes_dst());
        assert!(!LegacyZone::H.observes_dst());
        assert!(!LegacyZone::ES.observes_dst());
        assert!(!LegacyZone::ED.observes_dst());
    }

    #[test]
    fn summer_time_rule() {
        // 2007 switched to March/November transitions
        assert_eq!(transition_months(2006), (4, 10));
        assert_eq!(transition_months(2007), (3, 11));
        assert_eq!(transition_days(2007), (11, 4));
        assert_eq!(transition_days(2024), (10, 3));

        // mid-summer
        assert!(legacy_summer_time(2024, 7, 1, 0, 0));
        // just before and after the 2024 spring-forward instant (Mar 10, 02:00)
        assert!(!legacy_summer_time(2024, 3, 10, 2, 0));
        assert!(legacy_summer_time(2024, 3, 10, 2, 1));
        assert!(legacy_summer_time(2024, 3, 10, 3, 0));
        assert!(!legacy_summer_time(2024, 3, 9, 23, 59));
        // the 3..=10 month guard predates the 2007 rule change, so November
        // never reads as summer even on the fall-back day; kept as shefit behaves
        assert!(!legacy_summer_time(2024, 11, 3, 1, 59));
        assert!(legacy_summer_time(2024, 10, 31, 23, 59));
        // pre-2007 October fall-back
        assert!(legacy_summer_time(2000, 10, 29, 1, 0));
        assert!(!legacy_summer_time(2000, 10, 29, 3, 0));
    }

    #[test]
    fn zone_codes() {
        assert!(LegacyZone::from_str("es").is_ok());
        assert!(LegacyZone::from_str("Q").is_err());
        assert!(ModernZone::for_code("E").is_ok());
        assert!(ModernZone::for_code("NS").is_ok());
        assert!(ModernZone::for_code("XX").is_err());
        assert!(Zone::utc(true).is_utc());
        assert!(Zone::utc(false).is_utc());
        assert!(Zone::utc(true).is_legacy());
    }
}
