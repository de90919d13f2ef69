//! Calendar-aware date/time for SHEF.
//!
//! [DateTime] differs from a plain civil datetime in three ways:
//! - it accepts and reproduces `24:00:00` for midnight (stored as the next
//!   civil day with an `adjusted` flag, so arithmetic stays correct),
//! - it can be shifted by whole months ([CalendarDelta]), with end-of-month
//!   semantics,
//! - its zone is a [Zone]: either the modern tz-database model or the
//!   legacy shefit model, never both in one run.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike};

use crate::{
    errors::ParsingError,
    timezone::{legacy_summer_time, transition_days, ModernZone, Zone},
};

/// A calendar increment of whole months.
///
/// With `eom` set, the source must sit on the last day of its month and the
/// result is forced to the last day of the target month.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalendarDelta {
    pub months: i32,
    pub eom: bool,
}

impl CalendarDelta {
    pub fn months(months: i32) -> Self {
        Self { months, eom: false }
    }

    pub fn end_of_month(months: i32) -> Self {
        Self { months, eom: true }
    }

    pub fn negated(self) -> Self {
        Self {
            months: -self.months,
            eom: self.eom,
        }
    }
}

impl std::fmt::Display for CalendarDelta {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "months={}, eom={}", self.months, self.eom)
    }
}

/// A relative shift: clock time or calendar months.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimeOffset {
    Clock(TimeDelta),
    Months(CalendarDelta),
}

impl std::fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TimeOffset::Clock(delta) => write!(f, "{}s", delta.num_seconds()),
            TimeOffset::Months(delta) => write!(f, "{}", delta),
        }
    }
}

pub(crate) fn is_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Last day of month (year required for February).
pub(crate) fn last_day(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if is_leap(year) {
                29
            } else {
                28
            }
        }
    }
}

/// Date/time with SHEF semantics.
///
/// The stored fields always name the true instant: a value constructed with
/// hour 24 is stored as midnight of the following civil day and flagged, so
/// the component accessors can present `24:00:00` on the earlier day while
/// comparisons and arithmetic see the real instant.
#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DateTime {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    zone: Zone,
    adjusted: bool,
}

impl DateTime {
    /// Build a value, validating ranges, the 24:00 rule and the
    /// spring-forward hole of the zone's model.
    pub fn new(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        zone: Zone,
    ) -> Result<Self, ParsingError> {
        if !(1..=12).contains(&month)
            || !(1..=last_day(year, month)).contains(&day)
            || minute > 59
            || second > 59
            || hour > 24
        {
            return Err(ParsingError::InvalidDateTime(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            )));
        }

        let mut value = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            zone,
            adjusted: false,
        };

        if hour == 24 {
            if minute != 0 || second != 0 {
                return Err(ParsingError::NonZeroPastMidnight);
            }
            // store the true instant, remember the 24:00 spelling
            value = value.roll_days(1);
            value.hour = 0;
            value.adjusted = true;
        }

        value.check_spring_forward()?;
        Ok(value)
    }

    /// Bypass validation; reserved for values derived from known-good
    /// instants (wall clock snapshots, zone conversions of the same instant).
    fn from_parts_unchecked(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        zone: Zone,
    ) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            zone,
            adjusted: false,
        }
    }

    /// Current wall-clock time expressed in `zone`.
    pub fn now_in(zone: Zone) -> Self {
        let now = chrono::Local::now().naive_local();
        Self::from_parts_unchecked(
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            zone,
        )
    }

    fn check_spring_forward(&self) -> Result<(), ParsingError> {
        match self.zone {
            Zone::Legacy(zone) => {
                if zone.observes_dst()
                    && (1976..=2040).contains(&self.year)
                    && (self.month == 3 || self.month == 4)
                    && self.hour == 2
                    && (self.minute != 0 || self.second != 0)
                {
                    let (fwd_dom, _) = transition_days(self.year);
                    let fwd_month = if self.year < 2007 { 4 } else { 3 };
                    if self.month == fwd_month as u32 && self.day == fwd_dom as u32 {
                        return Err(ParsingError::SpringForwardGap(
                            self.to_string(),
                            zone.to_string(),
                        ));
                    }
                }
                Ok(())
            }
            Zone::Modern(zone) => {
                let naive = self.naive();
                let exists = match zone {
                    ModernZone::Named(tz) => !matches!(
                        tz.from_local_datetime(&naive),
                        chrono::LocalResult::None
                    ),
                    ModernZone::Fixed(_) => true,
                };
                if exists {
                    Ok(())
                } else {
                    Err(ParsingError::SpringForwardGap(
                        self.to_string(),
                        zone.to_string(),
                    ))
                }
            }
        }
    }

    fn naive(&self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(self.hour, self.minute, self.second))
            .unwrap_or_default()
    }

    fn roll_days(&self, days: i64) -> Self {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day).unwrap_or_default()
            + TimeDelta::days(days);
        let mut value = *self;
        value.year = date.year();
        value.month = date.month();
        value.day = date.day();
        value
    }

    fn displays_midnight(&self) -> bool {
        self.adjusted && self.hour == 0 && self.minute == 0 && self.second == 0
    }

    /// Component fields as they should be displayed: a 24:00 value reports
    /// the previous civil day with hour 24.
    fn display_fields(&self) -> (i32, u32, u32, u32, u32, u32) {
        if self.displays_midnight() {
            let prev = self.roll_days(-1);
            (prev.year, prev.month, prev.day, 24, 0, 0)
        } else {
            (
                self.year,
                self.month,
                self.day,
                self.hour,
                self.minute,
                self.second,
            )
        }
    }

    pub fn year(&self) -> i32 {
        self.display_fields().0
    }

    pub fn month(&self) -> u32 {
        self.display_fields().1
    }

    pub fn day(&self) -> u32 {
        self.display_fields().2
    }

    pub fn hour(&self) -> u32 {
        self.display_fields().3
    }

    pub fn minute(&self) -> u32 {
        self.display_fields().4
    }

    pub fn second(&self) -> u32 {
        self.display_fields().5
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Replace component values; unset fields keep their displayed value,
    /// so replacing the hour on a 24:00 value stays on the earlier day.
    #[allow(clippy::too_many_arguments)]
    pub fn replace(
        &self,
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
        hour: Option<u32>,
        minute: Option<u32>,
        second: Option<u32>,
        zone: Option<Zone>,
    ) -> Result<Self, ParsingError> {
        let (y, m, d, h, n, s) = self.display_fields();
        Self::new(
            year.unwrap_or(y),
            month.unwrap_or(m),
            day.unwrap_or(d),
            hour.unwrap_or(h),
            minute.unwrap_or(n),
            second.unwrap_or(s),
            zone.unwrap_or(self.zone),
        )
    }

    /// Replace just the time of day.
    pub fn at_time(&self, hour: u32, minute: u32, second: u32) -> Result<Self, ParsingError> {
        self.replace(None, None, None, Some(hour), Some(minute), Some(second), None)
    }

    /// Clock-based addition. The result revalidates against the zone model
    /// (so landing inside a spring-forward hole is an error), and keeps the
    /// 24:00 spelling when it stays on a midnight.
    pub fn add(&self, delta: TimeDelta) -> Result<Self, ParsingError> {
        let naive = self
            .naive()
            .checked_add_signed(delta)
            .ok_or_else(|| ParsingError::InvalidDateTime(self.to_string()))?;
        let mut value = Self::new(
            naive.year(),
            naive.month(),
            naive.day(),
            naive.hour(),
            naive.minute(),
            naive.second(),
            self.zone,
        )?;
        if self.adjusted && value.hour == 0 && value.minute == 0 && value.second == 0 {
            value.adjusted = true;
        }
        Ok(value)
    }

    pub fn sub(&self, delta: TimeDelta) -> Result<Self, ParsingError> {
        self.add(-delta)
    }

    /// Month-based addition with the SHEF end-of-month rules: `eom` demands
    /// a last-day source and lands on the target month's last day; otherwise
    /// the day clamps to the target month's length.
    pub fn add_months(&self, months: i32, end_of_month: bool) -> Result<Self, ParsingError> {
        let (y, m, d, h, n, s) = self.display_fields();
        let is_last_day = d == last_day(y, m);
        if end_of_month && !is_last_day {
            return Err(ParsingError::NotEndOfMonth(self.to_string()));
        }

        let total = (y as i64) * 12 + (m as i64 - 1) + months as i64;
        let year = total.div_euclid(12) as i32;
        let month = (total.rem_euclid(12) + 1) as u32;

        let day = if end_of_month {
            last_day(year, month)
        } else {
            d.min(last_day(year, month))
        };

        Self::new(year, month, day, h, n, s, self.zone)
    }

    pub fn add_calendar(&self, delta: CalendarDelta) -> Result<Self, ParsingError> {
        self.add_months(delta.months, delta.eom)
    }

    pub fn add_offset(&self, offset: &TimeOffset) -> Result<Self, ParsingError> {
        match offset {
            TimeOffset::Clock(delta) => self.add(*delta),
            TimeOffset::Months(delta) => self.add_calendar(*delta),
        }
    }

    /// Whether a daylight offset is in effect at this instant.
    pub fn is_dst(&self) -> bool {
        match self.zone {
            Zone::Legacy(zone) => {
                zone.observes_dst()
                    && legacy_summer_time(
                        self.year,
                        self.month as u8,
                        self.day as u8,
                        self.hour as u8,
                        self.minute as u8,
                    )
            }
            Zone::Modern(ModernZone::Named(tz)) => {
                use chrono_tz::OffsetComponents;
                match tz.from_local_datetime(&self.naive()) {
                    chrono::LocalResult::Single(t) | chrono::LocalResult::Ambiguous(t, _) => {
                        !t.offset().dst_offset().is_zero()
                    }
                    chrono::LocalResult::None => false,
                }
            }
            Zone::Modern(ModernZone::Fixed(_)) => false,
        }
    }

    /// Seconds since the Unix epoch of the true instant, used for ordering.
    fn utc_timestamp(&self) -> i64 {
        match self.zone {
            Zone::Legacy(zone) => {
                let mut seconds = self.naive().and_utc().timestamp();
                if self.is_dst() {
                    seconds -= 3600;
                }
                seconds + zone.offset_minutes() as i64 * 60
            }
            Zone::Modern(ModernZone::Named(tz)) => match tz.from_local_datetime(&self.naive()) {
                chrono::LocalResult::Single(t) | chrono::LocalResult::Ambiguous(t, _) => {
                    t.timestamp()
                }
                // inside a gap (only reachable through unchecked snapshots):
                // read it with the pre-transition offset
                chrono::LocalResult::None => {
                    let shifted = self.naive() + TimeDelta::hours(1);
                    match tz.from_local_datetime(&shifted) {
                        chrono::LocalResult::Single(t)
                        | chrono::LocalResult::Ambiguous(t, _) => t.timestamp() - 3600,
                        chrono::LocalResult::None => shifted.and_utc().timestamp() - 3600,
                    }
                }
            },
            Zone::Modern(ModernZone::Fixed(offset)) => {
                self.naive().and_utc().timestamp() + offset.utc_minus_local() as i64
            }
        }
    }

    /// Express this instant in another zone of the same model.
    /// Moving between the legacy and modern models is rejected.
    pub fn to_zone(&self, target: Zone) -> Result<Self, ParsingError> {
        match (self.zone, target) {
            (Zone::Legacy(source), Zone::Legacy(dest)) => {
                let mut naive = self.naive();
                if source != dest {
                    if self.is_dst() {
                        naive -= TimeDelta::hours(1);
                    }
                    naive += TimeDelta::minutes(source.offset_minutes() as i64);
                    naive -= TimeDelta::minutes(dest.offset_minutes() as i64);
                    // the target's daylight status is read off the table at
                    // the resulting instant
                    if dest.observes_dst()
                        && legacy_summer_time(
                            naive.year(),
                            naive.month() as u8,
                            naive.day() as u8,
                            naive.hour() as u8,
                            naive.minute() as u8,
                        )
                    {
                        naive += TimeDelta::hours(1);
                    }
                }
                Self::new(
                    naive.year(),
                    naive.month(),
                    naive.day(),
                    naive.hour(),
                    naive.minute(),
                    naive.second(),
                    target,
                )
            }
            (Zone::Modern(source), Zone::Modern(dest)) => {
                let utc = match source {
                    ModernZone::Named(tz) => match tz.from_local_datetime(&self.naive()) {
                        chrono::LocalResult::Single(t)
                        | chrono::LocalResult::Ambiguous(t, _) => t.to_utc(),
                        chrono::LocalResult::None => {
                            return Err(ParsingError::InvalidDateTime(self.to_string()))
                        }
                    },
                    ModernZone::Fixed(offset) => match offset.from_local_datetime(&self.naive()) {
                        chrono::LocalResult::Single(t)
                        | chrono::LocalResult::Ambiguous(t, _) => t.to_utc(),
                        chrono::LocalResult::None => {
                            return Err(ParsingError::InvalidDateTime(self.to_string()))
                        }
                    },
                };
                let naive = match dest {
                    ModernZone::Named(tz) => utc.with_timezone(&tz).naive_local(),
                    ModernZone::Fixed(offset) => utc.with_timezone(&offset).naive_local(),
                };
                Self::new(
                    naive.year(),
                    naive.month(),
                    naive.day(),
                    naive.hour(),
                    naive.minute(),
                    naive.second(),
                    target,
                )
            }
            _ => Err(ParsingError::MixedZoneModels),
        }
    }

    /// Express this instant in UTC under its own model.
    pub fn to_utc(&self) -> Result<Self, ParsingError> {
        self.to_zone(Zone::utc(self.zone.is_legacy()))
    }

    /// Elapsed time from `other` to `self`.
    pub fn since(&self, other: &DateTime) -> TimeDelta {
        TimeDelta::seconds(self.utc_timestamp() - other.utc_timestamp())
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        self.utc_timestamp() == other.utc_timestamp()
    }
}

impl PartialOrd for DateTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.utc_timestamp().cmp(&other.utc_timestamp()))
    }
}

impl std::fmt::Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (y, m, d, h, n, s) = self.display_fields();
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} {}",
            y, m, d, h, n, s, self.zone
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::timezone::{LegacyZone, Zone};
    use chrono::TimeDelta;

    fn legacy(zone: LegacyZone) -> Zone {
        Zone::Legacy(zone)
    }

    fn modern(code: &str) -> Zone {
        Zone::Modern(crate::timezone::ModernZone::for_code(code).unwrap())
    }

    #[test]
    fn hour_24_round_trip() {
        let dt = DateTime::new(2024, 5, 1, 24, 0, 0, legacy(LegacyZone::Z)).unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 5);
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.hour(), 24);
        assert_eq!(dt.to_string(), "2024-05-01 24:00:00 Z");

        // same instant as next-day midnight
        let midnight = DateTime::new(2024, 5, 2, 0, 0, 0, legacy(LegacyZone::Z)).unwrap();
        assert_eq!(dt, midnight);

        // rejects non-zero minutes/seconds
        assert!(DateTime::new(2024, 5, 1, 24, 0, 1, legacy(LegacyZone::Z)).is_err());
        assert!(DateTime::new(2024, 5, 1, 24, 30, 0, legacy(LegacyZone::Z)).is_err());
    }

    #[test]
    fn hour_24_survives_full_day_arithmetic() {
        let dt = DateTime::new(2024, 5, 1, 24, 0, 0, legacy(LegacyZone::Z)).unwrap();
        let next = dt.add(TimeDelta::days(1)).unwrap();
        assert_eq!(next.hour(), 24);
        assert_eq!(next.day(), 2);

        // landing off midnight clears the spelling
        let later = dt.add(TimeDelta::hours(5)).unwrap();
        assert_eq!(later.hour(), 5);
        assert_eq!(later.day(), 2);
    }

    #[test]
    fn replace_uses_displayed_day() {
        let dt = DateTime::new(2024, 6, 15, 24, 0, 0, legacy(LegacyZone::E)).unwrap();
        let morning = dt.at_time(7, 0, 0).unwrap();
        assert_eq!(morning.day(), 15);
        assert_eq!(morning.hour(), 7);
    }

    #[test]
    fn month_arithmetic() {
        let dt = DateTime::new(2024, 1, 31, 12, 0, 0, legacy(LegacyZone::Z)).unwrap();
        // last-day source clamps into February
        let feb = dt.add_months(1, false).unwrap();
        assert_eq!((feb.month(), feb.day()), (2, 29));
        // end-of-month lands on last day
        let eom = dt.add_months(1, true).unwrap();
        assert_eq!((eom.month(), eom.day()), (2, 29));
        let apr = dt.add_months(3, true).unwrap();
        assert_eq!((apr.month(), apr.day()), (4, 30));

        // end-of-month from mid-month is an error
        let mid = DateTime::new(2024, 1, 15, 0, 0, 0, legacy(LegacyZone::Z)).unwrap();
        assert!(mid.add_months(1, true).is_err());

        // year boundaries both ways
        let dec = DateTime::new(2024, 1, 15, 0, 0, 0, legacy(LegacyZone::Z)).unwrap();
        let shifted = dec.add_months(-2, false).unwrap();
        assert_eq!((shifted.year(), shifted.month()), (2023, 11));
    }

    #[test]
    fn calendar_delta_inverse() {
        // (D + k months) - k months == D whenever day <= 28
        let dt = DateTime::new(2023, 3, 28, 6, 30, 0, legacy(LegacyZone::Z)).unwrap();
        for k in [-25, -13, -1, 1, 7, 14, 36] {
            let round_trip = dt.add_months(k, false).unwrap().add_months(-k, false).unwrap();
            assert_eq!(round_trip, dt, "k={}", k);
        }
    }

    #[test]
    fn legacy_conversion() {
        // winter: Eastern standard, +5h to UTC
        let dt = DateTime::new(2024, 1, 15, 7, 0, 0, legacy(LegacyZone::E)).unwrap();
        let utc = dt.to_utc().unwrap();
        assert_eq!((utc.hour(), utc.day()), (12, 15));

        // summer: daylight shifts one hour
        let dt = DateTime::new(2024, 6, 14, 7, 0, 0, legacy(LegacyZone::E)).unwrap();
        assert!(dt.is_dst());
        let utc = dt.to_utc().unwrap();
        assert_eq!(utc.hour(), 11);

        // explicit standard zone never observes daylight
        let dt = DateTime::new(2024, 6, 14, 7, 0, 0, legacy(LegacyZone::ES)).unwrap();
        let utc = dt.to_utc().unwrap();
        assert_eq!(utc.hour(), 12);
    }

    #[test]
    fn modern_conversion() {
        let dt = DateTime::new(2024, 6, 14, 7, 0, 0, modern("E")).unwrap();
        assert!(dt.is_dst());
        let utc = dt.to_utc().unwrap();
        assert_eq!(utc.hour(), 11);

        let dt = DateTime::new(2024, 1, 15, 7, 0, 0, modern("E")).unwrap();
        assert!(!dt.is_dst());
        assert_eq!(dt.to_utc().unwrap().hour(), 12);
    }

    #[test]
    fn zone_round_trip() {
        for zone in [legacy(LegacyZone::C), legacy(LegacyZone::MS)] {
            let dt = DateTime::new(2024, 8, 2, 15, 30, 0, zone).unwrap();
            let back = dt.to_utc().unwrap().to_zone(zone).unwrap();
            assert_eq!(back, dt);
        }
        let zone = modern("C");
        let dt = DateTime::new(2024, 8, 2, 15, 30, 0, zone).unwrap();
        let back = dt.to_utc().unwrap().to_zone(zone).unwrap();
        assert_eq!(back, dt);
    }

    #[test]
    fn mixed_models_rejected() {
        let dt = DateTime::new(2024, 8, 2, 15, 30, 0, legacy(LegacyZone::C)).unwrap();
        assert!(matches!(
            dt.to_zone(modern("C")),
            Err(ParsingError::MixedZoneModels)
        ));
    }

    #[test]
    fn spring_forward_hole() {
        // 2024 transition: March 10. Legacy allows 02:00:00 sharp.
        assert!(DateTime::new(2024, 3, 10, 2, 0, 0, legacy(LegacyZone::E)).is_ok());
        assert!(DateTime::new(2024, 3, 10, 2, 30, 0, legacy(LegacyZone::E)).is_err());
        // standard-offset zones have no hole
        assert!(DateTime::new(2024, 3, 10, 2, 30, 0, legacy(LegacyZone::ES)).is_ok());
        // modern model rejects the whole hole
        assert!(DateTime::new(2024, 3, 10, 2, 30, 0, modern("E")).is_err());
        assert!(DateTime::new(2024, 3, 10, 3, 30, 0, modern("E")).is_ok());
    }

    #[test]
    fn newfoundland_offsets() {
        // legacy model keeps the shefit bug: ND uses the NS offset
        let ns = DateTime::new(2024, 1, 15, 12, 0, 0, legacy(LegacyZone::NS)).unwrap();
        let nd = DateTime::new(2024, 1, 15, 12, 0, 0, legacy(LegacyZone::ND)).unwrap();
        assert_eq!(
            ns.to_utc().unwrap().minute(),
            30,
        );
        assert_eq!(ns.to_utc().unwrap(), nd.to_utc().unwrap());

        // modern model distinguishes them
        let ns = DateTime::new(2024, 1, 15, 12, 0, 0, modern("NS")).unwrap();
        let nd = DateTime::new(2024, 1, 15, 12, 0, 0, modern("ND")).unwrap();
        assert_ne!(ns.to_utc().unwrap(), nd.to_utc().unwrap());
    }
}
