//! The forecasting time axis.
//!
//! Consumption data only carries a month and a week-of-month, never a full
//! calendar date, so periods are modelled as ordinals on a frequency-specific
//! axis:
//!
//! - Monthly: `year * 12 + (month - 1)`
//! - Weekly: `monthly_ordinal * WEEKS_PER_MONTH + (week - 1)`
//!
//! The successor of a period is always `ordinal + 1`, which keeps forecast
//! horizons strictly extending the observed axis.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};

/// Week-of-month slots per month on the weekly axis.
pub const WEEKS_PER_MONTH: u32 = 5;

/// Time bucket granularity for a forecast run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(alias = "W", alias = "weekly")]
    Weekly,
    #[serde(alias = "M", alias = "monthly")]
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "w" => Ok(Frequency::Weekly),
            "monthly" | "m" => Ok(Frequency::Monthly),
            other => Err(DomainError::validation(format!(
                "frequency must be one of Weekly, Monthly (or W, M); got '{other}'"
            ))),
        }
    }
}

/// A calendar month as found in the input. Year-less inputs are placed on a
/// single school year (see [`MonthKey::parse`]).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

const MONTH_NAMES: [(&str, u32); 36] = [
    ("gennaio", 1),
    ("febbraio", 2),
    ("marzo", 3),
    ("aprile", 4),
    ("maggio", 5),
    ("giugno", 6),
    ("luglio", 7),
    ("agosto", 8),
    ("settembre", 9),
    ("ottobre", 10),
    ("novembre", 11),
    ("dicembre", 12),
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    // Three-letter Italian abbreviations that differ from the English ones.
    ("gen", 1),
    ("mag", 5),
    ("giu", 6),
    ("lug", 7),
    ("ago", 8),
    ("set", 9),
    ("ott", 10),
    ("dic", 12),
    ("jan", 1),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
];

/// First month of a school year, for months given without a year.
const SCHOOL_YEAR_START: u32 = 9;

impl MonthKey {
    pub fn new(year: i32, month: u32) -> DomainResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(DomainError::validation(format!("month out of range: {month}")));
        }
        Ok(Self { year, month })
    }

    /// Parse the month column of an input row.
    ///
    /// Accepts `YYYY-MM`, `YYYY-MM-DD`, a bare month number, or an Italian or
    /// English month name (full, or three-letter abbreviation).
    ///
    /// Months without a year are placed on one school year: September to
    /// December in year 0, January to August in year 1. Data spanning more
    /// than one school year needs explicit `YYYY-MM` months.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(DomainError::validation("month is empty"));
        }

        if s.contains('-') {
            let parts: Vec<&str> = s.split('-').collect();
            if parts.len() < 2 || parts.len() > 3 || parts[0].len() != 4 {
                return Err(DomainError::invalid_period(format!("unrecognized month '{s}'")));
            }
            let year: i32 = parts[0]
                .parse()
                .map_err(|_| DomainError::invalid_period(format!("unrecognized month '{s}'")))?;
            let month: u32 = parts[1]
                .parse()
                .map_err(|_| DomainError::invalid_period(format!("unrecognized month '{s}'")))?;
            if let Some(day) = parts.get(2) {
                day.parse::<u32>()
                    .map_err(|_| DomainError::invalid_period(format!("unrecognized month '{s}'")))?;
            }
            return Self::new(year, month);
        }

        if s.chars().all(|c| c.is_ascii_digit()) {
            let month: u32 = s
                .parse()
                .map_err(|_| DomainError::invalid_period(format!("unrecognized month '{s}'")))?;
            return Self::school_year(month);
        }

        let lower = s.to_lowercase();
        MONTH_NAMES
            .iter()
            .find(|(name, _)| *name == lower)
            .or_else(|| {
                // "feb", "mar", "oct", ...: prefix of a full name.
                (lower.chars().count() == 3).then(|| {
                    MONTH_NAMES
                        .iter()
                        .find(|(name, _)| name.len() > 3 && name.starts_with(&lower))
                })?
            })
            .ok_or_else(|| DomainError::invalid_period(format!("unrecognized month '{s}'")))
            .and_then(|(_, m)| Self::school_year(*m))
    }

    fn school_year(month: u32) -> DomainResult<Self> {
        let year = if month >= SCHOOL_YEAR_START { 0 } else { 1 };
        Self::new(year, month)
    }

    pub fn ordinal(&self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }
}

/// Parse the week column of an input row (`"2"`, `"W2"`, `"Settimana 2"`).
pub fn parse_week(raw: &str) -> DomainResult<u32> {
    let digits = raw.trim().trim_start_matches(|c: char| !c.is_ascii_digit());
    let week: u32 = digits
        .trim()
        .parse()
        .map_err(|_| DomainError::invalid_period(format!("unrecognized week '{}'", raw.trim())))?;
    if !(1..=WEEKS_PER_MONTH).contains(&week) {
        return Err(DomainError::validation(format!(
            "week must be within 1..={WEEKS_PER_MONTH}; got {week}"
        )));
    }
    Ok(week)
}

/// A point on the forecasting axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    frequency: Frequency,
    ordinal: i64,
}

impl Period {
    pub fn monthly(month: MonthKey) -> Self {
        Self {
            frequency: Frequency::Monthly,
            ordinal: month.ordinal(),
        }
    }

    pub fn weekly(month: MonthKey, week: u32) -> DomainResult<Self> {
        if !(1..=WEEKS_PER_MONTH).contains(&week) {
            return Err(DomainError::validation(format!(
                "week must be within 1..={WEEKS_PER_MONTH}; got {week}"
            )));
        }
        Ok(Self {
            frequency: Frequency::Weekly,
            ordinal: month.ordinal() * i64::from(WEEKS_PER_MONTH) + i64::from(week) - 1,
        })
    }

    /// Bucket a (month, week) pair at the given frequency.
    pub fn bucket(frequency: Frequency, month: MonthKey, week: u32) -> DomainResult<Self> {
        match frequency {
            Frequency::Weekly => Self::weekly(month, week),
            Frequency::Monthly => Ok(Self::monthly(month)),
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn ordinal(&self) -> i64 {
        self.ordinal
    }

    /// The period `steps` buckets after this one.
    pub fn offset(&self, steps: i64) -> Self {
        Self {
            frequency: self.frequency,
            ordinal: self.ordinal + steps,
        }
    }

    pub fn next(&self) -> Self {
        self.offset(1)
    }

    pub fn label(&self) -> String {
        match self.frequency {
            Frequency::Monthly => {
                let m = MonthKey::from_ordinal(self.ordinal);
                format!("{:04}-{:02}", m.year, m.month)
            }
            Frequency::Weekly => {
                let per = i64::from(WEEKS_PER_MONTH);
                let m = MonthKey::from_ordinal(self.ordinal.div_euclid(per));
                let week = self.ordinal.rem_euclid(per) + 1;
                format!("{:04}-{:02}-W{}", m.year, m.month, week)
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Period {
    type Err = DomainError;

    /// Parse a label produced by [`Period::label`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::invalid_period(format!("invalid period label '{s}'"));
        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            [year, month] => {
                let m = MonthKey::new(year.parse().map_err(|_| invalid())?, month.parse().map_err(|_| invalid())?)?;
                Ok(Self::monthly(m))
            }
            [year, month, week] => {
                let week = week.strip_prefix('W').ok_or_else(invalid)?;
                let m = MonthKey::new(year.parse().map_err(|_| invalid())?, month.parse().map_err(|_| invalid())?)?;
                Self::weekly(m, week.parse().map_err(|_| invalid())?)
            }
            _ => Err(invalid()),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
