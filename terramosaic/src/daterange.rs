//! Date ranges and meteorological seasons
//!
//! Catalog queries are expressed as half-open calendar intervals. Seasons map
//! to fixed month-day windows per year, with winter spanning the year
//! boundary (December of year N through February of year N+1).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while building or parsing date ranges.
#[derive(Debug, Error)]
pub enum DateRangeError {
    /// A year/month/day combination did not form a valid calendar date.
    #[error("Invalid calendar date: {0}-{1:02}-{2:02}")]
    InvalidDate(i32, u32, u32),

    /// A season name was not one of spring/summer/fall/winter.
    #[error("Unknown season: {0}")]
    UnknownSeason(String),
}

/// A meteorological season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// All four seasons, in calendar order starting with spring.
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    /// Fixed (month, day) window for the season. The winter end date falls
    /// in the following year.
    fn window(&self) -> ((u32, u32), (u32, u32)) {
        match self {
            Season::Spring => ((3, 1), (5, 31)),
            Season::Summer => ((6, 1), (8, 31)),
            Season::Fall => ((9, 1), (11, 30)),
            Season::Winter => ((12, 1), (2, 28)),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Season {
    type Err = DateRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" | "autumn" => Ok(Season::Fall),
            "winter" => Ok(Season::Winter),
            other => Err(DateRangeError::UnknownSeason(other.to_string())),
        }
    }
}

/// A half-open interval of calendar dates, formatted for catalog queries as
/// `YYYY-MM-DD/YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a date range from explicit start and end dates.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Builds the date range for one season of one year.
    ///
    /// Winter ranges end in February of `year + 1`.
    pub fn for_season(year: i32, season: Season) -> Result<Self, DateRangeError> {
        let ((start_month, start_day), (end_month, end_day)) = season.window();
        let end_year = if season == Season::Winter { year + 1 } else { year };

        let start = NaiveDate::from_ymd_opt(year, start_month, start_day)
            .ok_or(DateRangeError::InvalidDate(year, start_month, start_day))?;
        let end = NaiveDate::from_ymd_opt(end_year, end_month, end_day)
            .ok_or(DateRangeError::InvalidDate(end_year, end_month, end_day))?;

        Ok(Self { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summer_range_stays_within_year() {
        let range = DateRange::for_season(2021, Season::Summer).unwrap();
        assert_eq!(range.to_string(), "2021-06-01/2021-08-31");
    }

    #[test]
    fn test_winter_range_spans_year_boundary() {
        let range = DateRange::for_season(2021, Season::Winter).unwrap();
        assert_eq!(range.to_string(), "2021-12-01/2022-02-28");
    }

    #[test]
    fn test_season_display_is_lowercase() {
        assert_eq!(Season::Fall.to_string(), "fall");
    }

    #[test]
    fn test_date_range_serializes_through_json() {
        let range = DateRange::for_season(2021, Season::Winter).unwrap();
        let json = serde_json::to_string(&range).unwrap();
        let back: DateRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);
    }

    #[test]
    fn test_season_parse_accepts_autumn_alias() {
        assert_eq!("autumn".parse::<Season>().unwrap(), Season::Fall);
        assert!("monsoon".parse::<Season>().is_err());
    }
}
