//! Resampling frequencies.
//!
//! Every date belongs to exactly one period, identified by the period's last
//! calendar day. Resampling works on the calendar of period ends spanning the
//! data, so the final (possibly partial) period is always included.

use crate::{Error, Result};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling frequency, parsed from the usual short codes (`B`, `W-WED`, `ME`, `QE`, `YE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Frequency {
    /// Weekdays; weekend dates roll into the following Monday.
    Business,
    /// Weeks ending on the given weekday.
    Weekly(Weekday),
    /// Calendar months.
    Monthly,
    /// Calendar quarters.
    Quarterly,
    /// Calendar years.
    Annual,
}

impl Frequency {
    /// Last calendar day of the period containing `date`.
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Business => match date.weekday() {
                Weekday::Sat => date + Days::new(2),
                Weekday::Sun => date + Days::new(1),
                _ => date,
            },
            Frequency::Weekly(anchor) => {
                let ahead = (7 + anchor.num_days_from_monday()
                    - date.weekday().num_days_from_monday())
                    % 7;
                date + Days::new(u64::from(ahead))
            }
            Frequency::Monthly => month_end(date.year(), date.month()),
            Frequency::Quarterly => {
                let quarter_month = ((date.month() - 1) / 3 + 1) * 3;
                month_end(date.year(), quarter_month)
            }
            Frequency::Annual => month_end(date.year(), 12),
        }
    }

    /// Period ends covering `first..=last`, in order.
    pub fn calendar(self, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        let stop = self.period_end(last);
        let mut ends = Vec::new();
        let mut current = self.period_end(first);
        while current <= stop {
            ends.push(current);
            match current.succ_opt() {
                Some(next) => current = self.period_end(next),
                None => break,
            }
        }
        ends
    }

    /// The short code for this frequency.
    pub fn code(self) -> String {
        match self {
            Frequency::Business => "B".to_string(),
            Frequency::Weekly(day) => format!("W-{}", weekday_code(day)),
            Frequency::Monthly => "ME".to_string(),
            Frequency::Quarterly => "QE".to_string(),
            Frequency::Annual => "YE".to_string(),
        }
    }
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MON",
        Weekday::Tue => "TUE",
        Weekday::Wed => "WED",
        Weekday::Thu => "THU",
        Weekday::Fri => "FRI",
        Weekday::Sat => "SAT",
        Weekday::Sun => "SUN",
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim().to_uppercase();
        let freq = match code.as_str() {
            "B" | "D" => Frequency::Business,
            "W" => Frequency::Weekly(Weekday::Sun),
            "ME" | "M" => Frequency::Monthly,
            "QE" | "Q" => Frequency::Quarterly,
            "YE" | "Y" | "A" => Frequency::Annual,
            _ => match code.strip_prefix("W-") {
                Some(day) => Frequency::Weekly(
                    day.parse::<Weekday>()
                        .map_err(|_| Error::NotImplemented(format!("frequency {s}")))?,
                ),
                None => return Err(Error::NotImplemented(format!("frequency {s}"))),
            },
        };
        Ok(freq)
    }
}

impl TryFrom<String> for Frequency {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.code()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!("B".parse::<Frequency>().unwrap(), Frequency::Business);
        assert_eq!(
            "W-WED".parse::<Frequency>().unwrap(),
            Frequency::Weekly(Weekday::Wed)
        );
        assert_eq!("me".parse::<Frequency>().unwrap(), Frequency::Monthly);
        assert_eq!("QE".parse::<Frequency>().unwrap(), Frequency::Quarterly);
        assert_eq!("YE".parse::<Frequency>().unwrap(), Frequency::Annual);
        assert!(matches!(
            "H".parse::<Frequency>(),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn test_code_round_trip() {
        for code in ["B", "W-WED", "W-SUN", "ME", "QE", "YE"] {
            let freq: Frequency = code.parse().unwrap();
            assert_eq!(freq.code(), code);
        }
    }

    #[test]
    fn test_period_end() {
        // 2024-01-06 is a Saturday
        assert_eq!(
            Frequency::Business.period_end(date(2024, 1, 6)),
            date(2024, 1, 8)
        );
        assert_eq!(
            Frequency::Weekly(Weekday::Wed).period_end(date(2024, 1, 4)),
            date(2024, 1, 10)
        );
        assert_eq!(
            Frequency::Weekly(Weekday::Wed).period_end(date(2024, 1, 10)),
            date(2024, 1, 10)
        );
        assert_eq!(
            Frequency::Monthly.period_end(date(2024, 2, 10)),
            date(2024, 2, 29)
        );
        assert_eq!(
            Frequency::Quarterly.period_end(date(2024, 11, 3)),
            date(2024, 12, 31)
        );
        assert_eq!(
            Frequency::Annual.period_end(date(2023, 3, 1)),
            date(2023, 12, 31)
        );
    }

    #[test]
    fn test_calendar_covers_partial_last_period() {
        let ends = Frequency::Monthly.calendar(date(2024, 1, 15), date(2024, 3, 2));
        assert_eq!(
            ends,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31)]
        );
    }

    #[test]
    fn test_serde_as_code() {
        let json = serde_json::to_string(&Frequency::Weekly(Weekday::Wed)).unwrap();
        assert_eq!(json, "\"W-WED\"");
        let parsed: Frequency = serde_json::from_str("\"ME\"").unwrap();
        assert_eq!(parsed, Frequency::Monthly);
    }
}
