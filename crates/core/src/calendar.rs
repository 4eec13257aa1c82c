//! Simulation calendars and date arithmetic.
//!
//! Experiment dates live in strings like `18500101`, `1850-01-01_00:00:00`
//! or `2005-12-31T23:59:59`, and paleoclimate setups routinely use zero or
//! negative years. None of that fits a civil-time library, so the
//! arithmetic is done here directly, parameterised by the calendar kind the
//! model runs on.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Errors from date parsing and attribute projection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("cannot parse a date out of '{0}'")]
    Unparseable(String),

    #[error("unknown date attribute '{0}'")]
    UnknownAttribute(String),
}

/// The calendar kinds supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    /// 365-day years, no leap days.
    NoLeap,
    /// Proleptic Gregorian calendar, extended through year zero and below.
    ProlepticGregorian,
    /// Twelve equal months of the given length.
    EqualMonths(i64),
}

impl Default for Calendar {
    fn default() -> Self {
        Calendar::ProlepticGregorian
    }
}

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

impl Calendar {
    pub fn is_leap_year(&self, year: i64) -> bool {
        match self {
            Calendar::ProlepticGregorian => {
                year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
            }
            _ => false,
        }
    }

    pub fn days_in_year(&self, year: i64) -> i64 {
        match self {
            Calendar::NoLeap => 365,
            Calendar::ProlepticGregorian => 365 + i64::from(self.is_leap_year(year)),
            Calendar::EqualMonths(len) => len * 12,
        }
    }

    pub fn days_in_month(&self, year: i64, month: i64) -> i64 {
        match self {
            Calendar::EqualMonths(len) => *len,
            _ => match month {
                1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
                4 | 6 | 9 | 11 => 30,
                2 => 28 + i64::from(self.is_leap_year(year)),
                _ => 30,
            },
        }
    }

    /// Days in all years before `year`, counted from year zero. Negative
    /// for negative years, so differences of two values give day spans.
    fn days_before_year(&self, year: i64) -> i64 {
        match self {
            Calendar::NoLeap => 365 * year,
            Calendar::EqualMonths(len) => len * 12 * year,
            Calendar::ProlepticGregorian => {
                // Leap days among years 0..year (exclusive), euclidean so
                // that negative years come out right.
                let y = year;
                365 * y + (y + 3).div_euclid(4) - (y + 99).div_euclid(100)
                    + (y + 399).div_euclid(400)
            }
        }
    }
}

/// An offset of whole calendar units, the right-hand side of date math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delta {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Delta {
    pub fn new(years: i64, months: i64, days: i64, hours: i64, minutes: i64, seconds: i64) -> Self {
        Delta { years, months, days, hours, minutes, seconds }
    }

    fn negated(self) -> Self {
        Delta {
            years: -self.years,
            months: -self.months,
            days: -self.days,
            hours: -self.hours,
            minutes: -self.minutes,
            seconds: -self.seconds,
        }
    }
}

/// A simulation date. Remembers the textual layout it was parsed from so
/// that derived dates render the same way.
#[derive(Debug, Clone)]
pub struct Date {
    pub year: i64,
    pub month: i64,
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
    pub second: i64,
    calendar: Calendar,
    form: usize,
    print_hours: bool,
    print_minutes: bool,
    print_seconds: bool,
}

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        self.fields() == other.fields()
    }
}

impl PartialOrd for Date {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.fields().cmp(&other.fields()))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.output())
    }
}

// Layout tables for the numbered forms. Forms are documented on `format`.
const DATE_SEP: [&str; 11] = ["", "-", "-", "-", " ", " ", "", "-", "", "", "/"];
const TIME_SEP: [&str; 11] = ["", ":", ":", ":", " ", ":", ":", "", "", "", ":"];
const DT_SEP: [&str; 11] = ["_", "_", "T", " ", " ", " ", "_", "_", "", "_", " "];

impl Date {
    /// Parse a date string.
    ///
    /// Accepted layouts are compact (`18500101`), dashed (`1850-01-01`),
    /// and either of those followed by a time part separated with `_` or
    /// `T` (`1850-01-01_00:00:00`, `18500101_000000`). Years may be
    /// negative or longer/shorter than four digits.
    pub fn parse(input: &str, calendar: Calendar) -> Result<Date, DateError> {
        let mut print_hours = true;
        let mut print_minutes = true;
        let mut print_seconds = true;

        let has_t = input.contains('T');
        let normalized = input.replace('T', "_");
        let mut time_sep = if has_t { ":" } else { "" };

        let (date_part, time_part) = match normalized.split_once('_') {
            Some((d, t)) => (d.to_string(), t.to_string()),
            None => {
                time_sep = ":";
                (normalized.clone(), String::new())
            }
        };

        // Time: up to three two-digit groups, optionally ':'-separated.
        let mut clock = [0i64; 3];
        let mut time = time_part.as_str();
        for (index, slot) in clock.iter_mut().enumerate() {
            if time.len() >= 2 {
                *slot = time[..2]
                    .parse()
                    .map_err(|_| DateError::Unparseable(input.to_string()))?;
                time = &time[2..];
                if let Some(stripped) = time.strip_prefix(':') {
                    time = stripped;
                    time_sep = ":";
                }
            } else {
                match index {
                    0 => print_hours = false,
                    1 => print_minutes = false,
                    _ => print_seconds = false,
                }
            }
        }

        // Date: strip day and month off the back, the rest is the year.
        let mut date = date_part.as_str();
        let mut date_sep = "";
        let mut day_month = [0i64; 2];
        for slot in day_month.iter_mut() {
            if date.len() < 2 {
                return Err(DateError::Unparseable(input.to_string()));
            }
            *slot = date[date.len() - 2..]
                .parse()
                .map_err(|_| DateError::Unparseable(input.to_string()))?;
            date = &date[..date.len() - 2];
            if let Some(stripped) = date.strip_suffix('-') {
                // A lone '-' left over is a negative-year sign, not a
                // separator.
                if !stripped.is_empty() {
                    date = stripped;
                    date_sep = "-";
                }
            }
        }
        let year: i64 = date
            .parse()
            .map_err(|_| DateError::Unparseable(input.to_string()))?;

        let form = match (date_sep, time_sep) {
            ("-", ":") => {
                if has_t {
                    2
                } else {
                    1
                }
            }
            ("-", "") => 7,
            ("", ":") => 6,
            _ => 9,
        };

        Ok(Date {
            year,
            month: day_month[1],
            day: day_month[0],
            hour: clock[0],
            minute: clock[1],
            second: clock[2],
            calendar,
            form,
            print_hours,
            print_minutes,
            print_seconds,
        })
    }

    /// Build a date from explicit fields, normalising overflow. Renders as
    /// form 1 (`YYYY-MM-DD_HH:MM:SS`).
    pub fn from_fields(fields: [i64; 6], calendar: Calendar) -> Date {
        let mut date = Date {
            year: fields[0],
            month: fields[1],
            day: fields[2],
            hour: fields[3],
            minute: fields[4],
            second: fields[5],
            calendar,
            form: 1,
            print_hours: true,
            print_minutes: true,
            print_seconds: true,
        };
        date.normalise();
        date
    }

    fn fields(&self) -> [i64; 6] {
        [self.year, self.month, self.day, self.hour, self.minute, self.second]
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Read this date as an offset, for compact-offset operands like
    /// `00010000` (one year).
    pub fn as_delta(&self) -> Delta {
        Delta::new(self.year, self.month, self.day, self.hour, self.minute, self.second)
    }

    /// Put overflowed units back where they belong ("70 seconds" becomes
    /// one minute ten).
    fn normalise(&mut self) {
        self.minute += self.second.div_euclid(60);
        self.second = self.second.rem_euclid(60);
        self.hour += self.minute.div_euclid(60);
        self.minute = self.minute.rem_euclid(60);
        self.day += self.hour.div_euclid(24);
        self.hour = self.hour.rem_euclid(24);

        self.year += (self.month - 1).div_euclid(12);
        self.month = (self.month - 1).rem_euclid(12) + 1;

        while self.day > self.calendar.days_in_month(self.year, self.month) {
            self.day -= self.calendar.days_in_month(self.year, self.month);
            self.month += 1;
            if self.month > 12 {
                self.month = 1;
                self.year += 1;
            }
        }
        while self.day <= 0 {
            self.month -= 1;
            if self.month == 0 {
                self.month = 12;
                self.year -= 1;
            }
            self.day += self.calendar.days_in_month(self.year, self.month);
        }
    }

    /// Add an offset, keeping this date's layout for the result.
    pub fn add(&self, delta: Delta) -> Date {
        let mut result = self.clone();
        result.year += delta.years;
        result.month += delta.months;
        result.day += delta.days;
        result.hour += delta.hours;
        result.minute += delta.minutes;
        result.second += delta.seconds;
        result.normalise();
        result
    }

    /// Subtract an offset, keeping this date's layout for the result.
    pub fn sub(&self, delta: Delta) -> Date {
        self.add(delta.negated())
    }

    /// The span `self - other`, as totals per unit (the `days` field is the
    /// whole span in days, `hours` the whole span in hours, and so on).
    pub fn diff(&self, other: &Date) -> Delta {
        let days = self.absolute_day() - other.absolute_day();
        let seconds = days * 86_400 + self.second_of_day() - other.second_of_day();
        let months = (self.year * 12 + self.month) - (other.year * 12 + other.month);
        Delta {
            years: months / 12,
            months,
            days: seconds.div_euclid(86_400),
            hours: seconds.div_euclid(3_600),
            minutes: seconds.div_euclid(60),
            seconds,
        }
    }

    fn absolute_day(&self) -> i64 {
        self.calendar.days_before_year(self.year) + self.day_of_year() - 1
    }

    fn second_of_day(&self) -> i64 {
        self.hour * 3_600 + self.minute * 60 + self.second
    }

    /// Day of the year, counting from 1 on January 1st.
    pub fn day_of_year(&self) -> i64 {
        let mut doy = self.day;
        for month in 1..self.month {
            doy += self.calendar.days_in_month(self.year, month);
        }
        doy
    }

    /// Project a named attribute to its string form. Plain names give the
    /// bare number, `s`-prefixed names the zero-padded variant.
    pub fn attribute(&self, name: &str) -> Result<String, DateError> {
        let value = match name {
            "year" => self.year.to_string(),
            "month" => self.month.to_string(),
            "day" => self.day.to_string(),
            "hour" => self.hour.to_string(),
            "minute" => self.minute.to_string(),
            "second" => self.second.to_string(),
            "day_of_year" | "doy" => self.day_of_year().to_string(),
            "syear" => self.year.to_string(),
            "smonth" => format!("{:02}", self.month),
            "sday" => format!("{:02}", self.day),
            "shour" => format!("{:02}", self.hour),
            "sminute" => format!("{:02}", self.minute),
            "ssecond" => format!("{:02}", self.second),
            "sdoy" => self.day_of_year().to_string(),
            _ => return Err(DateError::UnknownAttribute(name.to_string())),
        };
        Ok(value)
    }

    /// Render in the layout the date was parsed from.
    pub fn output(&self) -> String {
        self.format(self.form)
    }

    /// Render in one of the numbered layouts:
    ///
    /// ```text
    /// 0  18500101_000000 (year padded to 4)
    /// 1  1850-01-01_00:00:00
    /// 2  1850-01-01T00:00:00
    /// 3  1850-01-01 00:00:00
    /// 4  1850 01 01 00 00 00
    /// 5  01 Jan 1850 00:00:00
    /// 6  18500101_00:00:00
    /// 7  1850-01-01_000000
    /// 8  18500101000000
    /// 9  18500101_000000
    /// 10 01/01/1850 00:00:00
    /// ```
    ///
    /// Time groups that were absent from the parsed input are left off.
    pub fn format(&self, form: usize) -> String {
        let form = form.min(10);
        let mut parts = [
            self.year.to_string(),
            format!("{:02}", self.month),
            format!("{:02}", self.day),
            format!("{:02}", self.hour),
            format!("{:02}", self.minute),
            format!("{:02}", self.second),
        ];

        match form {
            0 | 8 => {
                let sign = if self.year < 0 { "-" } else { "" };
                parts[0] = format!("{sign}{:04}", self.year.abs());
            }
            5 => {
                parts.swap(0, 2);
                let month = (self.month - 1).rem_euclid(12) as usize;
                parts[1] = MONTH_NAMES[month].to_string();
            }
            10 => {
                // month/day/year
                let year = parts[0].clone();
                parts[0] = parts[1].clone();
                parts[1] = parts[2].clone();
                parts[2] = year;
            }
            _ => {}
        }

        let mut rendered = [
            parts[0].clone(),
            format!("{}{}", DATE_SEP[form], parts[1]),
            format!("{}{}", DATE_SEP[form], parts[2]),
            format!("{}{}", DT_SEP[form], parts[3]),
            format!("{}{}", TIME_SEP[form], parts[4]),
            format!("{}{}", TIME_SEP[form], parts[5]),
        ];

        if !self.print_seconds {
            rendered[5].clear();
        }
        if !self.print_minutes && rendered[5].is_empty() {
            rendered[4].clear();
        }
        if !self.print_hours && rendered[4].is_empty() {
            rendered[3].clear();
        }

        rendered.concat()
    }
}
