use std::convert::TryInto;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Sub};

use chrono::{Datelike, Timelike};
use serde::{de, ser, Serialize, Deserialize};

/// Duration in seconds as represented in GTFS data, used for transfers.txt
/// # Examples
/// ```rust
/// use search_core::time::Duration;
/// assert_eq!(Duration::seconds(60), Duration::minutes(1));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Duration {
    seconds: i32,
}

impl Duration {
    /// Construct a duration of a number of seconds
    pub fn seconds(seconds: i32) -> Duration {
        Duration { seconds: seconds }
    }

    /// Construct a duration of a number of minutes
    pub fn minutes(minutes: i32) -> Duration {
        Duration {
            seconds: minutes * 60,
        }
    }

    /// Convert to minutes
    pub fn to_mins(&self) -> i32 {
        self.seconds / 60
    }

    /// Convert to seconds
    pub fn to_secs(&self) -> i32 {
        self.seconds
    }
}

impl std::ops::Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration::seconds(-self.seconds)
    }
}

impl std::ops::Add<Duration> for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration::seconds(self.seconds + rhs.seconds)
    }
}

impl std::ops::Sub<Duration> for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration::seconds(self.seconds - rhs.seconds)
    }
}

impl AddAssign<Duration> for Duration {
    /// Add two `duration`s
    #[inline(always)]
    fn add_assign(&mut self, rhs: Duration) {
        self.seconds += rhs.seconds;
    }
}

impl Div<i32> for Duration {
    type Output = Duration;

    /// Add two `duration`s
    #[inline(always)]
    fn div(self, rhs: i32) -> Self::Output {
        Duration::seconds(self.seconds / rhs)
    }
}

/// Implementation of a local time within a day, no attempt to handle leaps, based on time-rs with the following focus:
/// * deserialisation for the formats contained in GTFS data
/// * time can go over 24 hours to enable the continuation of the day's schedule
/// * operations that are needed for this project
/// * second precision
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Time {
    seconds_since_midnight: u32,
}

impl Time {
    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Time {
        Time {
            seconds_since_midnight: (hours * 60 + minutes) * 60 + seconds,
        }
    }

    /// get the clock hour, it can be over 23
    fn hour(self) -> u8 {
        (self.seconds_since_midnight / 60 / 60).try_into().unwrap()
    }

    /// get the minute of the hour
    fn minute(self) -> u8 {
        ((self.seconds_since_midnight / 60) % 60)
            .try_into()
            .unwrap()
    }

    /// get the seconds within the minute
    fn second(self) -> u8 {
        (self.seconds_since_midnight % 60).try_into().unwrap()
    }

    /// This `Time` as a `Duration` since midnight of its service day. May exceed 24h.
    pub fn as_duration(self) -> Duration {
        Duration::seconds(self.seconds_since_midnight as i32)
    }

    /// `Time` folded back into a single 24h clock face, for indexing departures cyclically.
    pub fn mod24(self) -> Time {
        Time {
            seconds_since_midnight: self.seconds_since_midnight % (24 * 60 * 60),
        }
    }

    /// Number of full days past midnight of the service day this offset anchors to.
    pub fn day_offset(self) -> i64 {
        (self.seconds_since_midnight / (24 * 60 * 60)) as i64
    }
}

impl ser::Serialize for Time {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        self.seconds_since_midnight.serialize(serializer)
    }
}

impl<'de> de::Deserialize<'de> for Time {
    fn deserialize<D>(deserializer: D) -> Result<Time, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        de::Deserialize::deserialize(deserializer).map(|seconds_since_midnight| Time {
            seconds_since_midnight,
        })
    }
}

impl Add<Duration> for Time {
    type Output = Time;

    /// Add a duration to a time, never rolls over
    /// # Panics
    /// if the duration is negative enough to roll over to yesterday
    #[inline(always)]
    fn add(self, rhs: Duration) -> Self::Output {
        let time: i64 = self.seconds_since_midnight.into();
        let duration: i64 = rhs.seconds.into();
        Time {
            seconds_since_midnight: (time + duration)
                .try_into()
                .expect("duration not to be negative enough to roll over to yesterday"),
        }
    }
}

impl Sub<Time> for Time {
    type Output = Duration;

    /// Subtract two `Time`s, returning the `Duration` between. This assumes
    /// both `Time`s are in the same calendar day.
    #[inline(always)]
    fn sub(self, rhs: Self) -> Self::Output {
        Duration::seconds(self.seconds_since_midnight as i32 - rhs.seconds_since_midnight as i32)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

/// The calendar date a trip's stop-time offsets are anchored to. Not necessarily the
/// wall-clock date of travel: a trip departing at offset 25:30 is anchored to yesterday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceDay(chrono::NaiveDate);

impl ServiceDay {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> ServiceDay {
        ServiceDay(
            chrono::NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date"),
        )
    }

    pub fn from_naive_date(date: chrono::NaiveDate) -> ServiceDay {
        ServiceDay(date)
    }

    pub fn date(self) -> chrono::NaiveDate {
        self.0
    }

    pub fn weekday(self) -> chrono::Weekday {
        self.0.weekday()
    }

    /// The following service day.
    pub fn succ(self) -> ServiceDay {
        ServiceDay(self.0.succ_opt().expect("date not to overflow"))
    }

    /// The previous service day.
    pub fn pred(self) -> ServiceDay {
        ServiceDay(self.0.pred_opt().expect("date not to underflow"))
    }

    pub fn add_days(self, days: i64) -> ServiceDay {
        ServiceDay(self.0 + chrono::Duration::days(days))
    }
}

impl fmt::Display for ServiceDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// A wall-clock timestamp, the result of anchoring a `Time` offset to a `ServiceDay`.
///
/// This is the quantity the search engine's event queue orders by: unlike `Time`, it
/// is comparable across service days, which is what lets a trip with stop-time offset
/// 25:30 on Monday's service day be recognised as arriving before one at 00:10 whose
/// service day is Tuesday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instant(chrono::NaiveDateTime);

impl Instant {
    /// `service_day + offset`, per the invariant in the data model: `service_day +
    /// departure` gives the wall-clock departure, with `departure div 24h` equal to
    /// the number of full days past midnight of `service_day`.
    pub fn new(service_day: ServiceDay, offset: Time) -> Instant {
        let days = offset.day_offset();
        let time_of_day = offset.mod24();
        let date = service_day.0 + chrono::Duration::days(days);
        let naive_time = chrono::NaiveTime::from_hms_opt(
            time_of_day.hour() as u32,
            time_of_day.minute() as u32,
            time_of_day.second() as u32,
        )
        .expect("time-of-day in range after mod24");
        Instant(chrono::NaiveDateTime::new(date, naive_time))
    }

    /// The calendar date this instant's wall-clock falls on (not necessarily any
    /// trip's service day).
    pub fn date(self) -> ServiceDay {
        ServiceDay(self.0.date())
    }

    /// This instant minus a service-day-anchored offset, e.g. to recover a departure's
    /// service day from its wall-clock time: `service_day = (departure - offset).date()`.
    pub fn minus_duration(self, offset: Duration) -> Instant {
        Instant(self.0 - chrono::Duration::seconds(offset.to_secs() as i64))
    }

    /// The time-of-day component, as seconds since midnight of `self.date()`.
    pub fn time_of_day(self) -> Time {
        let t = self.0.time();
        Time::from_hms(t.hour(), t.minute(), t.second())
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant(self.0 + chrono::Duration::seconds(rhs.to_secs() as i64))
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::seconds((self.0 - rhs.0).num_seconds() as i32)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// # String representations
/// ```rust
/// use search_core::time::Time;
/// let time: Time = "0:00:00".parse().unwrap();
/// let time: Time = "1:00:00".parse().unwrap();
/// let time: Time = "09:00:00".parse().unwrap();
/// let time: Time = "23:59:59".parse().unwrap();
/// let time: Time = "25:00:00".parse().unwrap();
impl std::str::FromStr for Time {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.as_bytes();
        let (hh, mm, ss) = if s.len() == 8 {
            if s[2] != b':' || s[5] != b':' {
                return Err(TimeParseError::InvalidFormat);
            }
            (&s[0..2], &s[3..5], &s[6..8])
        } else if s.len() == 7 {
            if s[1] != b':' || s[4] != b':' {
                return Err(TimeParseError::InvalidFormat);
            }
            (&s[0..1], &s[2..4], &s[5..7])
        } else {
            return Err(TimeParseError::InvalidFormat);
        };
        use std::str::from_utf8;
        let hours: u32 = from_utf8(hh)?.parse()?;
        let minutes: u32 = from_utf8(mm)?.parse()?;
        let seconds: u32 = from_utf8(ss)?.parse()?;
        if seconds > 59 || minutes > 59 {
            Err(TimeParseError::TooManySecondsOrMinutes)?;
        }
        Ok(Time {
            seconds_since_midnight: hours * 60 * 60 + minutes * 60 + seconds,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    InvalidFormat,
    TooManySecondsOrMinutes,
    ParseIntError(std::num::ParseIntError),
}

impl From<std::num::ParseIntError> for TimeParseError {
    fn from(err: std::num::ParseIntError) -> TimeParseError {
        TimeParseError::ParseIntError(err)
    }
}

impl std::convert::From<std::str::Utf8Error> for TimeParseError {
    fn from(_err: std::str::Utf8Error) -> TimeParseError {
        TimeParseError::InvalidFormat
    }
}

impl fmt::Display for TimeParseError {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TimeParseError::*;
        match self {
            InvalidFormat => write!(f, "Time should use format eg. 23:59:59"),
            TooManySecondsOrMinutes => write!(f, "Maximum minutes or seconds is 59"),
            ParseIntError(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for TimeParseError {}
