//! Strongly typed time-bucket identifiers.
//!
//! Keys serialize to the strings `YYYY-MM-DD-HH`, `YYYY-MM-DD` and `YYYY-MM`
//! and order chronologically. All keys are computed in UTC.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A bucket key string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("Malformed bucket key: {}", key)]
pub struct BucketKeyError {
    /// The offending key
    pub key: String,
}

impl BucketKeyError {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
        }
    }
}

/// One calendar hour, formatted `YYYY-MM-DD-HH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HourKey {
    date: NaiveDate,
    hour: u32,
}

impl HourKey {
    /// The hour containing `at`.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            date: at.date_naive(),
            hour: at.hour(),
        }
    }

    /// First instant of the hour.
    pub fn start(&self) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.hour, 0, 0).unwrap_or(NaiveTime::MIN);
        self.date.and_time(time).and_utc()
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.date.format("%Y-%m-%d"), self.hour)
    }
}

impl FromStr for HourKey {
    type Err = BucketKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, hour) = s.rsplit_once('-').ok_or_else(|| BucketKeyError::new(s))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| BucketKeyError::new(s))?;
        let hour: u32 = hour.parse().map_err(|_| BucketKeyError::new(s))?;
        if hour > 23 {
            return Err(BucketKeyError::new(s));
        }
        Ok(Self { date, hour })
    }
}

/// One calendar day, formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// The day containing `at`.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.date_naive())
    }

    /// Midnight at the start of the day.
    pub fn start(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = BucketKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| BucketKeyError::new(s))
    }
}

/// One calendar month, formatted `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// The month containing `at`.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = BucketKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.split_once('-').ok_or_else(|| BucketKeyError::new(s))?;
        let year: i32 = year.parse().map_err(|_| BucketKeyError::new(s))?;
        let month: u32 = month.parse().map_err(|_| BucketKeyError::new(s))?;
        if !(1..=12).contains(&month) {
            return Err(BucketKeyError::new(s));
        }
        Ok(Self { year, month })
    }
}

/// Time-bucketed counters, keyed by a typed bucket identifier.
///
/// Serializes as a JSON object keyed by the bucket strings. Entries whose key
/// does not parse are skipped (and logged) on load instead of failing the
/// whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets<K, V>(BTreeMap<K, V>);

impl<K, V> Default for Buckets<K, V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<K: Ord, V> Buckets<K, V> {
    /// Counters for `key`, if any calls were recorded in that bucket.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.0.get(key)
    }

    /// Counters for `key`, created empty on first use.
    pub fn entry(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.0.entry(key).or_default()
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no buckets.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Buckets in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.0.iter()
    }

    /// Remove buckets for which `keep` returns false; returns how many were removed.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) -> usize {
        let before = self.0.len();
        self.0.retain(|key, _| keep(key));
        before - self.0.len()
    }
}

impl<K: fmt::Display, V: Serialize> Serialize for Buckets<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(key, value)| (key.to_string(), value)))
    }
}

impl<'de, K, V> Deserialize<'de> for Buckets<K, V>
where
    K: Ord + FromStr<Err = BucketKeyError>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, V>::deserialize(deserializer)?;
        let mut buckets = BTreeMap::new();
        for (key, value) in raw {
            match key.parse::<K>() {
                Ok(parsed) => {
                    buckets.insert(parsed, value);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping usage bucket"),
            }
        }
        Ok(Self(buckets))
    }
}
