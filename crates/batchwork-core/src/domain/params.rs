//! Job parameters: the key/value set that distinguishes job instances.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ports::Clock;

/// A scalar parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobParameter {
    Long(i64),
    String(String),
}

impl fmt::Display for JobParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobParameter::Long(v) => write!(f, "{v}"),
            JobParameter::String(v) => f.write_str(v),
        }
    }
}

/// Ordered parameter map. Two launches with equal parameters address the same
/// job instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters(BTreeMap<String, JobParameter>);

impl JobParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters guaranteed to differ between launches: the current time in
    /// milliseconds (`time`) and a random integer (`random`).
    pub fn fresh(clock: &dyn Clock) -> Self {
        Self::new()
            .with_long("time", clock.now().timestamp_millis())
            .with_string("random", rand::random::<i32>().to_string())
    }

    pub fn with_long(mut self, key: impl Into<String>, value: i64) -> Self {
        self.0.insert(key.into(), JobParameter::Long(value));
        self
    }

    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), JobParameter::String(value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&JobParameter> {
        self.0.get(key)
    }

    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(JobParameter::Long(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(JobParameter::String(v)) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobParameter)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for JobParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[test]
    fn fresh_parameters_carry_time_and_random() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let params = JobParameters::fresh(&FixedClock::new(now));

        assert_eq!(params.get_long("time"), Some(now.timestamp_millis()));
        let random = params.get_string("random").unwrap();
        assert!(random.parse::<i32>().is_ok());
    }

    #[test]
    fn fresh_parameters_differ_even_at_the_same_instant() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        // Collisions of two random i32 values are possible but vanishingly rare;
        // drawing a handful makes a spurious failure practically impossible.
        let distinct: std::collections::HashSet<_> =
            (0..8).map(|_| JobParameters::fresh(&clock)).collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn typed_getters_do_not_cross_types() {
        let params = JobParameters::new().with_long("time", 5).with_string("random", "x");
        assert_eq!(params.get_string("time"), None);
        assert_eq!(params.get_long("random"), None);
        assert_eq!(params.to_string(), "{random=x, time=5}");
    }

    #[test]
    fn serializes_as_plain_map() {
        let params = JobParameters::new().with_long("time", 5).with_string("random", "42");
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"time": 5, "random": "42"}));

        let back: JobParameters = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }
}
