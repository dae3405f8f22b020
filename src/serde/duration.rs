//! (De)serializes a [`Duration`] as a number of seconds.
//!
//! Fractional seconds are accepted so that a timeout can be written as `8` or `2.5`.

use serde::{Deserialize, Deserializer, Serializer, de::Error};
use std::time::Duration;

/// Serializes [`Duration`] as seconds.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if duration.subsec_nanos() == 0 {
        serializer.serialize_u64(duration.as_secs())
    } else {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

/// Deserializes seconds into a [`Duration`].
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super")]
        ttl: Duration,
    }

    #[test]
    fn whole_and_fractional_seconds() {
        let w: Wrapper = serde_yaml::from_str("ttl: 60").unwrap();
        assert_eq!(w.ttl, Duration::from_secs(60));
        assert_eq!(serde_yaml::to_string(&w).unwrap().trim(), "ttl: 60");

        let w: Wrapper = serde_yaml::from_str("ttl: 2.5").unwrap();
        assert_eq!(w.ttl, Duration::from_millis(2500));

        assert!(serde_yaml::from_str::<Wrapper>("ttl: -1").is_err());
    }
}
