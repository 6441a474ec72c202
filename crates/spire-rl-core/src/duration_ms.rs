//! Serde adapter writing `Duration` as integer milliseconds
//!
//! ```ignore
//! #[serde(with = "spire_rl_core::duration_ms")]
//! pub poll_interval: Duration,
//! ```

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timing {
        #[serde(with = "super")]
        settle: Duration,
    }

    #[test]
    fn test_millis_encoding() {
        let timing = Timing {
            settle: Duration::from_millis(300),
        };
        let json = serde_json::to_string(&timing).unwrap();
        assert_eq!(json, r#"{"settle":300}"#);

        let parsed: Timing = serde_json::from_str(r#"{"settle":1500}"#).unwrap();
        assert_eq!(parsed.settle, Duration::from_millis(1500));
        assert!(serde_json::from_str::<Timing>(r#"{"settle":-1}"#).is_err());
    }
}
