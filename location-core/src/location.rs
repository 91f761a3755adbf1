use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, specta::Type)]
#[serde(rename_all = "camelCase")]
/// A single reading from the native location provider
pub struct Location {
    /// When the reading was taken, sent over the bridge as milliseconds since the epoch
    #[serde(
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    #[specta(type = f64)]
    pub timestamp: UtcDT,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    pub altitude_accuracy: f64,
    /// Bearing in degrees
    pub course: f64,
    /// Meters per second
    pub speed: f64,
    /// (Android)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_accuracy: Option<f64>,
    /// (Android)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_accuracy: Option<f64>,
    /// (Android) Whether the reading came from a mock provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_mock_provider: Option<bool>,
    /// (iOS) Floor of the building the device is in, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
}

// Native layers send fractional milliseconds as a double
fn serialize_millis<S>(time: &UtcDT, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_f64(time.timestamp_micros() as f64 / 1000.0)
}

fn deserialize_millis<'de, D>(d: D) -> Result<UtcDT, D::Error>
where
    D: Deserializer<'de>,
{
    let millis: f64 = Deserialize::deserialize(d)?;
    if !millis.is_finite() {
        return Err(D::Error::custom(format!("invalid timestamp {millis}")));
    }
    DateTime::from_timestamp_micros((millis * 1000.0).round() as i64)
        .ok_or_else(|| D::Error::custom(format!("timestamp {millis} is out of range")))
}

impl Location {
    /// Pick the most recent reading out of a batch, later entries win ties.
    pub fn latest(batch: &[Location]) -> Option<&Location> {
        batch.iter().reduce(|best, loc| {
            if loc.timestamp >= best.timestamp {
                loc
            } else {
                best
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, specta::Type)]
/// Compass heading in degrees
pub struct Heading {
    pub heading: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64, latitude: f64) -> Location {
        Location {
            timestamp: Utc.timestamp_millis_opt(ms).unwrap(),
            latitude,
            longitude: 0.0,
            altitude: 0.0,
            accuracy: 5.0,
            altitude_accuracy: 0.0,
            course: 0.0,
            speed: 0.0,
            course_accuracy: None,
            speed_accuracy: None,
            from_mock_provider: None,
            floor: None,
        }
    }

    #[test]
    fn latest_picks_greatest_timestamp() {
        let batch = vec![at(300, 1.0), at(100, 2.0), at(200, 3.0)];
        assert_eq!(Location::latest(&batch).map(|l| l.latitude), Some(1.0));
    }

    #[test]
    fn latest_ties_go_to_last() {
        let batch = vec![at(100, 1.0), at(100, 2.0)];
        assert_eq!(Location::latest(&batch).map(|l| l.latitude), Some(2.0));
        assert!(Location::latest(&[]).is_none());
    }

    #[test]
    fn wire_shape_is_camel_case_millis() {
        let json = serde_json::to_value(at(1_500, 10.0)).unwrap();
        assert_eq!(json["timestamp"], 1500.0);
        assert_eq!(json["altitudeAccuracy"], 0.0);
        assert!(json.get("floor").is_none());

        let back: Location = serde_json::from_value(json).unwrap();
        assert_eq!(back, at(1_500, 10.0));
    }

    #[test]
    fn decodes_native_double_timestamps() {
        let mut json = serde_json::to_value(at(0, 10.0)).unwrap();

        json["timestamp"] = serde_json::json!(1500.0);
        let loc: Location = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(loc.timestamp.timestamp_millis(), 1500);

        json["timestamp"] = serde_json::json!(1500.25);
        let loc: Location = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(loc.timestamp.timestamp_micros(), 1_500_250);
        assert_eq!(serde_json::to_value(&loc).unwrap()["timestamp"], 1500.25);

        // Integer millis still decode
        json["timestamp"] = serde_json::json!(1500);
        let loc: Location = serde_json::from_value(json).unwrap();
        assert_eq!(loc, at(1_500, 10.0));
    }
}
