use serde::Deserialize;
use std::fmt;
use time::OffsetDateTime;

/// Sensor measurement streams published by the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Luminosity,
    Humidity,
    Temperature,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [
        Attribute::Luminosity,
        Attribute::Humidity,
        Attribute::Temperature,
    ];

    /// Attribute name as used in history service paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Luminosity => "luminosity",
            Attribute::Humidity => "humidity",
            Attribute::Temperature => "temperature",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `attrValue` arrives either as a JSON number or as text such as `"23.5°C"`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(n) => write!(f, "{}", n),
            AttrValue::Text(s) => f.write_str(s),
        }
    }
}

/// One timestamped reading of one attribute, as returned by the history service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSample {
    #[serde(rename = "attrValue")]
    pub attr_value: AttrValue,
    #[serde(rename = "recvTime")]
    pub recv_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedSample {
    pub timestamp: OffsetDateTime,
    pub value: f64,
}

/// Accumulated series shown on the dashboard.
///
/// Index `i` of every sequence refers to the same observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub timestamps: Vec<OffsetDateTime>,
    pub luminosity: Vec<f64>,
    pub humidity: Vec<f64>,
    pub temperature: Vec<f64>,
}

/// Last complete row of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: OffsetDateTime,
    pub luminosity: f64,
    pub humidity: f64,
    pub temperature: f64,
}

impl Series {
    /// Number of points on the time axis
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// True when all four sequences have the same length
    pub fn is_aligned(&self) -> bool {
        let len = self.timestamps.len();
        self.luminosity.len() == len && self.humidity.len() == len && self.temperature.len() == len
    }

    /// Most recent row present in all four sequences
    pub fn latest(&self) -> Option<Reading> {
        let rows = self
            .timestamps
            .len()
            .min(self.luminosity.len())
            .min(self.humidity.len())
            .min(self.temperature.len());
        let i = rows.checked_sub(1)?;
        Some(Reading {
            timestamp: self.timestamps[i],
            luminosity: self.luminosity[i],
            humidity: self.humidity[i],
            temperature: self.temperature[i],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn raw_sample_accepts_text_and_numeric_values() {
        let text: RawSample = serde_json::from_str(
            r#"{"_id":"a","attrType":"Number","attrValue":"60%","recvTime":"2024-01-01T12:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(text.attr_value, AttrValue::Text("60%".into()));

        let number: RawSample =
            serde_json::from_str(r#"{"attrValue":412,"recvTime":"2024-01-01T12:00:00Z"}"#).unwrap();
        assert_eq!(number.attr_value, AttrValue::Number(412.0));
        assert_eq!(number.recv_time, "2024-01-01T12:00:00Z");
    }

    #[test]
    fn latest_uses_shortest_sequence() {
        let series = Series {
            timestamps: vec![
                datetime!(2024-01-01 09:00 -3),
                datetime!(2024-01-01 09:01 -3),
            ],
            luminosity: vec![1.0, 2.0],
            humidity: vec![50.0],
            temperature: vec![20.0, 21.0],
        };
        assert!(!series.is_aligned());
        let latest = series.latest().unwrap();
        assert_eq!(latest.luminosity, 1.0);
        assert_eq!(latest.humidity, 50.0);

        assert!(Series::default().latest().is_none());
        assert!(Series::default().is_aligned());
    }
}
