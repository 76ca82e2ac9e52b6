/// Conversion of raw history samples into numeric, zone-shifted readings
use chrono::{Offset, TimeZone};
use chrono_tz::Tz;
use log::warn;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::NormalizeError;
use crate::models::{AttrValue, Attribute, NormalizedSample, RawSample};

// Unit suffixes the sensors append to textual readings
const UNIT_SUFFIXES: [&str; 2] = ["%", "°C"];

/// Turn an `attrValue` into a float
///
/// Text has surrounding whitespace and one trailing `%` or `°C` removed before
/// parsing. Numbers pass through unchanged, so normalizing an already
/// normalized value is a no-op.
pub fn normalize_value(raw: &AttrValue) -> Result<f64, NormalizeError> {
    match raw {
        AttrValue::Number(value) => Ok(*value),
        AttrValue::Text(text) => {
            let mut trimmed = text.trim();
            for suffix in UNIT_SUFFIXES {
                if let Some(stripped) = trimmed.strip_suffix(suffix) {
                    trimmed = stripped.trim_end();
                    break;
                }
            }
            trimmed.parse::<f64>().map_err(|_| NormalizeError::ValueParse {
                raw: text.clone(),
            })
        }
    }
}

/// Parse a `recvTime` string as a UTC instant
///
/// Accepts `2024-01-01T12:00:00.123Z` and `2024-01-01T12:00:00Z`: the `T` and
/// `Z` delimiters are rewritten to the space-separated form, then the
/// fractional format is tried before the whole-second one.
pub fn parse_utc_timestamp(raw: &str) -> Result<OffsetDateTime, NormalizeError> {
    // Leading zeros are optional on every field after the year
    let with_fraction = format_description!(
        "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute padding:none]:[second padding:none].[subsecond]"
    );
    let whole_seconds = format_description!(
        "[year]-[month padding:none]-[day padding:none] [hour padding:none]:[minute padding:none]:[second padding:none]"
    );

    let cleaned = raw.trim().replace('T', " ").replace('Z', "");
    PrimitiveDateTime::parse(&cleaned, with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(&cleaned, whole_seconds))
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| NormalizeError::TimestampParse {
            raw: raw.to_string(),
        })
}

/// Express a UTC instant in `zone`, using the offset in force at that instant
pub fn to_zone(utc: OffsetDateTime, zone: Tz) -> Option<OffsetDateTime> {
    let local = zone
        .timestamp_opt(utc.unix_timestamp(), utc.nanosecond())
        .single()?;
    let offset = UtcOffset::from_whole_seconds(local.offset().fix().local_minus_utc()).ok()?;
    Some(utc.to_offset(offset))
}

/// Normalizer bound to the configured display zone
#[derive(Debug, Clone, Copy)]
pub struct SampleNormalizer {
    zone: Tz,
}

impl SampleNormalizer {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn normalize_timestamp(&self, raw: &str) -> Result<OffsetDateTime, NormalizeError> {
        let utc = parse_utc_timestamp(raw)?;
        to_zone(utc, self.zone).ok_or_else(|| NormalizeError::ZoneConversion {
            raw: raw.to_string(),
        })
    }

    pub fn normalize(&self, sample: &RawSample) -> Result<NormalizedSample, NormalizeError> {
        Ok(NormalizedSample {
            timestamp: self.normalize_timestamp(&sample.recv_time)?,
            value: normalize_value(&sample.attr_value)?,
        })
    }

    /// Normalize every sample of one attribute, keeping fetch order
    ///
    /// Malformed samples are logged and left out. Returns the surviving
    /// samples and the number dropped.
    pub fn normalize_all(
        &self,
        attribute: Attribute,
        samples: &[RawSample],
    ) -> (Vec<NormalizedSample>, usize) {
        let mut normalized = Vec::with_capacity(samples.len());
        let mut dropped = 0;

        for sample in samples {
            match self.normalize(sample) {
                Ok(n) => normalized.push(n),
                Err(e) => {
                    warn!("Dropping {} sample: {}", attribute, e);
                    dropped += 1;
                }
            }
        }

        (normalized, dropped)
    }
}
