/// Error types for the fetch-normalize-merge pipeline.
///
/// None of these stop the service: fetch errors turn into "no data" for one
/// attribute, normalization errors drop one sample and merge skips leave the
/// series untouched for one cycle.
use thiserror::Error;

use crate::models::Attribute;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid history URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("response body is not JSON: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("no values array in response for {attribute}")]
    MissingValues { attribute: Attribute },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("value {raw:?} is not a number")]
    ValueParse { raw: String },

    #[error("timestamp {raw:?} matches no known format")]
    TimestampParse { raw: String },

    #[error("timestamp {raw:?} cannot be shifted to the display zone")]
    ZoneConversion { raw: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeSkipped {
    #[error("no usable {0} samples this cycle")]
    MissingAttribute(Attribute),

    #[error(
        "sample counts differ (luminosity={luminosity}, humidity={humidity}, temperature={temperature})"
    )]
    LengthMismatch {
        luminosity: usize,
        humidity: usize,
        temperature: usize,
    },
}
