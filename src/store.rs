/// Accumulated series and the policies that merge each cycle into it
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::error::MergeSkipped;
use crate::models::{Attribute, NormalizedSample, Series};

/// How a cycle's samples are folded into the stored series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Overwrite with the latest window, time axis sorted ascending
    ReplaceSorted,
    /// Grow the series with every complete cycle, in arrival order
    AppendOnly,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "replace-sorted" => Ok(MergePolicy::ReplaceSorted),
            "append-only" => Ok(MergePolicy::AppendOnly),
            other => Err(format!(
                "unknown merge policy '{}' (expected replace-sorted or append-only)",
                other
            )),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergePolicy::ReplaceSorted => "replace-sorted",
            MergePolicy::AppendOnly => "append-only",
        })
    }
}

/// Normalized samples of one cycle, each attribute in fetch order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub luminosity: Vec<NormalizedSample>,
    pub humidity: Vec<NormalizedSample>,
    pub temperature: Vec<NormalizedSample>,
}

impl Batch {
    pub fn samples(&self, attribute: Attribute) -> &[NormalizedSample] {
        match attribute {
            Attribute::Luminosity => &self.luminosity,
            Attribute::Humidity => &self.humidity,
            Attribute::Temperature => &self.temperature,
        }
    }

    pub fn samples_mut(&mut self, attribute: Attribute) -> &mut Vec<NormalizedSample> {
        match attribute {
            Attribute::Luminosity => &mut self.luminosity,
            Attribute::Humidity => &mut self.humidity,
            Attribute::Temperature => &mut self.temperature,
        }
    }

    pub fn is_empty(&self) -> bool {
        Attribute::ALL.iter().all(|a| self.samples(*a).is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// These sequences were overwritten
    Replaced(Vec<Attribute>),
    /// This many rows were appended
    Appended(usize),
    /// Nothing to merge
    Unchanged,
}

/// Single-writer store publishing immutable snapshots of the series
///
/// Readers either take a [`snapshot`](SeriesStore::snapshot) or
/// [`subscribe`](SeriesStore::subscribe) to be woken once per merge that
/// changed the series.
pub struct SeriesStore {
    tx: watch::Sender<Arc<Series>>,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Series::default()));
        Self { tx }
    }

    pub fn snapshot(&self) -> Arc<Series> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Series>> {
        self.tx.subscribe()
    }

    /// Fold a cycle's batch into the series according to `policy`
    ///
    /// Either the whole batch lands or nothing does. Subscribers are only
    /// notified when the series changed.
    pub fn merge(&self, policy: MergePolicy, batch: &Batch) -> Result<MergeOutcome, MergeSkipped> {
        if batch.is_empty() && policy == MergePolicy::ReplaceSorted {
            return Ok(MergeOutcome::Unchanged);
        }
        if policy == MergePolicy::AppendOnly {
            check_appendable(batch)?;
        }

        // Single writer: nothing else replaces the value between snapshot and send,
        // and readers only contend with the pointer swap below.
        let mut next = (*self.snapshot()).clone();
        let outcome = match policy {
            MergePolicy::ReplaceSorted => MergeOutcome::Replaced(replace_sorted(&mut next, batch)),
            MergePolicy::AppendOnly => MergeOutcome::Appended(append_only(&mut next, batch)),
        };
        self.tx.send_replace(Arc::new(next));

        Ok(outcome)
    }
}

/// Overwrite the series with this cycle's window
///
/// Luminosity samples are sorted by time and define the time axis. Humidity
/// and temperature keep the order the service returned them in and are
/// stored positionally, so they only line up with the time axis when the
/// three attributes were sampled together. Attributes without samples keep
/// their previous contents.
fn replace_sorted(series: &mut Series, batch: &Batch) -> Vec<Attribute> {
    let mut replaced = Vec::new();

    if !batch.luminosity.is_empty() {
        let mut pairs: Vec<(OffsetDateTime, f64)> = batch
            .luminosity
            .iter()
            .map(|s| (s.timestamp, s.value))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        series.timestamps = pairs.iter().map(|(t, _)| *t).collect();
        series.luminosity = pairs.iter().map(|(_, v)| *v).collect();
        replaced.push(Attribute::Luminosity);
    }

    if !batch.humidity.is_empty() {
        series.humidity = batch.humidity.iter().map(|s| s.value).collect();
        replaced.push(Attribute::Humidity);
    }

    if !batch.temperature.is_empty() {
        series.temperature = batch.temperature.iter().map(|s| s.value).collect();
        replaced.push(Attribute::Temperature);
    }

    replaced
}

fn check_appendable(batch: &Batch) -> Result<(), MergeSkipped> {
    if let Some(missing) = Attribute::ALL
        .iter()
        .find(|a| batch.samples(**a).is_empty())
    {
        return Err(MergeSkipped::MissingAttribute(*missing));
    }

    let (luminosity, humidity, temperature) = (
        batch.luminosity.len(),
        batch.humidity.len(),
        batch.temperature.len(),
    );
    if luminosity != humidity || luminosity != temperature {
        return Err(MergeSkipped::LengthMismatch {
            luminosity,
            humidity,
            temperature,
        });
    }

    Ok(())
}

/// Append a complete batch in arrival order, using luminosity times as the axis
fn append_only(series: &mut Series, batch: &Batch) -> usize {
    series
        .timestamps
        .extend(batch.luminosity.iter().map(|s| s.timestamp));
    series
        .luminosity
        .extend(batch.luminosity.iter().map(|s| s.value));
    series.humidity.extend(batch.humidity.iter().map(|s| s.value));
    series
        .temperature
        .extend(batch.temperature.iter().map(|s| s.value));

    batch.luminosity.len()
}
