/// Timer-driven fetch, normalize and merge cycles
use futures_util::future::join3;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};

use crate::error::MergeSkipped;
use crate::history::HistorySource;
use crate::models::Attribute;
use crate::normalize::SampleNormalizer;
use crate::store::{Batch, MergeOutcome, MergePolicy, SeriesStore};

/// Sample counts for one attribute in one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeReport {
    pub fetched: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub luminosity: AttributeReport,
    pub humidity: AttributeReport,
    pub temperature: AttributeReport,
    pub merge: Result<MergeOutcome, MergeSkipped>,
}

impl CycleReport {
    /// Whether the series changed, i.e. readers were notified
    pub fn changed(&self) -> bool {
        !matches!(self.merge, Ok(MergeOutcome::Unchanged) | Err(_))
    }

    fn attribute_mut(&mut self, attribute: Attribute) -> &mut AttributeReport {
        match attribute {
            Attribute::Luminosity => &mut self.luminosity,
            Attribute::Humidity => &mut self.humidity,
            Attribute::Temperature => &mut self.temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// A cycle was already in flight; this tick was dropped
    Busy,
}

// Flips the poller back to idle however the cycle ends
struct IdleOnDrop<'a>(&'a AtomicBool);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Poller<S> {
    source: S,
    normalizer: SampleNormalizer,
    store: Arc<SeriesStore>,
    policy: MergePolicy,
    last_n: u32,
    polling: AtomicBool,
}

impl<S: HistorySource> Poller<S> {
    pub fn new(
        source: S,
        normalizer: SampleNormalizer,
        store: Arc<SeriesStore>,
        policy: MergePolicy,
        last_n: u32,
    ) -> Self {
        Self {
            source,
            normalizer,
            store,
            policy,
            last_n,
            polling: AtomicBool::new(false),
        }
    }

    /// Run one cycle: fetch all attributes, normalize, merge
    ///
    /// Never fails. Missing data and malformed samples only shrink what gets
    /// merged. A call made while another cycle is in flight returns
    /// [`CycleOutcome::Busy`] without touching the service.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous cycle still in flight, dropping tick");
            return CycleOutcome::Busy;
        }
        let _idle = IdleOnDrop(&self.polling);

        let (luminosity, humidity, temperature) = join3(
            self.source.fetch(Attribute::Luminosity, self.last_n),
            self.source.fetch(Attribute::Humidity, self.last_n),
            self.source.fetch(Attribute::Temperature, self.last_n),
        )
        .await;

        let mut batch = Batch::default();
        let mut report = CycleReport {
            luminosity: AttributeReport::default(),
            humidity: AttributeReport::default(),
            temperature: AttributeReport::default(),
            merge: Ok(MergeOutcome::Unchanged),
        };

        for (attribute, raw) in [
            (Attribute::Luminosity, luminosity),
            (Attribute::Humidity, humidity),
            (Attribute::Temperature, temperature),
        ] {
            let (normalized, dropped) = self.normalizer.normalize_all(attribute, &raw);
            *report.attribute_mut(attribute) = AttributeReport {
                fetched: raw.len(),
                dropped,
            };
            *batch.samples_mut(attribute) = normalized;
        }

        report.merge = self.store.merge(self.policy, &batch);
        match &report.merge {
            Ok(MergeOutcome::Unchanged) => debug!("No data received this cycle"),
            Ok(outcome) => info!(
                "Cycle merged ({:?}): luminosity={} humidity={} temperature={} samples, series length {}",
                outcome,
                batch.luminosity.len(),
                batch.humidity.len(),
                batch.temperature.len(),
                self.store.snapshot().len()
            ),
            Err(e) => warn!("Merge skipped: {}", e),
        }

        CycleOutcome::Completed(report)
    }

    /// Run cycles on a fixed cadence until the task is dropped
    ///
    /// Cycles run inline, so ticks missed by a slow cycle are skipped rather
    /// than queued.
    pub async fn run(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let CycleOutcome::Completed(report) = self.run_cycle().await {
                debug!(
                    "Fetched luminosity={} humidity={} temperature={}",
                    report.luminosity.fetched, report.humidity.fetched, report.temperature.fetched
                );
                let dropped =
                    report.luminosity.dropped + report.humidity.dropped + report.temperature.dropped;
                if dropped > 0 {
                    warn!("{} malformed samples dropped this cycle", dropped);
                }
                if !report.changed() {
                    info!("Series unchanged this cycle");
                }
            }
        }
    }
}
