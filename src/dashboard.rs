/// Dashboard consumer: redraws a textual summary whenever the series changes
use log::info;
use std::sync::Arc;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::models::Series;

/// Format a timestamp for the dashboard as DD.MM.YYYY - HH:MM:SS
///
/// Falls back to the default representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Lines describing the current state of the series
pub fn summarize(series: &Series) -> Vec<String> {
    if series.is_empty() {
        return vec!["No data available".to_string()];
    }

    let mut lines = vec![format!("Series holds {} points", series.len())];

    let span = (series.timestamps.iter().min(), series.timestamps.iter().max());
    if let (Some(first), Some(last)) = span {
        let offset = last.offset();
        lines.push(format!(
            "  From {} to {} (UTC{:+03}:{:02})",
            format_datetime(first),
            format_datetime(last),
            offset.whole_hours(),
            offset.minutes_past_hour().abs()
        ));
    }

    if let Some(latest) = series.latest() {
        lines.push(format!("  Luminosity: {:.2}", latest.luminosity));
        lines.push(format!("  Humidity: {:.2}%", latest.humidity));
        lines.push(format!("  Temperature: {:.2}°C", latest.temperature));
    }

    if !series.is_aligned() {
        lines.push(format!(
            "  Sequences differ in length (luminosity={}, humidity={}, temperature={})",
            series.luminosity.len(),
            series.humidity.len(),
            series.temperature.len()
        ));
    }

    lines
}

/// Redraw on every change notification until the store goes away
pub async fn run_dashboard(mut updates: watch::Receiver<Arc<Series>>) {
    while updates.changed().await.is_ok() {
        let series = updates.borrow_and_update().clone();
        for line in summarize(&series) {
            info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_day_first() {
        assert_eq!(
            format_datetime(&datetime!(2024-01-05 09:07:03.5 -3)),
            "05.01.2024 - 09:07:03"
        );
    }

    #[test]
    fn summary_of_empty_series() {
        assert_eq!(summarize(&Series::default()), vec!["No data available"]);
    }

    #[test]
    fn summary_shows_span_and_latest_row() {
        let series = Series {
            timestamps: vec![
                datetime!(2024-01-01 09:00:10 -3),
                datetime!(2024-01-01 09:00:00 -3),
            ],
            luminosity: vec![120.0, 110.0],
            humidity: vec![61.0, 60.0],
            temperature: vec![22.5, 22.0],
        };

        let lines = summarize(&series);
        assert_eq!(lines[0], "Series holds 2 points");
        assert_eq!(
            lines[1],
            "  From 01.01.2024 - 09:00:00 to 01.01.2024 - 09:00:10 (UTC-03:00)"
        );
        assert_eq!(lines[2], "  Luminosity: 110.00");
        assert_eq!(lines[3], "  Humidity: 60.00%");
        assert_eq!(lines[4], "  Temperature: 22.00°C");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn summary_flags_misaligned_series() {
        let series = Series {
            timestamps: vec![datetime!(2024-01-01 09:00 -3)],
            luminosity: vec![100.0],
            humidity: vec![60.0, 61.0],
            temperature: vec![],
        };

        let lines = summarize(&series);
        assert!(lines
            .last()
            .unwrap()
            .contains("luminosity=1, humidity=2, temperature=0"));
    }

    #[tokio::test]
    async fn dashboard_stops_when_store_is_dropped() {
        let (tx, rx) = watch::channel(Arc::new(Series::default()));
        let task = tokio::spawn(run_dashboard(rx));
        tx.send_replace(Arc::new(Series {
            timestamps: vec![datetime!(2024-01-01 09:00 -3)],
            luminosity: vec![1.0],
            humidity: vec![2.0],
            temperature: vec![3.0],
        }));
        drop(tx);
        task.await.unwrap();
    }
}
