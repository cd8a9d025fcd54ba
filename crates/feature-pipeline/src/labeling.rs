use std::collections::BTreeMap;

use chrono::NaiveDate;

use research_core::{FeatureRow, LabeledRow, PricePoint};

/// Attach `target = realized_return_forward > threshold` to each row.
pub fn label_rows(rows: Vec<FeatureRow>, threshold: f64) -> Vec<LabeledRow> {
    rows.into_iter()
        .map(|row| {
            let target = row.realized_return_forward > threshold;
            LabeledRow { row, target }
        })
        .collect()
}

/// Split at `cutoff`: rows dated strictly before it train, the rest are held out.
///
/// Training rows whose forward horizon reaches past the cutoff are not
/// removed here; see [`purge_label_overlap`].
pub fn split_at_cutoff<T, F>(rows: Vec<T>, cutoff: NaiveDate, date_of: F) -> (Vec<T>, Vec<T>)
where
    F: Fn(&T) -> NaiveDate,
{
    rows.into_iter().partition(|r| date_of(r) < cutoff)
}

/// Date of the price that closes the label window of each row: `horizon`
/// trading dates after the row date in its instrument's own history.
pub fn label_end_date(
    dates_by_instrument: &BTreeMap<&str, Vec<NaiveDate>>,
    instrument: &str,
    date: NaiveDate,
    horizon: usize,
) -> Option<NaiveDate> {
    let dates = dates_by_instrument.get(instrument)?;
    let pos = dates.binary_search(&date).ok()?;
    dates.get(pos + horizon).copied()
}

/// Sorted, deduplicated price dates per instrument.
pub fn price_dates(prices: &[PricePoint]) -> BTreeMap<&str, Vec<NaiveDate>> {
    let mut by_instrument: BTreeMap<&str, Vec<NaiveDate>> = BTreeMap::new();
    for p in prices {
        by_instrument.entry(p.instrument.as_str()).or_default().push(p.date);
    }
    for dates in by_instrument.values_mut() {
        dates.sort();
        dates.dedup();
    }
    by_instrument
}

/// Drop training rows whose label reads a price dated on or after `cutoff`.
pub fn purge_label_overlap(
    rows: Vec<LabeledRow>,
    prices: &[PricePoint],
    horizon: usize,
    cutoff: NaiveDate,
) -> Vec<LabeledRow> {
    let dates = price_dates(prices);
    let before = rows.len();
    let kept: Vec<LabeledRow> = rows
        .into_iter()
        .filter(|r| {
            label_end_date(&dates, &r.row.instrument, r.row.date, horizon).is_some_and(|end| end < cutoff)
        })
        .collect();
    if kept.len() < before {
        tracing::debug!(
            "Purged {} training rows whose {}-period label crosses {}",
            before - kept.len(),
            horizon,
            cutoff
        );
    }
    kept
}

/// Rows of the most recent date, for live signal generation.
pub fn latest_snapshot(rows: &[FeatureRow]) -> Vec<FeatureRow> {
    match rows.iter().map(|r| r.date).max() {
        Some(latest) => rows.iter().filter(|r| r.date == latest).cloned().collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use research_core::FeatureVector;

    fn row(instrument: &str, day: u32, ret: f64) -> FeatureRow {
        FeatureRow {
            instrument: instrument.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            features: FeatureVector::new(),
            realized_return_forward: ret,
        }
    }

    #[test]
    fn test_label_threshold_is_strict() {
        let labeled = label_rows(vec![row("A", 1, 0.02), row("A", 2, 0.021), row("A", 3, -0.1)], 0.02);
        let targets: Vec<bool> = labeled.iter().map(|r| r.target).collect();
        assert_eq!(targets, vec![false, true, false]);
    }

    #[test]
    fn test_split_at_cutoff() {
        let rows = vec![row("A", 1, 0.0), row("A", 2, 0.0), row("A", 3, 0.0), row("B", 3, 0.0)];
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let (train, test) = split_at_cutoff(rows, cutoff, |r| r.date);
        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 2);
        assert!(train.iter().all(|r| r.date < cutoff));
        assert!(test.iter().all(|r| r.date >= cutoff));
    }

    fn prices(instrument: &str, days: &[u32]) -> Vec<PricePoint> {
        days.iter()
            .map(|&d| PricePoint {
                instrument: instrument.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
                adjusted_price: rust_decimal::Decimal::from(100),
            })
            .collect()
    }

    #[test]
    fn test_purge_counts_trading_dates() {
        // Jan 6-7 are a weekend: the 2-period label of Jan 4 closes on Jan 8
        let px = prices("A", &[2, 3, 4, 5, 8, 9, 10]);
        let labeled = label_rows(vec![row("A", 2, 0.0), row("A", 3, 0.0), row("A", 4, 0.0), row("A", 5, 0.0)], 0.0);
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();

        let kept = purge_label_overlap(labeled, &px, 2, cutoff);
        let days: Vec<u32> = kept.iter().map(|r| chrono::Datelike::day(&r.row.date)).collect();
        assert_eq!(days, vec![2, 3]);

        let dates = price_dates(&px);
        for r in &kept {
            let end = label_end_date(&dates, "A", r.row.date, 2).unwrap();
            assert!(end < cutoff);
        }
    }

    #[test]
    fn test_purge_drops_unknown_instruments() {
        let px = prices("A", &[2, 3, 4]);
        let labeled = label_rows(vec![row("B", 2, 0.0)], 0.0);
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert!(purge_label_overlap(labeled, &px, 1, cutoff).is_empty());
    }

    #[test]
    fn test_latest_snapshot() {
        let rows = vec![row("A", 1, 0.0), row("A", 5, 0.0), row("B", 5, 0.0), row("B", 4, 0.0)];
        let latest = latest_snapshot(&rows);
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|r| r.date.to_string() == "2024-01-05"));
        assert!(latest_snapshot(&[]).is_empty());
    }
}
