use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::warn;
use serde::Deserialize;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire shape of the remote dataset: category -> date string -> cumulative
/// magnitude.
#[derive(Clone, Debug, Deserialize)]
#[serde(transparent)]
pub struct RawSeries(pub HashMap<String, HashMap<String, f64>>);

/// Read-only dataset snapshot with parsed dates and deterministic iteration
/// order.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    series: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

/// Per-category figures for one reference date.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DailyFigures {
    pub total: f64,
    pub delta: f64,
    pub growth: f64,
}

impl Snapshot {
    pub fn from_raw(raw: RawSeries) -> Self {
        let mut series = BTreeMap::new();

        for (category, dates) in raw.0 {
            let mut by_date = BTreeMap::new();
            for (key, value) in dates {
                let Ok(date) = NaiveDate::parse_from_str(&key, DATE_FORMAT) else {
                    warn!("{category}: skipping unparsable date key {key:?}");
                    continue;
                };
                if !value.is_finite() || value < 0.0 {
                    warn!("{category}: skipping bad magnitude {value} on {key}");
                    continue;
                }
                by_date.insert(date, value);
            }

            if !by_date.is_empty() {
                series.insert(category, by_date);
            }
        }

        Self { series }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn category_count(&self) -> usize {
        self.series.len()
    }

    pub fn magnitude(&self, category: &str, date: NaiveDate) -> Option<f64> {
        self.series.get(category)?.get(&date).copied()
    }

    /// Today's magnitude plus the day-over-day delta and growth rate.
    /// Returns `None` when the category has no value for `date` or no value
    /// the day before: a first-ever total has no baseline and must not read
    /// as one day's growth. Growth on a zero base is defined as 0 so no NaN
    /// can escape.
    pub fn daily_figures(&self, category: &str, date: NaiveDate) -> Option<DailyFigures> {
        let total = self.magnitude(category, date)?;
        let yesterday = self.magnitude(category, date.pred_opt()?)?;

        let delta = total - yesterday;
        let growth = if yesterday > 0.0 { delta / yesterday } else { 0.0 };

        Some(DailyFigures {
            total,
            delta,
            growth,
        })
    }
}

/// Blocking fetch of the remote dataset. Runs on a background thread; a
/// failure here is logged by the caller and leaves any existing node set
/// untouched.
pub fn fetch_snapshot(url: &str) -> Result<Snapshot> {
    let raw = reqwest::blocking::get(url)
        .with_context(|| format!("failed to fetch dataset from {url}"))?
        .error_for_status()
        .context("dataset server returned an error status")?
        .json::<RawSeries>()
        .context("dataset payload was not the expected category/date/value JSON")?;

    Ok(Snapshot::from_raw(raw))
}
