//! Per-district aggregation and choropleth binning.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::Record;

/// YlOrRd, six classes
pub const YL_OR_RD: [&str; 6] = [
    "#ffffb2", "#fed976", "#feb24c", "#fd8d3c", "#f03b20", "#bd0026",
];

/// Point counts per district and per (district, category)
#[derive(Debug, Clone, Default)]
pub struct DistrictCounts {
    totals: BTreeMap<String, usize>,
    by_category: BTreeMap<String, BTreeMap<String, usize>>,
}

impl DistrictCounts {
    /// Records outside every district are not counted
    pub fn from_records(records: &[Record]) -> Self {
        let mut counts = Self::default();

        for record in records {
            let district = match &record.district {
                Some(d) => d,
                None => continue,
            };
            *counts.totals.entry(district.clone()).or_default() += 1;

            if let Some(category) = &record.category {
                *counts
                    .by_category
                    .entry(district.clone())
                    .or_default()
                    .entry(category.clone())
                    .or_default() += 1;
            }
        }

        counts
    }

    pub fn total(&self, district: &str) -> usize {
        self.totals.get(district).copied().unwrap_or(0)
    }

    /// Districts with at least one point, most points first, ties by name
    pub fn sorted_totals(&self) -> Vec<(&str, usize)> {
        let mut sorted: Vec<(&str, usize)> =
            self.totals.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        sorted
    }

    /// district → category → count
    pub fn by_category(&self) -> &BTreeMap<String, BTreeMap<String, usize>> {
        &self.by_category
    }
}

/// Sorted distinct categories
pub fn categories(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Equal-width bins between the smallest and largest value
#[derive(Debug, Clone)]
pub struct ColorScale {
    min: f64,
    max: f64,
}

impl ColorScale {
    pub fn linear<I: IntoIterator<Item = usize>>(values: I) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            min = min.min(v as f64);
            max = max.max(v as f64);
        }
        if !min.is_finite() {
            min = 0.0;
            max = 0.0;
        }
        Self { min, max }
    }

    fn bin(&self, value: usize) -> usize {
        if self.max <= self.min {
            return 0;
        }
        let t = (value as f64 - self.min) / (self.max - self.min);
        ((t * YL_OR_RD.len() as f64) as usize).min(YL_OR_RD.len() - 1)
    }

    pub fn color(&self, value: usize) -> &'static str {
        YL_OR_RD[self.bin(value)]
    }

    /// (lower edge, upper edge, colour) for each class
    pub fn legend(&self) -> Vec<(f64, f64, &'static str)> {
        let n = YL_OR_RD.len();
        let step = (self.max - self.min) / n as f64;
        YL_OR_RD
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let lo = self.min + step * i as f64;
                let hi = if i + 1 == n { self.max } else { lo + step };
                (lo, hi, *c)
            })
            .collect()
    }
}
