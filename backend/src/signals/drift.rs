//! Concept-drift monitoring (Population Stability Index)
//!
//! Compares the live distribution of each feature against a baseline
//! frozen at training time. Ten equal-width bins per feature; the PSI
//! between baseline and live proportions bands each feature as stable
//! (< 0.1), moderate drift or major drift (>= 0.25).
//!
//! The monitor is observational: it never changes a transaction's outcome.
//! Its report is cached and exposed for operators.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::core::math::round_dp;
use crate::core::time::Clock;
use crate::models::features::FeatureVector;
use crate::store::{RollingStore, StoreResult};

const EPSILON: f64 = 1e-6;

/// Per-feature drift classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    Stable,
    ModerateDrift,
    MajorDrift,
    InsufficientData,
    Unavailable,
}

/// Frozen training-time distribution of one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBaseline {
    pub bin_edges: Vec<f64>,
    pub proportions: Vec<f64>,
    pub n_samples: usize,
    pub created_at: f64,
}

/// Drift result for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub psi: f64,
    pub status: DriftStatus,
    pub n_live: usize,
}

/// Full drift report across features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub overall_status: DriftStatus,
    pub max_psi: f64,
    pub n_features_checked: usize,
    pub drifted_features: Vec<String>,
    pub per_feature: BTreeMap<String, FeatureDrift>,
    pub timestamp: f64,
}

impl DriftReport {
    fn unavailable(timestamp: f64) -> Self {
        Self {
            overall_status: DriftStatus::Unavailable,
            max_psi: 0.0,
            n_features_checked: 0,
            drifted_features: Vec::new(),
            per_feature: BTreeMap::new(),
            timestamp,
        }
    }
}

/// Population Stability Index between two binned distributions.
///
/// Inputs are proportions summing to ~1. Non-negative; zero iff the
/// distributions agree bin-for-bin (up to epsilon flooring).
pub fn population_stability_index(expected: &[f64], actual: &[f64]) -> f64 {
    expected
        .iter()
        .zip(actual)
        .map(|(&e, &a)| {
            let e = e.max(EPSILON);
            let a = a.max(EPSILON);
            (a - e) * (a / e).ln()
        })
        .sum()
}

/// Histogram proportions of `values` over frozen `bin_edges`.
/// Values beyond the last edge land in the last bin.
fn histogram(values: &[f64], bin_edges: &[f64]) -> Vec<f64> {
    let n_bins = bin_edges.len().saturating_sub(1);
    let mut counts = vec![0usize; n_bins];

    for &v in values {
        let mut placed = false;
        for i in 0..n_bins {
            if v < bin_edges[i + 1] {
                counts[i] += 1;
                placed = true;
                break;
            }
        }
        if !placed {
            if let Some(last) = counts.last_mut() {
                *last += 1;
            }
        }
    }

    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![1.0 / n_bins as f64; n_bins];
    }
    counts.iter().map(|&c| c as f64 / total as f64).collect()
}

fn key_baseline(feature_name: &str) -> String {
    format!("drift:baseline:{feature_name}")
}

fn key_live(feature_name: &str) -> String {
    format!("drift:live:{feature_name}")
}

const KEY_LAST_REPORT: &str = "drift:last_report";

/// Stores baselines, accumulates live values and computes PSI reports.
pub struct DriftMonitor {
    store: Arc<dyn RollingStore>,
    clock: Arc<dyn Clock>,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for DriftMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftMonitor").finish_non_exhaustive()
    }
}

impl DriftMonitor {
    pub fn new(
        store: Arc<dyn RollingStore>,
        clock: Arc<dyn Clock>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Freeze a training-time distribution as the baseline for one feature.
    pub fn store_baseline(&self, feature_name: &str, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        if let Err(err) = self.try_store_baseline(feature_name, values) {
            warn!(feature_name, %err, "failed to store drift baseline");
        }
    }

    fn try_store_baseline(&self, feature_name: &str, values: &[f64]) -> StoreResult<()> {
        let bins = self.config.drift.bins;
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let mut max = values.iter().cloned().fold(f64::MIN, f64::max);
        if min == max {
            max = min + 1.0;
        }

        let width = (max - min) / bins as f64;
        let mut bin_edges: Vec<f64> = (0..=bins).map(|i| min + i as f64 * width).collect();
        // Nudge the last edge so the maximum lands inside the histogram
        *bin_edges.last_mut().expect("bins > 0") = max + EPSILON;

        let baseline = FeatureBaseline {
            proportions: histogram(values, &bin_edges),
            bin_edges,
            n_samples: values.len(),
            created_at: self.now_epoch(),
        };

        let payload = serde_json::to_string(&baseline).expect("baseline serializes");
        self.store.put(
            &key_baseline(feature_name),
            &payload,
            self.config.ttl.drift_baseline,
        )
    }

    /// Freeze baselines for several features at once.
    pub fn store_baselines(&self, distributions: &BTreeMap<String, Vec<f64>>) {
        for (name, values) in distributions {
            self.store_baseline(name, values);
        }
        info!(count = distributions.len(), "stored drift baselines");
    }

    /// Record one transaction's features into the live windows.
    /// Called on every scoring pass; best-effort.
    pub fn record_live(&self, features: &FeatureVector) {
        for (name, value) in features.named() {
            let key = key_live(name);
            let ttl = self.config.ttl.drift_live;
            let write = self
                .store
                .list_push(&key, &value.to_string(), ttl)
                .and_then(|_| self.store.list_trim(&key, self.config.drift.live_window));
            if write.is_err() {
                // One warning per transaction is enough
                warn!("failed to record live drift features");
                return;
            }
        }
    }

    /// Compute PSI for every feature with a stored baseline (or the given
    /// subset) and cache the report.
    pub fn compute_report(&self, feature_names: Option<&[&str]>) -> DriftReport {
        match self.try_compute_report(feature_names) {
            Ok(report) => report,
            Err(_) => {
                warn!("drift state unavailable");
                DriftReport::unavailable(self.now_epoch())
            }
        }
    }

    fn try_compute_report(&self, feature_names: Option<&[&str]>) -> StoreResult<DriftReport> {
        let cfg = &self.config.drift;
        let names: Vec<String> = match feature_names {
            Some(names) => names.iter().map(|s| s.to_string()).collect(),
            None => self
                .store
                .scan_prefix("drift:baseline:")?
                .into_iter()
                .map(|k| k.trim_start_matches("drift:baseline:").to_string())
                .collect(),
        };

        let mut per_feature = BTreeMap::new();
        let mut drifted_features = Vec::new();
        let mut max_psi = 0.0f64;

        for name in names {
            let Some(raw) = self.store.get(&key_baseline(&name))? else {
                continue;
            };
            let Ok(baseline) = serde_json::from_str::<FeatureBaseline>(&raw) else {
                warn!(feature = %name, "unreadable drift baseline; skipping");
                continue;
            };

            let live_raw = self.store.list_range(&key_live(&name))?;
            if live_raw.len() < cfg.min_live_samples {
                per_feature.insert(
                    name,
                    FeatureDrift {
                        psi: 0.0,
                        status: DriftStatus::InsufficientData,
                        n_live: live_raw.len(),
                    },
                );
                continue;
            }

            let live_values: Vec<f64> = live_raw.iter().filter_map(|v| v.parse().ok()).collect();
            let actual = histogram(&live_values, &baseline.bin_edges);
            let psi = population_stability_index(&baseline.proportions, &actual);

            let status = if psi > cfg.major_psi {
                DriftStatus::MajorDrift
            } else if psi > cfg.moderate_psi {
                DriftStatus::ModerateDrift
            } else {
                DriftStatus::Stable
            };
            if status != DriftStatus::Stable {
                drifted_features.push(name.clone());
            }

            max_psi = max_psi.max(psi);
            per_feature.insert(
                name,
                FeatureDrift {
                    psi: round_dp(psi, 4),
                    status,
                    n_live: live_values.len(),
                },
            );
        }

        let overall_status = if max_psi > cfg.major_psi {
            DriftStatus::MajorDrift
        } else if max_psi > cfg.moderate_psi {
            DriftStatus::ModerateDrift
        } else {
            DriftStatus::Stable
        };

        let report = DriftReport {
            overall_status,
            max_psi: round_dp(max_psi, 4),
            n_features_checked: per_feature.len(),
            drifted_features,
            per_feature,
            timestamp: self.now_epoch(),
        };

        // Cache for dashboards; losing the cache loses nothing material
        if let Ok(payload) = serde_json::to_string(&report) {
            let _ = self
                .store
                .put(KEY_LAST_REPORT, &payload, self.config.ttl.drift_report);
        }

        Ok(report)
    }

    /// The most recent cached report, if any.
    pub fn last_report(&self) -> Option<DriftReport> {
        let raw = self.store.get(KEY_LAST_REPORT).ok()??;
        serde_json::from_str(&raw).ok()
    }

    fn now_epoch(&self) -> f64 {
        self.clock.now().timestamp_micros() as f64 / 1e6
    }
}
