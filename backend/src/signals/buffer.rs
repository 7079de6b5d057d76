//! Cumulative risk buffer (slow-burn protection)
//!
//! A per-user risk accumulator that decays over time. Catches gradual
//! account takeover and social-engineering progressions that individual
//! transaction scores cannot: many moderately risky transactions pile up
//! where each alone would pass.
//!
//! Update: `new = old * decay^(hours_since_last / 6) * decay + risk`.
//! Crossing the escalate threshold forces at least DELAY; crossing the
//! block threshold forces BLOCK.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PipelineConfig;
use crate::core::math::round_dp;
use crate::core::time::Clock;
use crate::store::{RollingStore, StoreResult};

/// Action modifier emitted by the buffer engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BufferOverride {
    None,
    Escalate,
    Block,
}

/// Qualitative buffer state for explanations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferState {
    Normal,
    Elevated,
    Critical,
    NewUser,
    Unavailable,
}

/// Buffer snapshot persisted in the explainability payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferDetails {
    pub buffer: f64,
    pub elapsed_hours: f64,
    pub status: BufferState,
    pub escalate_threshold: f64,
    pub block_threshold: f64,
}

/// One history sample, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferSample {
    pub risk_score: f64,
    pub timestamp: f64,
}

/// Result of folding a transaction's risk into the buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferUpdate {
    pub value: f64,
    pub action_modifier: BufferOverride,
    pub details: BufferDetails,
}

/// Maintains the per-user decaying risk accumulator.
pub struct RiskBufferEngine {
    store: Arc<dyn RollingStore>,
    clock: Arc<dyn Clock>,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for RiskBufferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskBufferEngine").finish_non_exhaustive()
    }
}

fn key_buffer(user_id: &str) -> String {
    format!("risk_buffer:{user_id}:value")
}

fn key_last_ts(user_id: &str) -> String {
    format!("risk_buffer:{user_id}:last_ts")
}

fn key_history(user_id: &str) -> String {
    format!("risk_buffer:{user_id}:history")
}

impl RiskBufferEngine {
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

    /// Current buffer value with passive time decay applied.
    pub fn current(&self, user_id: &str) -> (f64, BufferDetails) {
        let cfg = &self.config.buffer;
        match self.try_current(user_id) {
            Ok(Some((value, elapsed_hours))) => {
                let status = if value >= cfg.block_threshold {
                    BufferState::Critical
                } else if value >= cfg.escalate_threshold {
                    BufferState::Elevated
                } else {
                    BufferState::Normal
                };
                (
                    value,
                    BufferDetails {
                        buffer: round_dp(value, 4),
                        elapsed_hours: round_dp(elapsed_hours, 1),
                        status,
                        escalate_threshold: cfg.escalate_threshold,
                        block_threshold: cfg.block_threshold,
                    },
                )
            }
            Ok(None) => (0.0, self.empty_details(BufferState::NewUser)),
            Err(_) => {
                warn!(user_id, "risk buffer unavailable; treating as zero");
                (0.0, self.empty_details(BufferState::Unavailable))
            }
        }
    }

    fn empty_details(&self, status: BufferState) -> BufferDetails {
        BufferDetails {
            buffer: 0.0,
            elapsed_hours: 0.0,
            status,
            escalate_threshold: self.config.buffer.escalate_threshold,
            block_threshold: self.config.buffer.block_threshold,
        }
    }

    fn try_current(&self, user_id: &str) -> StoreResult<Option<(f64, f64)>> {
        let raw_buffer = self.store.get(&key_buffer(user_id))?;
        let Some(raw_buffer) = raw_buffer else {
            return Ok(None);
        };
        let mut value: f64 = raw_buffer.parse().unwrap_or(0.0);

        let now = self.now_epoch();
        let last_ts = self
            .store
            .get(&key_last_ts(user_id))?
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(now);

        let elapsed_hours = ((now - last_ts) / 3_600.0).max(0.0);
        if elapsed_hours > 0.0 {
            let cfg = &self.config.buffer;
            value *= cfg.decay.powf(elapsed_hours / cfg.passive_decay_hours);
        }
        Ok(Some((value, elapsed_hours)))
    }

    /// Fold a transaction's risk into the buffer and derive the override.
    ///
    /// A store outage leaves the buffer unknown: the update is skipped and
    /// no override is emitted (the transaction still gets its model-based
    /// decision).
    pub fn update(&self, user_id: &str, current_risk: f64) -> BufferUpdate {
        let cfg = &self.config.buffer;
        let (old_value, _) = self.current(user_id);
        let new_value = old_value * cfg.decay + current_risk;

        if let Err(err) = self.try_store(user_id, new_value, current_risk) {
            warn!(user_id, %err, "failed to persist risk buffer update");
            return BufferUpdate {
                value: 0.0,
                action_modifier: BufferOverride::None,
                details: self.empty_details(BufferState::Unavailable),
            };
        }

        let action_modifier = if new_value >= cfg.block_threshold {
            BufferOverride::Block
        } else if new_value >= cfg.escalate_threshold {
            BufferOverride::Escalate
        } else {
            BufferOverride::None
        };

        let status = match action_modifier {
            BufferOverride::Block => BufferState::Critical,
            BufferOverride::Escalate => BufferState::Elevated,
            BufferOverride::None => BufferState::Normal,
        };

        BufferUpdate {
            value: new_value,
            action_modifier,
            details: BufferDetails {
                buffer: round_dp(new_value, 4),
                elapsed_hours: 0.0,
                status,
                escalate_threshold: cfg.escalate_threshold,
                block_threshold: cfg.block_threshold,
            },
        }
    }

    fn try_store(&self, user_id: &str, new_value: f64, current_risk: f64) -> StoreResult<()> {
        let ttl = self.config.ttl.buffer;
        let now = self.now_epoch();
        self.store
            .put(&key_buffer(user_id), &new_value.to_string(), ttl)?;
        self.store.put(&key_last_ts(user_id), &now.to_string(), ttl)?;

        let history_key = key_history(user_id);
        self.store
            .list_push(&history_key, &format!("{current_risk:.4}:{now:.0}"), ttl)?;
        self.store
            .list_trim(&history_key, self.config.buffer.history_len)?;
        Ok(())
    }

    /// Clear a user's buffer (manual review resolved in their favour).
    pub fn reset(&self, user_id: &str) {
        let keys = [key_buffer(user_id), key_last_ts(user_id), key_history(user_id)];
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        if let Err(err) = self.store.remove(&refs) {
            warn!(user_id, %err, "failed to reset risk buffer");
        }
    }

    /// Recent (risk, timestamp) samples, newest first.
    pub fn history(&self, user_id: &str) -> Vec<BufferSample> {
        let entries = match self.store.list_range(&key_history(user_id)) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        entries
            .iter()
            .filter_map(|entry| {
                let (risk, ts) = entry.split_once(':')?;
                Some(BufferSample {
                    risk_score: risk.parse().ok()?,
                    timestamp: ts.parse().ok()?,
                })
            })
            .collect()
    }

    fn now_epoch(&self) -> f64 {
        self.clock.now().timestamp_micros() as f64 / 1e6
    }
}
