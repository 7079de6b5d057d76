//! Graph-derived fraud signals
//!
//! Maintains a lightweight transaction graph in the rolling store (which
//! senders pay which recipients, and which of those edges were later
//! flagged) and derives signals per-transaction ML cannot see:
//!
//! - recipient fraud ratio (fraction of its senders flagged as fraud)
//! - degree risk (a recipient collecting from unusually many senders)
//! - the sender's own fraud history
//!
//! Shared-device signals are disabled by policy; the fields stay in the
//! details payload, permanently zero, so the hook can be re-enabled.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PipelineConfig;
use crate::core::math::{clamp01, round_dp};
use crate::store::{RollingStore, StoreResult};

/// Individual signal components backing a graph risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDetails {
    pub recipient_fraud_ratio: f64,
    pub recipient_total_senders: usize,
    pub recipient_fraud_senders: usize,
    pub degree_centrality: usize,
    pub degree_risk: f64,
    pub shared_device_fraud_ratio: f64,
    pub device_users: usize,
    pub device_fraud_users: usize,
    pub multi_user_device_risk: f64,
    pub user_fraud_count: u64,
    pub user_fraud_risk: f64,
    pub graph_risk_score: f64,
    /// False when the rolling store was unreachable
    pub available: bool,
}

impl GraphDetails {
    fn unavailable() -> Self {
        Self {
            recipient_fraud_ratio: 0.0,
            recipient_total_senders: 0,
            recipient_fraud_senders: 0,
            degree_centrality: 0,
            degree_risk: 0.0,
            shared_device_fraud_ratio: 0.0,
            device_users: 0,
            device_fraud_users: 0,
            multi_user_device_risk: 0.0,
            user_fraud_count: 0,
            user_fraud_risk: 0.0,
            graph_risk_score: 0.0,
            available: false,
        }
    }
}

/// Recipient-centric view of the graph for operator surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientProfile {
    pub recipient: String,
    pub total_unique_senders: usize,
    pub fraud_flagged_senders: usize,
    pub fraud_ratio: f64,
    /// Capped sample of senders, for display
    pub recent_senders: Vec<String>,
}

/// Maintains the transaction graph and computes its risk signals.
pub struct GraphEngine {
    store: Arc<dyn RollingStore>,
    config: Arc<PipelineConfig>,
}

impl std::fmt::Debug for GraphEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphEngine").finish_non_exhaustive()
    }
}

fn key_recipient_senders(recipient: &str) -> String {
    format!("graph:recipient:{recipient}:senders")
}

fn key_recipient_fraud_senders(recipient: &str) -> String {
    format!("graph:recipient:{recipient}:fraud_senders")
}

fn key_device_users(device_id: &str) -> String {
    format!("graph:device:{device_id}:users")
}

fn key_device_fraud_users(device_id: &str) -> String {
    format!("graph:device:{device_id}:fraud_users")
}

fn key_user_recipients(user_id: &str) -> String {
    format!("graph:user:{user_id}:recipients")
}

fn key_user_fraud_count(user_id: &str) -> String {
    format!("graph:user:{user_id}:fraud_count")
}

impl GraphEngine {
    pub fn new(store: Arc<dyn RollingStore>, config: Arc<PipelineConfig>) -> Self {
        Self { store, config }
    }

    /// Record a processed transaction as an edge. Best-effort.
    pub fn record_edge(&self, user_id: &str, recipient: &str, device_id: &str) {
        if let Err(err) = self.try_record_edge(user_id, recipient, device_id) {
            warn!(user_id, %err, "failed to record graph edge");
        }
    }

    fn try_record_edge(&self, user_id: &str, recipient: &str, device_id: &str) -> StoreResult<()> {
        let ttl = self.config.ttl.graph;
        self.store
            .set_add(&key_recipient_senders(recipient), user_id, ttl)?;
        self.store
            .set_add(&key_user_recipients(user_id), recipient, ttl)?;
        self.store.set_add(&key_device_users(device_id), user_id, ttl)?;
        Ok(())
    }

    /// Mark a transaction on this edge as fraudulent. Best-effort.
    pub fn record_fraud_edge(&self, user_id: &str, recipient: &str, device_id: &str) {
        if let Err(err) = self.try_record_fraud_edge(user_id, recipient, device_id) {
            warn!(user_id, %err, "failed to record graph fraud edge");
        }
    }

    fn try_record_fraud_edge(
        &self,
        user_id: &str,
        recipient: &str,
        device_id: &str,
    ) -> StoreResult<()> {
        let ttl = self.config.ttl.graph;
        self.store
            .set_add(&key_recipient_fraud_senders(recipient), user_id, ttl)?;
        self.store
            .set_add(&key_device_fraud_users(device_id), user_id, ttl)?;
        self.store.incr_by(&key_user_fraud_count(user_id), 1, ttl)?;
        Ok(())
    }

    /// Compute the graph risk for a transaction. A store outage yields a
    /// zero signal marked unavailable.
    pub fn compute(&self, user_id: &str, recipient: &str, _device_id: &str) -> (f64, GraphDetails) {
        match self.try_compute(user_id, recipient) {
            Ok(result) => result,
            Err(_) => {
                warn!(user_id, "graph state unavailable; zero graph signal");
                (0.0, GraphDetails::unavailable())
            }
        }
    }

    fn try_compute(&self, user_id: &str, recipient: &str) -> StoreResult<(f64, GraphDetails)> {
        let cfg = &self.config.graph;

        let total_senders = self.store.set_card(&key_recipient_senders(recipient))?;
        let fraud_senders = self
            .store
            .set_card(&key_recipient_fraud_senders(recipient))?;

        let recipient_fraud_ratio = if total_senders > 0 && fraud_senders > 0 {
            fraud_senders as f64 / total_senders as f64
        } else {
            0.0
        };

        // Money-mule shape: one recipient collecting from many senders
        let degree_risk = if total_senders > cfg.degree_knee {
            clamp01((total_senders - cfg.degree_knee) as f64 / cfg.degree_span)
        } else {
            0.0
        };

        let user_fraud_count = self
            .store
            .get(&key_user_fraud_count(user_id))?
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let user_fraud_risk = (user_fraud_count as f64 * cfg.user_flag_risk).min(1.0);

        let graph_risk = clamp01(
            cfg.weight_fraud_ratio * recipient_fraud_ratio
                + cfg.weight_degree * degree_risk
                + cfg.weight_user_history * user_fraud_risk,
        );

        let details = GraphDetails {
            recipient_fraud_ratio: round_dp(recipient_fraud_ratio, 4),
            recipient_total_senders: total_senders,
            recipient_fraud_senders: fraud_senders,
            degree_centrality: total_senders,
            degree_risk: round_dp(degree_risk, 4),
            shared_device_fraud_ratio: 0.0,
            device_users: 0,
            device_fraud_users: 0,
            multi_user_device_risk: 0.0,
            user_fraud_count,
            user_fraud_risk: round_dp(user_fraud_risk, 4),
            graph_risk_score: round_dp(graph_risk, 4),
            available: true,
        };

        Ok((graph_risk, details))
    }

    /// Blend an elevated graph signal into the transaction risk.
    pub fn blend(&self, risk: f64, graph_risk: f64) -> f64 {
        let cfg = &self.config.graph;
        if graph_risk > cfg.blend_trigger {
            cfg.blend_keep * risk + cfg.blend_add * graph_risk
        } else {
            risk
        }
    }

    /// Full risk profile for a recipient, for operator dashboards.
    pub fn recipient_profile(&self, recipient: &str) -> StoreResult<RecipientProfile> {
        let total = self.store.set_card(&key_recipient_senders(recipient))?;
        let fraud = self
            .store
            .set_card(&key_recipient_fraud_senders(recipient))?;
        let mut senders = self.store.set_members(&key_recipient_senders(recipient))?;
        senders.truncate(20);

        Ok(RecipientProfile {
            recipient: recipient.to_string(),
            total_unique_senders: total,
            fraud_flagged_senders: fraud,
            fraud_ratio: if total > 0 {
                round_dp(fraud as f64 / total as f64, 4)
            } else {
                0.0
            },
            recent_senders: senders,
        })
    }
}
