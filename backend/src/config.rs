//! Pipeline configuration
//!
//! Every tunable constant of the pipeline lives here, grouped per engine,
//! with defaults matching the documented production values. The whole
//! bundle is constructed once at startup and shared by the engines; there
//! is no process-wide mutable configuration state.

use std::time::Duration;

/// Regional offset applied to transaction timestamps before deriving
/// temporal features (IST, UTC+5:30).
pub const REGIONAL_OFFSET_MINUTES: i32 = 330;

/// Ensemble scorer configuration
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Weight of the isolation-forest score in the ensemble
    pub weight_iforest: f64,
    /// Weight of the random-forest score in the ensemble
    pub weight_random_forest: f64,
    /// Weight of the xgboost score in the ensemble
    pub weight_xgboost: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weight_iforest: 0.2,
            weight_random_forest: 0.4,
            weight_xgboost: 0.4,
        }
    }
}

/// Trust engine configuration (gradual recipient trust)
#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Transaction count at which the frequency component saturates
    pub freq_saturation: f64,
    /// Total sent amount (rupees) at which the volume component saturates
    pub volume_saturation: f64,
    /// Days known at which the longevity component saturates
    pub longevity_days: f64,
    /// Component weights (frequency, volume, longevity)
    pub weight_freq: f64,
    pub weight_volume: f64,
    pub weight_longevity: f64,
    /// Trust reduction per fraud flag
    pub fraud_penalty_per_flag: f64,
    /// Floor applied to brand-new recipients with no fraud history
    pub baseline_trust: f64,
    /// Maximum risk discount at full trust: risk * (1 - discount * trust)
    pub risk_discount: f64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            freq_saturation: 20.0,
            volume_saturation: 50_000.0,
            longevity_days: 90.0,
            weight_freq: 0.35,
            weight_volume: 0.25,
            weight_longevity: 0.40,
            fraud_penalty_per_flag: 0.5,
            baseline_trust: 0.30,
            risk_discount: 0.3,
        }
    }
}

/// Graph signal configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Component weights: recipient fraud ratio, degree risk, user history
    pub weight_fraud_ratio: f64,
    pub weight_degree: f64,
    pub weight_user_history: f64,
    /// Sender count above which degree risk starts accruing
    pub degree_knee: usize,
    /// Sender count span over which degree risk saturates
    pub degree_span: f64,
    /// Risk contribution per historical user fraud flag
    pub user_flag_risk: f64,
    /// Graph risk above which it blends into the transaction risk
    pub blend_trigger: f64,
    /// Blend: risk = keep * risk + add * graph_risk
    pub blend_keep: f64,
    pub blend_add: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            weight_fraud_ratio: 0.45,
            weight_degree: 0.15,
            weight_user_history: 0.40,
            degree_knee: 30,
            degree_span: 70.0,
            user_flag_risk: 0.3,
            blend_trigger: 0.3,
            blend_keep: 0.8,
            blend_add: 0.2,
        }
    }
}

/// Cumulative risk buffer configuration
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Multiplicative decay applied per update (and passively per 6 hours)
    pub decay: f64,
    /// Hours over which one passive decay step is applied
    pub passive_decay_hours: f64,
    /// Buffer value at which transactions are escalated to DELAY
    pub escalate_threshold: f64,
    /// Buffer value at which transactions are blocked outright
    pub block_threshold: f64,
    /// Number of recent (risk, timestamp) samples retained
    pub history_len: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            decay: 0.85,
            passive_decay_hours: 6.0,
            escalate_threshold: 2.5,
            block_threshold: 4.0,
            history_len: 20,
        }
    }
}

/// Dynamic threshold configuration
#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    pub base_delay: f64,
    pub base_block: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    pub min_block: f64,
    pub max_block: f64,
    /// Gap forced between delay and block when clamping collapses them
    pub min_gap: f64,
    /// Divisor for the log-amount tightening factor
    pub amount_divisor: f64,
    /// Maximum tightening for accounts younger than `new_account_days`
    pub new_account_max_adj: f64,
    pub new_account_days: f64,
    /// Risk-buffer tightening: min(cap, factor * buffer) once buffer > trigger
    pub buffer_trigger: f64,
    pub buffer_factor: f64,
    pub buffer_cap: f64,
    /// Flat night-time tightening
    pub night_adj: f64,
    /// Velocity tightening: min(cap, per_tx * (count - knee)) once 1h count > knee
    pub velocity_knee: f64,
    pub velocity_per_tx: f64,
    pub velocity_cap: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            base_delay: 0.45,
            base_block: 0.75,
            min_delay: 0.25,
            max_delay: 0.55,
            min_block: 0.50,
            max_block: 0.85,
            min_gap: 0.05,
            amount_divisor: 200.0,
            new_account_max_adj: 0.08,
            new_account_days: 30.0,
            buffer_trigger: 0.5,
            buffer_factor: 0.04,
            buffer_cap: 0.10,
            night_adj: 0.03,
            velocity_knee: 5.0,
            velocity_per_tx: 0.01,
            velocity_cap: 0.05,
        }
    }
}

/// Drift monitor configuration
#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// Number of equal-width histogram bins (edges frozen at baseline time)
    pub bins: usize,
    /// Size of the rolling live-value window per feature
    pub live_window: usize,
    /// Minimum live samples before a feature's PSI is meaningful
    pub min_live_samples: usize,
    /// PSI below this is stable
    pub moderate_psi: f64,
    /// PSI at or above this is major drift
    pub major_psi: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            bins: 10,
            live_window: 1000,
            min_live_samples: 50,
            moderate_psi: 0.1,
            major_psi: 0.25,
        }
    }
}

/// Retention periods for rolling-store keys
#[derive(Debug, Clone)]
pub struct TtlConfig {
    /// 24-hour velocity sequence
    pub velocity: Duration,
    /// High-speed 1-minute velocity sequence
    pub velocity_1m: Duration,
    /// High-speed 5-minute velocity sequence
    pub velocity_5m: Duration,
    /// 7-day amount history
    pub amounts: Duration,
    /// Known-recipient set
    pub recipients: Duration,
    /// Trust counters per (sender, recipient)
    pub trust: Duration,
    /// Graph edges and fraud counters
    pub graph: Duration,
    /// Risk buffer value and history
    pub buffer: Duration,
    /// Drift baselines
    pub drift_baseline: Duration,
    /// Drift live windows
    pub drift_live: Duration,
    /// Cached drift report
    pub drift_report: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        const DAY: u64 = 86_400;
        Self {
            velocity: Duration::from_secs(DAY),
            velocity_1m: Duration::from_secs(120),
            velocity_5m: Duration::from_secs(600),
            amounts: Duration::from_secs(7 * DAY),
            recipients: Duration::from_secs(30 * DAY),
            trust: Duration::from_secs(90 * DAY),
            graph: Duration::from_secs(30 * DAY),
            buffer: Duration::from_secs(7 * DAY),
            drift_baseline: Duration::from_secs(30 * DAY),
            drift_live: Duration::from_secs(7 * DAY),
            drift_report: Duration::from_secs(DAY),
        }
    }
}

/// Lifecycle configuration
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Wall-time after which a pending transaction is auto-refunded
    pub auto_refund_after: Duration,
    /// Interval between auto-refund sweeps
    pub sweep_interval: Duration,
    /// Bounded retries on transaction-id collision at insert
    pub tx_id_insert_retries: u32,
    /// Opening balance for newly created users (paise)
    pub default_opening_balance: i64,
    /// When true, DEBIT and REFUND ledger entries also move the sender
    /// balance. The default matches the documented ledger-only behaviour:
    /// only CREDIT entries touch balances.
    pub strict_balance: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            auto_refund_after: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            tx_id_insert_retries: 3,
            default_opening_balance: 1_000_000, // Rs 10,000.00
            strict_balance: false,
        }
    }
}

/// Complete pipeline configuration
///
/// # Example
/// ```
/// use fraud_detection_core_rs::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.thresholds.base_delay, 0.45);
/// assert_eq!(config.buffer.block_threshold, 4.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub scorer: ScorerConfig,
    pub trust: TrustConfig,
    pub graph: GraphConfig,
    pub buffer: BufferConfig,
    pub thresholds: ThresholdConfig,
    pub drift: DriftConfig,
    pub ttl: TtlConfig,
    pub lifecycle: LifecycleConfig,
    pub deadlines: DeadlineConfig,
}

/// Soft deadlines for a single decision and for individual store operations.
///
/// The in-process store cannot block, so these are carried for I/O-backed
/// deployments; the conservative fallback path covers deadline misses.
#[derive(Debug, Clone)]
pub struct DeadlineConfig {
    pub decision: Duration,
    pub store_op: Duration,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            decision: Duration::from_secs(2),
            store_op: Duration::from_secs(2),
        }
    }
}
