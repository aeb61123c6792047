use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::engine::WakePolicy;
use crate::limits::*;
use crate::model::{Seats, WorkerId};

/// When the supervisor signals shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunLimit {
    /// Wall-clock duration of the run.
    Duration(Duration),
    /// Completed worker iterations, summed over the whole pool.
    Operations(u64),
}

/// Inclusive bounds for a simulated delay, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.random_range(self.min_ms..=self.max_ms))
    }
}

impl FromStr for DelayRange {
    type Err = ();

    /// Accepts `"250"` or `"100-300"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((lo, hi)) => {
                let lo = lo.trim().parse().map_err(|_| ())?;
                let hi = hi.trim().parse().map_err(|_| ())?;
                Ok(Self::new(lo, hi))
            }
            None => {
                let ms = s.trim().parse().map_err(|_| ())?;
                Ok(Self::new(ms, ms))
            }
        }
    }
}

impl FromStr for WakePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check-once" | "check_once" | "once" => Ok(WakePolicy::CheckOnce),
            "recheck" => Ok(WakePolicy::Recheck),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    Invalid { name: &'static str, value: String },
    OutOfRange(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { name, value } => write!(f, "invalid value for {name}: {value:?}"),
            ConfigError::OutOfRange(msg) => write!(f, "configuration out of range: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    pub event_count: usize,
    /// Seats per event, shared by all events.
    pub capacity: Seats,
    pub worker_count: usize,
    /// Workers allowed inside the execution region at once.
    pub admission_limit: usize,
    /// Slots in the active query table.
    pub registry_slots: usize,
    pub min_tickets: Seats,
    pub max_tickets: Seats,
    pub run_limit: RunLimit,
    /// Delay between drawing a query and registering it.
    pub think_delay: DelayRange,
    /// Delay after leaving the gate, before the next iteration.
    pub idle_delay: DelayRange,
    pub wake_policy: WakePolicy,
    /// Fixed RNG seed; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            event_count: 10,
            capacity: 500,
            worker_count: 5,
            admission_limit: 5,
            registry_slots: 5,
            min_tickets: 5,
            max_tickets: 10,
            run_limit: RunLimit::Duration(Duration::from_secs(60)),
            think_delay: DelayRange::new(1_000, 3_000),
            idle_delay: DelayRange::new(1_000, 3_000),
            wake_policy: WakePolicy::CheckOnce,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Reads `TICKETSIM_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |name: &'static str| lookup(name).map(|v| (name, v));

        if let Some(v) = get("TICKETSIM_EVENTS") {
            config.event_count = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_CAPACITY") {
            config.capacity = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_WORKERS") {
            config.worker_count = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_ADMISSION_LIMIT") {
            config.admission_limit = parse(v)?;
            // The table is sized to the gate unless overridden below.
            config.registry_slots = config.admission_limit;
        }
        if let Some(v) = get("TICKETSIM_REGISTRY_SLOTS") {
            config.registry_slots = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_MIN_TICKETS") {
            config.min_tickets = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_MAX_TICKETS") {
            config.max_tickets = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_RUN_SECS") {
            config.run_limit = RunLimit::Duration(Duration::from_secs(parse(v)?));
        }
        if let Some(v) = get("TICKETSIM_RUN_OPS") {
            config.run_limit = RunLimit::Operations(parse(v)?);
        }
        if let Some(v) = get("TICKETSIM_THINK_MS") {
            config.think_delay = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_IDLE_MS") {
            config.idle_delay = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_WAKE_POLICY") {
            config.wake_policy = parse(v)?;
        }
        if let Some(v) = get("TICKETSIM_SEED") {
            config.seed = Some(parse(v)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_count == 0 || self.event_count > MAX_EVENTS {
            return Err(ConfigError::OutOfRange("event count"));
        }
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(ConfigError::OutOfRange("capacity"));
        }
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::OutOfRange("worker count"));
        }
        if self.admission_limit == 0 {
            return Err(ConfigError::OutOfRange("admission limit"));
        }
        if self.registry_slots == 0 || self.registry_slots > MAX_REGISTRY_SLOTS {
            return Err(ConfigError::OutOfRange("registry slots"));
        }
        if self.min_tickets == 0
            || self.min_tickets > self.max_tickets
            || self.max_tickets > MAX_TICKETS_PER_BOOKING
        {
            return Err(ConfigError::OutOfRange("tickets per booking"));
        }
        for delay in [self.think_delay, self.idle_delay] {
            if delay.min_ms > delay.max_ms || delay.max_ms > MAX_DELAY_MS {
                return Err(ConfigError::OutOfRange("delay bounds"));
            }
        }
        match self.run_limit {
            RunLimit::Duration(d) if d.is_zero() => Err(ConfigError::OutOfRange("run duration")),
            RunLimit::Operations(0) => Err(ConfigError::OutOfRange("run operations")),
            _ => Ok(()),
        }
    }

    /// Per-worker seed derived from the run seed, so workers draw distinct streams.
    pub fn worker_seed(&self, worker: WorkerId) -> Option<u64> {
        self.seed
            .map(|s| s ^ worker.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

fn parse<T: FromStr>((name, value): (&'static str, String)) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
