//! Model-usage budget tracking
//!
//! This module handles:
//! - Persisting cumulative token usage and the operator-set ceiling as JSON
//! - Computing the remaining budget percentage
//! - A one-shot low-budget alert that re-arms once the budget recovers
//!
//! The ceiling is re-read from disk on every check so an operator can raise
//! it while the bot runs. Consumed tokens are owned by the running process.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;

pub const DEFAULT_CEILING: u64 = 1000;
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 10.0;

/// Durable usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetState {
    #[serde(rename = "tokens_used", default)]
    pub consumed: u64,
    #[serde(rename = "primary_budget", default = "default_ceiling")]
    pub ceiling: u64,
}

fn default_ceiling() -> u64 {
    DEFAULT_CEILING
}

impl Default for BudgetState {
    fn default() -> Self {
        Self {
            consumed: 0,
            ceiling: DEFAULT_CEILING,
        }
    }
}

impl BudgetState {
    /// Percent of the ceiling still unspent; `None` when the ceiling is zero.
    /// Negative once usage exceeds the ceiling.
    pub fn remaining_percent(&self) -> Option<f64> {
        if self.ceiling == 0 {
            return None;
        }
        let ceiling = self.ceiling as f64;
        Some(100.0 * (ceiling - self.consumed as f64) / ceiling)
    }

    pub fn level(&self, threshold_percent: f64) -> BudgetLevel {
        match self.remaining_percent() {
            Some(pct) if pct > threshold_percent => BudgetLevel::Ok,
            _ => BudgetLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetLevel {
    Ok,
    Low,
}

pub trait BudgetStore: Send + Sync {
    /// A missing record reads as the default state; a corrupt one is an error.
    fn read(&self) -> Result<BudgetState, StoreError>;

    fn write(&self, state: &BudgetState) -> Result<(), StoreError>;
}

/// JSON file store, replaced atomically on each write.
#[derive(Debug, Clone)]
pub struct JsonBudgetStore {
    path: PathBuf,
}

impl JsonBudgetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BudgetStore for JsonBudgetStore {
    fn read(&self) -> Result<BudgetState, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BudgetState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, state: &BudgetState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, serde_json::to_string(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// How the low-budget alert state moved on one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    StayedOk,
    /// OK -> LOW: the alert fires.
    EnteredLow,
    /// LOW -> LOW: already alerted this episode.
    StayedLow,
    /// LOW -> OK: alert re-armed.
    Recovered,
}

/// One-shot alert flag for the current low-budget episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertFlag {
    alerted: bool,
}

impl AlertFlag {
    pub fn is_set(&self) -> bool {
        self.alerted
    }

    pub fn advance(&mut self, level: BudgetLevel) -> Transition {
        match (self.alerted, level) {
            (false, BudgetLevel::Ok) => Transition::StayedOk,
            (false, BudgetLevel::Low) => {
                self.alerted = true;
                Transition::EnteredLow
            }
            (true, BudgetLevel::Low) => Transition::StayedLow,
            (true, BudgetLevel::Ok) => {
                self.alerted = false;
                Transition::Recovered
            }
        }
    }
}

/// Outcome of a usage update or budget check.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetReport {
    pub state: BudgetState,
    pub level: BudgetLevel,
    pub transition: Transition,
    /// Set only on the OK -> LOW transition.
    pub alert: Option<String>,
}

#[derive(Debug)]
struct Running {
    consumed: u64,
    flag: AlertFlag,
}

pub struct BudgetTracker {
    store: Box<dyn BudgetStore>,
    threshold_percent: f64,
    running: Mutex<Running>,
}

impl BudgetTracker {
    /// Load the starting usage from `store`. Unreadable records start from the default.
    pub fn open(store: Box<dyn BudgetStore>, threshold_percent: f64) -> Self {
        let initial = match store.read() {
            Ok(state) => state,
            Err(e) => {
                warn!("Budget record unreadable ({}), starting from defaults", e);
                BudgetState::default()
            }
        };
        info!(
            "Budget loaded: {} of {} tokens used",
            initial.consumed, initial.ceiling
        );
        Self {
            store,
            threshold_percent,
            running: Mutex::new(Running {
                consumed: initial.consumed,
                flag: AlertFlag::default(),
            }),
        }
    }

    pub fn consumed(&self) -> u64 {
        self.running.lock().unwrap_or_else(|e| e.into_inner()).consumed
    }

    /// Add a successful model call's usage, persist, and evaluate the alert.
    pub fn record_usage(&self, tokens: u64) -> BudgetReport {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        let ceiling = self.current_ceiling();
        running.consumed = running.consumed.saturating_add(tokens);

        let state = BudgetState {
            consumed: running.consumed,
            ceiling,
        };
        if let Err(e) = self.store.write(&state) {
            error!("Failed to persist budget record: {}", e);
        }
        self.evaluate(&mut running.flag, state)
    }

    /// Evaluate the alert against the current ceiling without adding usage.
    pub fn check(&self) -> BudgetReport {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        let state = BudgetState {
            consumed: running.consumed,
            ceiling: self.current_ceiling(),
        };
        self.evaluate(&mut running.flag, state)
    }

    fn current_ceiling(&self) -> u64 {
        match self.store.read() {
            Ok(state) => state.ceiling,
            Err(e) => {
                warn!("Budget record unreadable ({}), assuming ceiling {}", e, DEFAULT_CEILING);
                DEFAULT_CEILING
            }
        }
    }

    fn evaluate(&self, flag: &mut AlertFlag, state: BudgetState) -> BudgetReport {
        let level = state.level(self.threshold_percent);
        let transition = flag.advance(level);
        let alert = match transition {
            Transition::EnteredLow => {
                warn!("Token budget low: {} of {} tokens used", state.consumed, state.ceiling);
                Some(alert_message(&state))
            }
            Transition::Recovered => {
                info!("Token budget back above {}%", self.threshold_percent);
                None
            }
            _ => None,
        };
        BudgetReport {
            state,
            level,
            transition,
            alert,
        }
    }
}

pub fn alert_message(state: &BudgetState) -> String {
    match state.remaining_percent() {
        Some(pct) => format!(
            "⚠️ Token budget low: {:.1}% remaining ({} of {} tokens used).",
            pct, state.consumed, state.ceiling
        ),
        None => format!(
            "⚠️ Token budget low: no budget configured ({} tokens used).",
            state.consumed
        ),
    }
}
