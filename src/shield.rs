//! Privacy shield session: counters, journal ring buffer, threat level and
//! stealth identity.
//!
//! The session is a plain owned value. The [`Browser`](crate::browser::Browser)
//! keeps it behind a single mutex so UI calls and navigation tasks serialize
//! through one writer.

use std::collections::VecDeque;

use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::classifier::{ClassificationVerdict, RequestCategory, ThreatLevel};
use crate::config::ShieldConfig;
use crate::events::{LogEvent, LogLevel, ShieldModule};
use crate::identity::{Identity, IdentityRotator};

/// Read-only copy of the session handed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ShieldSnapshot {
    pub ads_blocked: u64,
    pub trackers_blocked: u64,
    pub cryptojacking_blocked: u64,
    pub stealth_mode: bool,
    pub current_identity: Option<Identity>,
    pub last_threat_level: ThreatLevel,
    pub last_threat_detected: Option<String>,
    /// Newest first.
    pub logs: Vec<LogEvent>,
}

#[derive(Debug, Clone)]
pub struct ShieldSession {
    ads_blocked: u64,
    trackers_blocked: u64,
    cryptojacking_blocked: u64,
    stealth_mode: bool,
    current_identity: Option<Identity>,
    last_threat_level: ThreatLevel,
    last_threat_detected: Option<String>,
    /// Front = newest.
    logs: VecDeque<LogEvent>,
    capacity: usize,
    background_probability: f64,
    rotator: IdentityRotator,
}

impl ShieldSession {
    pub fn new(config: &ShieldConfig) -> Self {
        let capacity = config.log_capacity.max(1);
        let mut session = Self {
            ads_blocked: 0,
            trackers_blocked: 0,
            cryptojacking_blocked: 0,
            stealth_mode: false,
            current_identity: None,
            last_threat_level: ThreatLevel::None,
            last_threat_detected: None,
            logs: VecDeque::with_capacity(capacity + 1),
            capacity,
            background_probability: config.background_log_probability.clamp(0.0, 1.0),
            rotator: IdentityRotator,
        };
        if config.stealth_on_start {
            session.toggle_stealth_mode();
        }
        session
    }

    pub fn record_verdict(&mut self, verdict: &ClassificationVerdict, log: LogEvent) {
        self.record_verdict_with(verdict, log, &mut rand::thread_rng());
    }

    /// Logs `log`, then updates counters and the threat level.
    pub fn record_verdict_with<R: Rng + ?Sized>(
        &mut self,
        verdict: &ClassificationVerdict,
        log: LogEvent,
        rng: &mut R,
    ) {
        self.push_log(log);

        if verdict.is_blocked {
            match verdict.category {
                RequestCategory::Tracking => {
                    self.ads_blocked += 1;
                    self.trackers_blocked += 1;
                }
                RequestCategory::Malicious => self.cryptojacking_blocked += 1,
                _ => {}
            }
            self.last_threat_level = verdict.threat_level;
            self.last_threat_detected = Some(verdict.reason.clone());
        } else {
            self.last_threat_level = ThreatLevel::None;
            if rng.gen_bool(self.background_probability) {
                self.push_log(background_log(rng));
            }
        }
    }

    /// Prepends an event; the oldest one is evicted past capacity.
    pub fn push_log(&mut self, log: LogEvent) {
        log.trace();
        self.logs.push_front(log);
        self.logs.truncate(self.capacity);
    }

    pub fn toggle_stealth_mode(&mut self) -> bool {
        self.toggle_stealth_mode_with(&mut rand::thread_rng())
    }

    /// Flips stealth mode; entering it draws a fresh identity.
    pub fn toggle_stealth_mode_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        self.stealth_mode = !self.stealth_mode;
        if self.stealth_mode {
            let identity = self.rotator.generate_with(rng);
            info!(platform = identity.platform, "Stealth mode enabled");
            self.current_identity = Some(identity);
        } else {
            info!("Stealth mode disabled");
        }
        self.stealth_mode
    }

    /// Per-visit spoofing: under stealth mode every navigation re-rotates.
    pub fn rotate_on_navigation<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&Identity> {
        if !self.stealth_mode {
            return None;
        }
        self.current_identity = Some(self.rotator.generate_with(rng));
        self.current_identity.as_ref()
    }

    pub fn stealth_mode(&self) -> bool {
        self.stealth_mode
    }

    pub fn current_identity(&self) -> Option<&Identity> {
        self.current_identity.as_ref()
    }

    pub fn current_user_agent(&self) -> Option<&'static str> {
        self.current_identity.as_ref().map(|i| i.user_agent)
    }

    pub fn last_threat_level(&self) -> ThreatLevel {
        self.last_threat_level
    }

    pub fn ads_blocked(&self) -> u64 {
        self.ads_blocked
    }

    pub fn trackers_blocked(&self) -> u64 {
        self.trackers_blocked
    }

    pub fn cryptojacking_blocked(&self) -> u64 {
        self.cryptojacking_blocked
    }

    /// Newest first.
    pub fn logs(&self) -> impl Iterator<Item = &LogEvent> {
        self.logs.iter()
    }

    pub fn snapshot(&self) -> ShieldSnapshot {
        ShieldSnapshot {
            ads_blocked: self.ads_blocked,
            trackers_blocked: self.trackers_blocked,
            cryptojacking_blocked: self.cryptojacking_blocked,
            stealth_mode: self.stealth_mode,
            current_identity: self.current_identity.clone(),
            last_threat_level: self.last_threat_level,
            last_threat_detected: self.last_threat_detected.clone(),
            logs: self.logs.iter().cloned().collect(),
        }
    }
}

impl Default for ShieldSession {
    fn default() -> Self {
        Self::new(&ShieldConfig::default())
    }
}

/// Synthesized background event (weights 0.3 / 0.3 / 0.4).
fn background_log<R: Rng + ?Sized>(rng: &mut R) -> LogEvent {
    let roll: f64 = rng.gen_range(0.0..1.0);
    if roll > 0.7 {
        LogEvent::new(ShieldModule::CoreEngine, LogLevel::Info, "Memory safety check passed")
    } else if roll > 0.4 {
        LogEvent::new(ShieldModule::NetworkGuard, LogLevel::Success, "DNS query encrypted (DoH)")
    } else {
        LogEvent::new(ShieldModule::StealthEngine, LogLevel::Info, "Canvas fingerprinting noise added")
    }
}
