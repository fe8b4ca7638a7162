//! Stealth identity engine.
//!
//! Spoofed client identities are drawn atomically from a fixed pool of
//! hand-correlated profiles. Fields are never mixed across profiles: a macOS
//! platform string always travels with the Safari user-agent and its
//! matching vendor and screen resolution.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

/// Complete spoofed client fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_agent: &'static str,
    pub platform: &'static str,
    pub vendor: &'static str,
    pub screen_resolution: &'static str,
}

/// Fixed profile pool.
pub const PROFILES: &[Identity] = &[
    Identity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        platform: "Win32",
        vendor: "Google Inc.",
        screen_resolution: "1920x1080",
    },
    Identity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        platform: "MacIntel",
        vendor: "Apple Computer, Inc.",
        screen_resolution: "2560x1600",
    },
    Identity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        platform: "Linux x86_64",
        vendor: "Google Inc.",
        screen_resolution: "1366x768",
    },
];

/// Stateless identity generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRotator;

impl IdentityRotator {
    /// Picks one profile uniformly using the thread-local RNG.
    pub fn generate_random(&self) -> Identity {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Same as [`generate_random`](Self::generate_random) with a caller RNG.
    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Identity {
        // The pool is a non-empty constant.
        PROFILES.choose(rng).cloned().unwrap_or_else(|| PROFILES[0].clone())
    }

    pub fn rotate_user_agent(&self) -> &'static str {
        self.generate_random().user_agent
    }
}
