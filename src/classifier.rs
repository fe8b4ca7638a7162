//! Classification des requêtes de navigation.
//!
//! Décide si une URL cible est essentielle, un média, un traqueur ou un
//! code malveillant, et produit l'événement de journal correspondant.
//!
//! ## Ordre d'évaluation (le premier qui correspond gagne)
//!
//! ```text
//! 1. extension média (.jpg .jpeg .png .gif .mp4 .webp) → Media, autorisé
//! 2. scan ordonné des motifs (ordre d'enregistrement) confirmé par le filtre
//! 3.   motif trouvé + "miner"/"coin" → Malicious / Critical, bloqué
//!      motif trouvé sinon            → Tracking / High, bloqué
//! 4. aucun motif                     → Essential, identité usurpée tirée
//! ```
//!
//! La classification n'échoue jamais : une URL inconnue ou mal formée tombe
//! dans la branche Essential (fail-open).

use rand::Rng;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::bloom::MembershipFilter;
use crate::config::FilterConfig;
use crate::events::{LogEvent, LogLevel, ShieldModule, now_millis};
use crate::identity::IdentityRotator;
use crate::patterns::BlockedPatternSet;

/// Extensions jamais bloquées, même si l'hôte ressemble à un traqueur.
pub const MEDIA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "mp4", "webp"];

/// Mots-clés qui font passer un motif bloqué en catégorie malveillante.
const MINING_KEYWORDS: &[&str] = &["miner", "coin"];

/// Gravité ordonnée d'une requête bloquée.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ThreatLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestCategory {
    Essential,
    Media,
    Tracking,
    Malicious,
    Unknown,
}

/// Verdict produit pour une requête, consommé aussitôt par le shield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationVerdict {
    pub is_blocked: bool,
    pub reason: String,
    pub threat_level: ThreatLevel,
    pub category: RequestCategory,
    /// Millisecondes depuis l'epoch Unix.
    pub timestamp: u64,
}

/// Classifieur : liste de motifs figée + filtre de Bloom + rotateur.
///
/// Toutes les données sont en lecture seule après construction, donc
/// `classify()` peut être appelé depuis plusieurs tâches sans coordination.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    patterns: BlockedPatternSet,
    filter: MembershipFilter,
    rotator: IdentityRotator,
}

impl RequestClassifier {
    pub fn new(patterns: BlockedPatternSet, filter_size: usize, hash_count: u32) -> Self {
        let filter = MembershipFilter::rebuild(filter_size, hash_count, patterns.iter());
        Self {
            patterns,
            filter,
            rotator: IdentityRotator,
        }
    }

    /// Charge les motifs selon la configuration et construit le filtre.
    pub fn from_config(config: &FilterConfig) -> Self {
        let patterns = BlockedPatternSet::load(config.patterns_dir.as_deref(), &config.extra_patterns);
        Self::new(patterns, config.size, config.hash_count)
    }

    pub fn patterns(&self) -> &BlockedPatternSet {
        &self.patterns
    }

    pub fn filter(&self) -> &MembershipFilter {
        &self.filter
    }

    pub fn rotator(&self) -> IdentityRotator {
        self.rotator
    }

    pub fn classify(&self, url: &str) -> (ClassificationVerdict, LogEvent) {
        self.classify_with(url, &mut rand::thread_rng())
    }

    /// Variante déterministe : l'identité de la branche Essential est tirée
    /// avec `rng`.
    pub fn classify_with<R: Rng + ?Sized>(
        &self,
        url: &str,
        rng: &mut R,
    ) -> (ClassificationVerdict, LogEvent) {
        let clean = url.to_lowercase();

        // 1. Media
        if is_media(&clean) {
            let name = clean.rsplit('/').next().unwrap_or(clean.as_str());
            let log = LogEvent::new(
                ShieldModule::NetworkGuard,
                LogLevel::Info,
                format!("Media resource passed: {name}"),
            );
            return (
                verdict(false, "Media Resource Allowed".into(), ThreatLevel::None, RequestCategory::Media),
                log,
            );
        }

        // 2. Scan ordonné des motifs
        if let Some(pattern) = self.first_match(&clean) {
            let malicious = MINING_KEYWORDS
                .iter()
                .any(|k| pattern.contains(k) || clean.contains(k));
            debug!(url, pattern, malicious, "Blocked pattern matched");

            return if malicious {
                (
                    verdict(
                        true,
                        format!("Miner Terminated: {pattern}"),
                        ThreatLevel::Critical,
                        RequestCategory::Malicious,
                    ),
                    LogEvent::new(
                        ShieldModule::CoreEngine,
                        LogLevel::Danger,
                        format!("Crypto-miner signature detected: {pattern}"),
                    ),
                )
            } else {
                (
                    verdict(
                        true,
                        format!("Packet Intercepted: {pattern}"),
                        ThreatLevel::High,
                        RequestCategory::Tracking,
                    ),
                    LogEvent::new(
                        ShieldModule::PrivacyShield,
                        LogLevel::Warning,
                        format!("Tracker blocked in bloom filter: {pattern}"),
                    ),
                )
            };
        }

        // 3. Essential : rotation d'identité par requête
        let identity = self.rotator.generate_with(rng);
        (
            verdict(
                false,
                format!("Spoofed to {}", identity.platform),
                ThreatLevel::None,
                RequestCategory::Essential,
            ),
            LogEvent::new(
                ShieldModule::StealthEngine,
                LogLevel::Success,
                format!("Identity spoofed to {} for privacy", identity.platform),
            ),
        )
    }

    /// Premier motif (ordre d'enregistrement) présent dans l'URL et confirmé
    /// par le filtre.
    fn first_match(&self, clean_url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| clean_url.contains(p) && self.filter.query(p))
    }
}

fn verdict(
    is_blocked: bool,
    reason: String,
    threat_level: ThreatLevel,
    category: RequestCategory,
) -> ClassificationVerdict {
    ClassificationVerdict {
        is_blocked,
        reason,
        threat_level,
        category,
        timestamp: now_millis(),
    }
}

/// Extension média en fin d'URL complète (hôte ou requête compris), ou en
/// fin de chemin si l'URL se parse.
fn is_media(clean_url: &str) -> bool {
    let has_media_ext = |s: &str| {
        s.rsplit_once('.')
            .is_some_and(|(_, ext)| MEDIA_EXTENSIONS.contains(&ext))
    };
    has_media_ext(clean_url) || Url::parse(clean_url).is_ok_and(|parsed| has_media_ext(parsed.path()))
}
