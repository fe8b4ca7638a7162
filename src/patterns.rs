//! Liste des motifs bloqués (domaines, scripts, mots-clés).
//!
//! Construite une seule fois au démarrage puis figée : l'ordre
//! d'enregistrement fait foi pour la priorité du scan (le premier motif
//! enregistré gagne en cas d'égalité).
//!
//! ## Sources, dans l'ordre d'ajout
//!
//! 1. Motifs intégrés ([`BUILTIN_PATTERNS`])
//! 2. Fichiers `*.txt` du dossier `resources/patterns/` (un motif par ligne,
//!    `#` pour les commentaires), triés par nom de fichier
//! 3. `extra_patterns` de la configuration

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Motifs connus, dans leur ordre de priorité.
pub const BUILTIN_PATTERNS: &[&str] = &[
    "doubleclick.net",
    "analytics.google.com",
    "facebook.pixel.com",
    "hotjar.com",
    "segment.io",
    "coinhive.com",
    "miner.js",
    "ads-twitter.com",
    "tracker",
    "telemetry",
    "adservice",
];

/// Ensemble ordonné et immuable de motifs, en minuscules, sans doublons.
#[derive(Debug, Clone, Default)]
pub struct BlockedPatternSet {
    patterns: Vec<String>,
}

impl BlockedPatternSet {
    /// Construit l'ensemble à partir d'une séquence ordonnée.
    /// Les entrées vides et les doublons sont ignorés.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = PatternSetBuilder::default();
        for p in patterns {
            builder.push(p.as_ref());
        }
        builder.build()
    }

    pub fn builtin() -> Self {
        Self::from_patterns(BUILTIN_PATTERNS)
    }

    /// Motifs intégrés + fichiers du dossier de motifs + motifs en config.
    pub fn load(patterns_dir: Option<&Path>, extra: &[String]) -> Self {
        let mut builder = PatternSetBuilder::default();
        for p in BUILTIN_PATTERNS {
            builder.push(p);
        }

        let dir = patterns_dir.map(Path::to_path_buf).or_else(find_patterns_dir);
        if let Some(dir) = dir {
            builder.push_dir(&dir);
        }

        for p in extra {
            builder.push(p);
        }

        let set = builder.build();
        info!(count = set.len(), "Blocked pattern set ready");
        set
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[derive(Default)]
struct PatternSetBuilder {
    patterns: Vec<String>,
    seen: HashSet<String>,
}

impl PatternSetBuilder {
    fn push(&mut self, raw: &str) {
        let pattern = raw.trim().to_lowercase();
        if pattern.is_empty() || pattern.starts_with('#') {
            return;
        }
        if self.seen.insert(pattern.clone()) {
            self.patterns.push(pattern);
        }
    }

    fn push_dir(&mut self, dir: &Path) {
        let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
                .collect(),
            Err(e) => {
                warn!("Impossible de lire {} : {}", dir.display(), e);
                return;
            }
        };
        files.sort();

        for path in files {
            match fs::read_to_string(&path) {
                Ok(content) => {
                    let before = self.patterns.len();
                    for line in content.lines() {
                        self.push(line);
                    }
                    info!(
                        "Liste de motifs chargée : {} ({} nouveaux)",
                        path.display(),
                        self.patterns.len() - before
                    );
                }
                Err(e) => {
                    warn!("Impossible de lire {} : {}", path.display(), e);
                }
            }
        }
    }

    fn build(self) -> BlockedPatternSet {
        BlockedPatternSet {
            patterns: self.patterns,
        }
    }
}

/// Cherche le dossier `resources/patterns/`.
fn find_patterns_dir() -> Option<PathBuf> {
    // 1. Variable d'environnement
    if let Ok(path) = std::env::var("SANDA_RESOURCES_PATH") {
        let path = PathBuf::from(path).join("patterns");
        if path.is_dir() {
            return Some(path);
        }
    }

    // 2. À côté de l'exécutable
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let path = dir.join("resources").join("patterns");
        if path.is_dir() {
            return Some(path);
        }
    }

    // 3. Répertoire courant
    let path = PathBuf::from("resources").join("patterns");
    if path.is_dir() {
        return Some(path);
    }

    None
}
