//! Onglets et espaces de travail.
//!
//! Types de données purs ; toutes les transitions vivent dans
//! [`lifecycle`](crate::lifecycle).

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use url::Url;

/// Préfixe des pages internes (jamais gelées, score 100).
pub const INTERNAL_SCHEME: &str = "browser://";

pub const NEW_TAB_URL: &str = "browser://newtab";
pub const NEW_TAB_TITLE: &str = "New Tab";

/// Identifiant stable pour toute la durée de vie de l'onglet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct WorkspaceId(pub String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkspaceIcon {
    Briefcase,
    Coffee,
    Code,
    Zap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub icon: WorkspaceIcon,
}

/// Espaces de travail par défaut ; `personal` est actif au démarrage.
pub fn default_workspaces() -> Vec<Workspace> {
    [
        ("personal", "Personal", WorkspaceIcon::Coffee),
        ("work", "Work", WorkspaceIcon::Briefcase),
        ("dev", "Development", WorkspaceIcon::Code),
        ("focus", "Focus", WorkspaceIcon::Zap),
    ]
    .into_iter()
    .map(|(id, name, icon)| Workspace {
        id: WorkspaceId::new(id),
        name: name.to_string(),
        icon,
    })
    .collect()
}

/// État d'un onglet. Le PiP n'en fait pas partie : c'est un drapeau
/// orthogonal porté par le gestionnaire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TabState {
    Loading,
    Idle,
    Frozen,
    Crashed,
}

impl fmt::Display for TabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TabState::Loading => "Loading",
            TabState::Idle => "Idle",
            TabState::Frozen => "Frozen",
            TabState::Crashed => "Crashed",
        })
    }
}

/// Moteur de rendu choisi par heuristique sur l'URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Engine {
    WebF,
    Servo,
}

impl Engine {
    /// `webf` ou `app` dans l'URL → WebF, sinon Servo.
    pub fn for_url(url: &str) -> Self {
        if url.contains("webf") || url.contains("app") {
            Engine::WebF
        } else {
            Engine::Servo
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tab {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub state: TabState,
    pub engine: Engine,
    pub security_score: u8,
    pub memory_usage_mb: f64,
    pub last_active: Instant,
    pub workspace_id: WorkspaceId,
    pub is_video: bool,
    /// Incrémenté à chaque Navigate/Wake/Recover ; une fin de chargement
    /// portant un ancien ticket est ignorée.
    pub(crate) load_ticket: u64,
    pub(crate) settle_at: Option<Instant>,
}

impl Tab {
    /// Onglet « Nouvel onglet » par défaut.
    pub fn new_default(id: TabId, workspace_id: WorkspaceId, memory_mb: f64, now: Instant) -> Self {
        Self {
            id,
            url: NEW_TAB_URL.to_string(),
            title: NEW_TAB_TITLE.to_string(),
            state: TabState::Idle,
            engine: Engine::WebF,
            security_score: 100,
            memory_usage_mb: memory_mb,
            last_active: now,
            workspace_id,
            is_video: false,
            load_ticket: 0,
            settle_at: None,
        }
    }

    pub fn is_internal(&self) -> bool {
        is_internal_url(&self.url)
    }

    pub fn is_loading(&self) -> bool {
        self.state == TabState::Loading
    }

    pub fn is_frozen(&self) -> bool {
        self.state == TabState::Frozen
    }

    pub fn is_crashed(&self) -> bool {
        self.state == TabState::Crashed
    }

    /// Copie sérialisable, horodatage exprimé en durée d'inactivité.
    pub fn snapshot(&self, now: Instant) -> TabSnapshot {
        TabSnapshot {
            id: self.id,
            url: self.url.clone(),
            title: self.title.clone(),
            state: self.state,
            engine: self.engine,
            security_score: self.security_score,
            memory_usage_mb: self.memory_usage_mb,
            idle_ms: now.saturating_duration_since(self.last_active).as_millis() as u64,
            workspace_id: self.workspace_id.clone(),
            is_video: self.is_video,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub url: String,
    pub title: String,
    pub state: TabState,
    pub engine: Engine,
    pub security_score: u8,
    pub memory_usage_mb: f64,
    pub idle_ms: u64,
    pub workspace_id: WorkspaceId,
    pub is_video: bool,
}

pub fn is_internal_url(url: &str) -> bool {
    url.starts_with(INTERNAL_SCHEME)
}

/// `youtube` ou `video` dans l'URL.
pub fn is_video_url(url: &str) -> bool {
    url.contains("youtube") || url.contains("video")
}

/// Titre affiché : l'hôte si l'URL se parse, sinon le premier segment
/// après le schéma.
pub fn title_for_url(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url)
        && let Some(host) = parsed.host_str()
    {
        return host.to_string();
    }
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest).to_string()
}
