//! Coordinateur du cœur : un propriétaire unique par sous-système.
//!
//! ## Flux d'une navigation
//!
//! ```text
//! navigate(tab, url)
//!     │  latence simulée du pont FFI (2–7 ms), hors verrou
//!     ▼
//! RequestClassifier::classify()      ← lecture seule, partagé via Arc
//!     │  (verdict, LogEvent)
//!     ▼
//! Mutex<TabLifecycleManager>         ← validation + une seule écriture
//!     │  LoadTicket (ou erreur : rien n'est journalisé)
//!     ▼
//! Mutex<ShieldSession>               ← compteurs, journal, identité
//!     │
//!     ▼
//! tâche tokio : sleep(settle) → complete_load(ticket)
//! ```
//!
//! Le shield n'est mis à jour qu'une fois la transition de l'onglet acquise :
//! un onglet planté ou fermé pendant la latence ne touche pas aux compteurs.
//! Le ticker (toutes les 2 s) prend uniquement le verrou des onglets ; la
//! navigation ne détient jamais les deux verrous à la fois.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::classifier::{ClassificationVerdict, RequestClassifier};
use crate::config::Config;
use crate::events::LogEvent;
use crate::identity::Identity;
use crate::lifecycle::{LifecycleError, LoadTicket, TabLifecycleManager, TickReport};
use crate::shield::{ShieldSession, ShieldSnapshot};
use crate::tabs::{TabId, TabSnapshot, WorkspaceId};

// ─────────────────────────────────────────────────────────────────────────────
// BrowserState : état partagé entre les tâches
// ─────────────────────────────────────────────────────────────────────────────

/// État partagé, encapsulé dans `Arc` : les tâches de stabilisation et le
/// ticker en gardent chacun une référence.
pub struct BrowserState {
    /// Classifieur immuable, utilisable sans verrou.
    pub classifier: Arc<RequestClassifier>,

    /// Session du shield (unique écrivain).
    pub shield: Mutex<ShieldSession>,

    /// Collection des onglets (unique écrivain).
    pub tabs: Mutex<TabLifecycleManager>,

    pub config: Config,
}

/// Poignée clonable sur le cœur du navigateur.
#[derive(Clone)]
pub struct Browser {
    state: Arc<BrowserState>,
}

impl Browser {
    pub fn new(config: Config) -> Self {
        let classifier = RequestClassifier::from_config(&config.filter);
        Self::with_classifier(config, classifier)
    }

    /// Construit le cœur avec un classifieur déjà prêt (listes de motifs
    /// personnalisées, tests).
    pub fn with_classifier(config: Config, classifier: RequestClassifier) -> Self {
        let shield = ShieldSession::new(&config.shield);
        let tabs = TabLifecycleManager::new(config.lifecycle.clone(), Instant::now());
        info!(
            patterns = classifier.patterns().len(),
            filter_bits = classifier.filter().size(),
            hashes = classifier.filter().hash_count(),
            "Browser core ready"
        );
        Self {
            state: Arc::new(BrowserState {
                classifier: Arc::new(classifier),
                shield: Mutex::new(shield),
                tabs: Mutex::new(tabs),
                config,
            }),
        }
    }

    pub fn state(&self) -> &Arc<BrowserState> {
        &self.state
    }

    // ── Classification ───────────────────────────────────────────────────

    /// Classification pure, sans latence ni effet sur la session.
    pub fn classify(&self, url: &str) -> (ClassificationVerdict, LogEvent) {
        self.state.classifier.classify(url)
    }

    pub fn rotate_identity(&self) -> Identity {
        self.state.classifier.rotator().generate_random()
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// Classifie `url`, fait passer l'onglet en chargement puis met à jour le
    /// shield, et programme la fin de chargement.
    pub async fn navigate(&self, id: TabId, url: &str) -> Result<ClassificationVerdict, LifecycleError> {
        // Échec rapide, sans payer la latence du pont.
        self.state.tabs.lock().await.check_navigable(id)?;

        tokio::time::sleep(self.bridge_latency()).await;
        let (verdict, log) = self.state.classifier.classify(url);

        // Revalidé sous le verrou : l'onglet a pu planter ou fermer entre-temps.
        let ticket = {
            let mut tabs = self.state.tabs.lock().await;
            tabs.navigate(id, url, &verdict, Instant::now(), &mut rand::thread_rng())?
        };

        {
            let mut shield = self.state.shield.lock().await;
            shield.record_verdict(&verdict, log);
            if let Some(identity) = shield.rotate_on_navigation(&mut rand::thread_rng()) {
                debug!(platform = identity.platform, "Stealth identity rotated for visit");
            }
        }

        self.schedule_settle(ticket);
        Ok(verdict)
    }

    fn bridge_latency(&self) -> Duration {
        let (min, max) = self.state.config.shield.bridge_latency();
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    /// Loading → Idle après le délai, sauf si un ticket plus récent existe.
    fn schedule_settle(&self, ticket: LoadTicket) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(ticket.settle_after).await;
            let mut tabs = state.tabs.lock().await;
            match tabs.complete_load(ticket.tab, ticket.ticket) {
                Ok(true) => {}
                Ok(false) => debug!(tab = %ticket.tab, "Settle superseded"),
                Err(e) => debug!(error = %e, "Settle dropped"),
            }
        })
    }

    // ── Opérations sur les onglets ───────────────────────────────────────

    pub async fn new_tab(&self) -> TabId {
        self.state.tabs.lock().await.new_tab(Instant::now())
    }

    pub async fn switch_active(&self, id: TabId) -> Result<(), LifecycleError> {
        self.state.tabs.lock().await.switch_active(id, Instant::now())
    }

    pub async fn close_tab(&self, id: TabId) -> Result<Option<TabId>, LifecycleError> {
        self.state.tabs.lock().await.close_tab(id, Instant::now())
    }

    pub async fn set_active_workspace(&self, workspace: &WorkspaceId) -> Result<TabId, LifecycleError> {
        self.state
            .tabs
            .lock()
            .await
            .set_active_workspace(workspace, Instant::now())
    }

    pub async fn move_to_workspace(&self, id: TabId, workspace: &WorkspaceId) -> Result<Option<TabId>, LifecycleError> {
        self.state
            .tabs
            .lock()
            .await
            .move_to_workspace(id, workspace, Instant::now())
    }

    pub async fn wake(&self, id: TabId) -> Result<(), LifecycleError> {
        let ticket = self.state.tabs.lock().await.wake(id, Instant::now())?;
        self.schedule_settle(ticket);
        Ok(())
    }

    pub async fn crash(&self, id: TabId) -> Result<(), LifecycleError> {
        self.state.tabs.lock().await.crash(id)
    }

    pub async fn recover(&self, id: TabId) -> Result<(), LifecycleError> {
        let ticket = self.state.tabs.lock().await.recover(id, Instant::now())?;
        self.schedule_settle(ticket);
        Ok(())
    }

    pub async fn close_pip(&self) {
        self.state.tabs.lock().await.close_pip();
    }

    pub async fn toggle_stealth(&self) -> bool {
        self.state.shield.lock().await.toggle_stealth_mode()
    }

    pub async fn toggle_freeze_debug_view(&self) -> bool {
        self.state.tabs.lock().await.toggle_freeze_debug_view()
    }

    // ── Lecture ──────────────────────────────────────────────────────────

    pub async fn tabs(&self) -> Vec<TabSnapshot> {
        self.state.tabs.lock().await.snapshot(Instant::now())
    }

    pub async fn active_tab(&self) -> Option<TabSnapshot> {
        let tabs = self.state.tabs.lock().await;
        tabs.active_tab().map(|t| t.snapshot(Instant::now()))
    }

    pub async fn pip_tab(&self) -> Option<TabId> {
        self.state.tabs.lock().await.pip_tab()
    }

    pub async fn shield_snapshot(&self) -> ShieldSnapshot {
        self.state.shield.lock().await.snapshot()
    }

    pub async fn debug_report(&self) -> Option<Vec<String>> {
        self.state.tabs.lock().await.debug_report(Instant::now())
    }

    // ── Ticker ───────────────────────────────────────────────────────────

    /// Un balayage : gel des onglets inactifs et dérive mémoire.
    pub async fn tick(&self) -> TickReport {
        let mut tabs = self.state.tabs.lock().await;
        let report = tabs.tick(Instant::now(), &mut rand::thread_rng());
        if !report.frozen.is_empty() {
            info!(
                frozen = report.frozen.len(),
                total_mb = tabs.total_memory_mb(),
                "Idle tabs frozen"
            );
        }
        report
    }

    /// Lance le ticker périodique. Le premier balayage a lieu après une
    /// période complète.
    pub fn spawn_ticker(&self) -> JoinHandle<()> {
        let browser = self.clone();
        let period = self.state.config.lifecycle.tick_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                browser.tick().await;
            }
        })
    }
}
