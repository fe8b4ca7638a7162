//! Tab lifecycle state machine.
//!
//! ```text
//!  Navigate ─► Loading ──(settle)──► Idle ──(idle ≥ 15 s, background)──► Frozen
//!                 ▲                   │                                     │
//!                 │                   └──── Crash ──► Crashed                │
//!                 │                                     │                   │
//!                 └──────────── Recover ◄───────────────┘      Wake ◄───────┘
//! ```
//!
//! PiP is an orthogonal flag held by the manager, attached to at most one
//! tab. Time never comes from a hidden clock: every operation takes `now`,
//! and the periodic sweep is [`TabLifecycleManager::tick`]. Settle
//! transitions carry a ticket so a newer Navigate/Wake/Recover on the same
//! tab supersedes an older pending one.

use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info};

use crate::classifier::{ClassificationVerdict, ThreatLevel};
use crate::config::LifecycleConfig;
use crate::tabs::{
    Engine, Tab, TabId, TabSnapshot, TabState, Workspace, WorkspaceId, default_workspaces,
    is_internal_url, is_video_url, title_for_url,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0} not found")]
    NotFound(TabId),
    #[error("cannot {op} {id}: tab is {from}")]
    InvalidTransition {
        id: TabId,
        from: TabState,
        op: &'static str,
    },
    #[error("unknown workspace `{0}`")]
    UnknownWorkspace(WorkspaceId),
}

/// Pending Loading → Idle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub tab: TabId,
    pub ticket: u64,
    pub settle_after: Duration,
}

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub frozen: Vec<TabId>,
    pub settled: Vec<TabId>,
}

#[derive(Debug)]
pub struct TabLifecycleManager {
    tabs: Vec<Tab>,
    workspaces: Vec<Workspace>,
    active_workspace: WorkspaceId,
    active_tab: TabId,
    pip_tab: Option<TabId>,
    next_id: u64,
    debug_view: bool,
    config: LifecycleConfig,
}

impl TabLifecycleManager {
    /// Starts with the default workspaces and one new tab in the first one.
    pub fn new(config: LifecycleConfig, now: Instant) -> Self {
        let workspaces = default_workspaces();
        let active_workspace = workspaces[0].id.clone();
        let mut manager = Self {
            tabs: Vec::new(),
            workspaces,
            active_workspace: active_workspace.clone(),
            active_tab: TabId(0),
            pip_tab: None,
            next_id: 1,
            debug_view: false,
            config,
        };
        manager.active_tab = manager.push_default_tab(active_workspace, now);
        manager
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, id: TabId) -> Result<&Tab, LifecycleError> {
        self.tabs
            .iter()
            .find(|t| t.id == id)
            .ok_or(LifecycleError::NotFound(id))
    }

    pub fn active_tab_id(&self) -> TabId {
        self.active_tab
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(self.active_tab).ok()
    }

    pub fn pip_tab(&self) -> Option<TabId> {
        self.pip_tab
    }

    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    pub fn active_workspace(&self) -> &WorkspaceId {
        &self.active_workspace
    }

    pub fn workspace_tabs<'a>(&'a self, workspace: &'a WorkspaceId) -> impl Iterator<Item = &'a Tab> {
        self.tabs.iter().filter(move |t| &t.workspace_id == workspace)
    }

    pub fn total_memory_mb(&self) -> f64 {
        round_tenth(self.tabs.iter().map(|t| t.memory_usage_mb).sum())
    }

    pub fn snapshot(&self, now: Instant) -> Vec<TabSnapshot> {
        self.tabs.iter().map(|t| t.snapshot(now)).collect()
    }

    pub fn debug_view(&self) -> bool {
        self.debug_view
    }

    pub fn toggle_freeze_debug_view(&mut self) -> bool {
        self.debug_view = !self.debug_view;
        self.debug_view
    }

    /// One line per tab while the debug view is on.
    pub fn debug_report(&self, now: Instant) -> Option<Vec<String>> {
        if !self.debug_view {
            return None;
        }
        Some(
            self.tabs
                .iter()
                .map(|t| {
                    let mut flags = String::new();
                    if t.id == self.active_tab {
                        flags.push_str(" [active]");
                    }
                    if Some(t.id) == self.pip_tab {
                        flags.push_str(" [pip]");
                    }
                    format!(
                        "{} {:<8} {:?} {:>6.1} MB idle {:>3}s score {:>3} {}{}",
                        t.id,
                        t.state,
                        t.engine,
                        t.memory_usage_mb,
                        now.saturating_duration_since(t.last_active).as_secs(),
                        t.security_score,
                        t.url,
                        flags
                    )
                })
                .collect(),
        )
    }

    // ── Tab creation / removal ───────────────────────────────────────────

    /// Opens a new tab in the active workspace and focuses it.
    pub fn new_tab(&mut self, now: Instant) -> TabId {
        let workspace = self.active_workspace.clone();
        let id = self.push_default_tab(workspace, now);
        self.active_tab = id;
        info!(tab = %id, workspace = %self.active_workspace, "New tab");
        id
    }

    /// Closes a tab. Returns the replacement tab created when the close
    /// emptied its workspace.
    pub fn close_tab(&mut self, id: TabId, now: Instant) -> Result<Option<TabId>, LifecycleError> {
        let index = self.index_of(id)?;
        let closed = self.tabs.remove(index);

        if self.pip_tab == Some(id) {
            self.pip_tab = None;
        }

        let replacement = if self.workspace_tabs(&closed.workspace_id).next().is_none() {
            Some(self.push_default_tab(closed.workspace_id.clone(), now))
        } else {
            None
        };

        if self.active_tab == id {
            // Last remaining tab of the same workspace takes focus.
            let next = self.workspace_tabs(&closed.workspace_id).last().map(|t| t.id);
            if let Some(next) = next {
                self.active_tab = next;
            }
        }

        info!(tab = %id, replacement = ?replacement, "Tab closed");
        Ok(replacement)
    }

    /// Moves a tab to another workspace. Returns the replacement created in
    /// the source workspace if it became empty.
    pub fn move_to_workspace(
        &mut self,
        id: TabId,
        workspace: &WorkspaceId,
        now: Instant,
    ) -> Result<Option<TabId>, LifecycleError> {
        self.ensure_workspace(workspace)?;
        let index = self.index_of(id)?;
        let source = std::mem::replace(&mut self.tabs[index].workspace_id, workspace.clone());
        if &source == workspace {
            return Ok(None);
        }

        let replacement = if self.workspace_tabs(&source).next().is_none() {
            Some(self.push_default_tab(source.clone(), now))
        } else {
            None
        };

        if self.active_tab == id {
            // Focus stays in the workspace on screen.
            let next = self.workspace_tabs(&source).last().map(|t| t.id);
            if let Some(next) = next {
                self.active_tab = next;
            }
        }
        Ok(replacement)
    }

    // ── Focus ────────────────────────────────────────────────────────────

    /// Focuses `id`. A playing video tab losing focus becomes the PiP tab;
    /// focusing the PiP tab clears PiP.
    pub fn switch_active(&mut self, id: TabId, now: Instant) -> Result<(), LifecycleError> {
        let target = self.index_of(id)?;

        let to_pip = self
            .tab(self.active_tab)
            .ok()
            .filter(|current| current.is_video && current.id != id && !current.is_crashed())
            .map(|current| current.id);
        if let Some(pip) = to_pip {
            debug!(tab = %pip, "Video tab moved to picture-in-picture");
            self.pip_tab = Some(pip);
        }
        if self.pip_tab == Some(id) {
            self.pip_tab = None;
        }

        let tab = &mut self.tabs[target];
        tab.last_active = now;
        self.active_workspace = tab.workspace_id.clone();
        self.active_tab = id;
        Ok(())
    }

    pub fn close_pip(&mut self) {
        self.pip_tab = None;
    }

    /// Shows `workspace`, focusing its first tab or opening one if empty.
    pub fn set_active_workspace(&mut self, workspace: &WorkspaceId, now: Instant) -> Result<TabId, LifecycleError> {
        self.ensure_workspace(workspace)?;
        self.active_workspace = workspace.clone();

        let current_in_workspace = self
            .tab(self.active_tab)
            .is_ok_and(|t| &t.workspace_id == workspace);
        if current_in_workspace {
            return Ok(self.active_tab);
        }

        let first = self.workspace_tabs(workspace).next().map(|t| t.id);
        match first {
            Some(first) => {
                self.switch_active(first, now)?;
                Ok(first)
            }
            None => Ok(self.new_tab(now)),
        }
    }

    // ── State transitions ────────────────────────────────────────────────

    /// Ok if `navigate` would accept the tab: it exists and is not Crashed.
    pub fn check_navigable(&self, id: TabId) -> Result<(), LifecycleError> {
        let tab = self.tab(id)?;
        if tab.is_crashed() {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: tab.state,
                op: "navigate",
            });
        }
        Ok(())
    }

    /// Any state except Crashed → Loading, applying the classifier verdict
    /// to the security score.
    pub fn navigate<R: Rng + ?Sized>(
        &mut self,
        id: TabId,
        url: &str,
        verdict: &ClassificationVerdict,
        now: Instant,
        rng: &mut R,
    ) -> Result<LoadTicket, LifecycleError> {
        let settle = Duration::from_millis(self.config.navigate_settle_ms);
        let memory = self.config.navigate_memory_mb;
        self.check_navigable(id)?;
        let tab = self.tab_mut(id)?;

        let score = security_score(url, verdict, rng);
        tab.url = url.to_string();
        tab.title = title_for_url(url);
        tab.engine = Engine::for_url(url);
        tab.is_video = is_video_url(url);
        tab.security_score = score;
        tab.memory_usage_mb = memory;

        info!(tab = %id, url, score, engine = ?tab.engine, "Navigating");
        Ok(begin_loading(tab, now, settle))
    }

    /// Frozen → Loading, restoring an active-level memory estimate.
    pub fn wake(&mut self, id: TabId, now: Instant) -> Result<LoadTicket, LifecycleError> {
        let settle = Duration::from_millis(self.config.wake_settle_ms);
        let memory = self.config.wake_memory_mb;
        let tab = self.tab_mut(id)?;
        if !tab.is_frozen() {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: tab.state,
                op: "wake",
            });
        }
        tab.memory_usage_mb = memory;
        info!(tab = %id, "Waking frozen tab");
        Ok(begin_loading(tab, now, settle))
    }

    /// Simulated fatal fault. Manual only; stays Crashed until recovered.
    pub fn crash(&mut self, id: TabId) -> Result<(), LifecycleError> {
        let tab = self.tab_mut(id)?;
        if tab.is_crashed() {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: tab.state,
                op: "crash",
            });
        }
        tab.state = TabState::Crashed;
        tab.settle_at = None;
        tab.load_ticket += 1;
        if self.pip_tab == Some(id) {
            self.pip_tab = None;
        }
        info!(tab = %id, "Tab crashed");
        Ok(())
    }

    /// Crashed → Loading.
    pub fn recover(&mut self, id: TabId, now: Instant) -> Result<LoadTicket, LifecycleError> {
        let settle = Duration::from_millis(self.config.recover_settle_ms);
        let tab = self.tab_mut(id)?;
        if !tab.is_crashed() {
            return Err(LifecycleError::InvalidTransition {
                id,
                from: tab.state,
                op: "recover",
            });
        }
        info!(tab = %id, "Recovering crashed tab");
        Ok(begin_loading(tab, now, settle))
    }

    /// Loading → Idle if `ticket` is still the latest one for the tab.
    /// Returns whether the transition happened.
    pub fn complete_load(&mut self, id: TabId, ticket: u64) -> Result<bool, LifecycleError> {
        let tab = self.tab_mut(id)?;
        if tab.is_loading() && tab.load_ticket == ticket {
            tab.state = TabState::Idle;
            tab.settle_at = None;
            debug!(tab = %id, "Load settled");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // ── Periodic sweep ───────────────────────────────────────────────────

    /// Settles due loads, drifts memory estimates and freezes idle
    /// background tabs.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> TickReport {
        let mut report = TickReport::default();
        let idle_limit = self.config.idle_freeze();
        let c = &self.config;

        for tab in &mut self.tabs {
            if tab.is_loading() && tab.settle_at.is_some_and(|at| at <= now) {
                tab.state = TabState::Idle;
                tab.settle_at = None;
                report.settled.push(tab.id);
            }

            let is_active = tab.id == self.active_tab;
            let is_pip = Some(tab.id) == self.pip_tab;

            tab.memory_usage_mb = if is_active {
                let drift = rng.gen_range(-4.0..6.0);
                round_tenth((tab.memory_usage_mb + drift).clamp(c.active_min_mb, c.active_max_mb))
            } else if tab.is_frozen() {
                c.frozen_memory_mb
            } else {
                round_tenth((tab.memory_usage_mb - c.background_decay_mb).max(c.background_floor_mb))
            };

            let idle_for = now.saturating_duration_since(tab.last_active);
            if !is_active
                && !is_pip
                && tab.state == TabState::Idle
                && !tab.is_internal()
                && idle_for >= idle_limit
            {
                tab.state = TabState::Frozen;
                tab.memory_usage_mb = c.frozen_memory_mb;
                debug!(tab = %tab.id, idle_secs = idle_for.as_secs(), "Tab frozen");
                report.frozen.push(tab.id);
            }
        }

        report
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn push_default_tab(&mut self, workspace: WorkspaceId, now: Instant) -> TabId {
        let id = TabId(self.next_id);
        self.next_id += 1;
        self.tabs
            .push(Tab::new_default(id, workspace, self.config.new_tab_memory_mb, now));
        id
    }

    fn index_of(&self, id: TabId) -> Result<usize, LifecycleError> {
        self.tabs
            .iter()
            .position(|t| t.id == id)
            .ok_or(LifecycleError::NotFound(id))
    }

    fn tab_mut(&mut self, id: TabId) -> Result<&mut Tab, LifecycleError> {
        self.tabs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(LifecycleError::NotFound(id))
    }

    fn ensure_workspace(&self, workspace: &WorkspaceId) -> Result<(), LifecycleError> {
        if self.workspaces.iter().any(|w| &w.id == workspace) {
            Ok(())
        } else {
            Err(LifecycleError::UnknownWorkspace(workspace.clone()))
        }
    }
}

fn begin_loading(tab: &mut Tab, now: Instant, settle: Duration) -> LoadTicket {
    tab.state = TabState::Loading;
    tab.last_active = now;
    tab.load_ticket += 1;
    tab.settle_at = Some(now + settle);
    LoadTicket {
        tab: tab.id,
        ticket: tab.load_ticket,
        settle_after: settle,
    }
}

/// 100 for internal pages, else 65–99; minus 100 / 40 / 15 for a
/// Critical / High / other blocked verdict, floored at 0.
fn security_score<R: Rng + ?Sized>(url: &str, verdict: &ClassificationVerdict, rng: &mut R) -> u8 {
    let base: u8 = if is_internal_url(url) {
        100
    } else {
        rng.gen_range(65..100)
    };
    if !verdict.is_blocked {
        return base;
    }
    let penalty = match verdict.threat_level {
        ThreatLevel::Critical => 100,
        ThreatLevel::High => 40,
        _ => 15,
    };
    base.saturating_sub(penalty)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RequestClassifier;
    use crate::patterns::BlockedPatternSet;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn verdict_for(url: &str) -> ClassificationVerdict {
        RequestClassifier::new(BlockedPatternSet::builtin(), 100_000, 3)
            .classify(url)
            .0
    }

    /// Manager with one settled background tab on `url` and a fresh active tab.
    fn with_background(url: &str, t0: Instant, rng: &mut StdRng) -> (TabLifecycleManager, TabId) {
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let bg = m.active_tab_id();
        let ticket = m.navigate(bg, url, &verdict_for(url), t0, rng).unwrap();
        assert!(m.complete_load(bg, ticket.ticket).unwrap());
        m.new_tab(t0);
        (m, bg)
    }

    #[test]
    fn test_idle_background_tab_freezes() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(1);
        let (mut m, bg) = with_background("https://example.com/", t0, &mut rng);

        let report = m.tick(t0 + secs(20), &mut rng);
        assert_eq!(report.frozen, vec![bg]);
        let tab = m.tab(bg).unwrap();
        assert_eq!(tab.state, TabState::Frozen);
        assert!((tab.memory_usage_mb - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_freeze_happens_once_per_idle_episode() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(2);
        let (mut m, bg) = with_background("https://example.com/", t0, &mut rng);

        let mut freezes = 0;
        for step in 0..20 {
            let report = m.tick(t0 + secs(2 * step), &mut rng);
            freezes += report.frozen.iter().filter(|id| **id == bg).count();
            if step >= 8 {
                assert_eq!(m.tab(bg).unwrap().state, TabState::Frozen);
            }
        }
        assert_eq!(freezes, 1);
    }

    #[test]
    fn test_not_frozen_before_threshold() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(3);
        let (mut m, bg) = with_background("https://example.com/", t0, &mut rng);
        m.tick(t0 + secs(14), &mut rng);
        assert_eq!(m.tab(bg).unwrap().state, TabState::Idle);
    }

    #[test]
    fn test_exempt_tabs_never_freeze() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(4);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);

        // Internal page in the background.
        let internal = m.active_tab_id();
        // Crashed page in the background.
        let crashed = m.new_tab(t0);
        m.navigate(crashed, "https://example.com/", &verdict_for("https://example.com/"), t0, &mut rng)
            .unwrap();
        m.crash(crashed).unwrap();
        // Video tab that goes to PiP.
        let video = m.new_tab(t0);
        let url = "https://www.youtube.com/watch?v=1";
        let t = m.navigate(video, url, &verdict_for(url), t0, &mut rng).unwrap();
        m.complete_load(video, t.ticket).unwrap();
        let active = m.new_tab(t0);
        m.switch_active(video, t0).unwrap();
        m.switch_active(active, t0).unwrap();
        assert_eq!(m.pip_tab(), Some(video));

        let report = m.tick(t0 + secs(60), &mut rng);
        assert!(report.frozen.is_empty(), "{report:?}");
        assert_eq!(m.tab(internal).unwrap().state, TabState::Idle);
        assert_eq!(m.tab(crashed).unwrap().state, TabState::Crashed);
        assert_eq!(m.tab(video).unwrap().state, TabState::Idle);
        assert_eq!(m.tab(active).unwrap().state, TabState::Idle);
    }

    #[test]
    fn test_active_tab_not_frozen_and_memory_in_band() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(5);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();
        let url = "https://example.com/";
        m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();

        for step in 1..200 {
            m.tick(t0 + secs(2 * step), &mut rng);
            let tab = m.tab(id).unwrap();
            assert_ne!(tab.state, TabState::Frozen);
            assert!((40.0..=150.0).contains(&tab.memory_usage_mb), "{}", tab.memory_usage_mb);
        }
    }

    #[test]
    fn test_background_memory_decays_to_floor() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(6);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let bg = m.active_tab_id();
        let url = "https://example.com/";
        m.navigate(bg, url, &verdict_for(url), t0, &mut rng).unwrap();
        m.new_tab(t0);

        m.tick(t0 + Duration::from_millis(900), &mut rng);
        assert_eq!(m.tab(bg).unwrap().memory_usage_mb, 30.5);
        m.tick(t0 + secs(2), &mut rng);
        m.tick(t0 + secs(4), &mut rng);
        m.tick(t0 + secs(6), &mut rng);
        assert_eq!(m.tab(bg).unwrap().memory_usage_mb, 15.5);
        m.tick(t0 + secs(8), &mut rng);
        assert_eq!(m.tab(bg).unwrap().memory_usage_mb, 15.0);
    }

    #[test]
    fn test_close_last_tab_of_workspace_leaves_one() {
        let t0 = Instant::now();
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let ws = m.active_workspace().clone();
        let only = m.active_tab_id();

        let replacement = m.close_tab(only, t0).unwrap().expect("replacement tab");
        assert_eq!(m.workspace_tabs(&ws).count(), 1);
        assert_eq!(m.active_tab_id(), replacement);
        assert_eq!(m.tab(replacement).unwrap().url, crate::tabs::NEW_TAB_URL);
        assert_eq!(m.close_tab(only, t0), Err(LifecycleError::NotFound(only)));
    }

    #[test]
    fn test_close_active_focuses_last_in_workspace() {
        let t0 = Instant::now();
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let first = m.active_tab_id();
        let second = m.new_tab(t0);
        let third = m.new_tab(t0);
        m.switch_active(second, t0).unwrap();

        assert_eq!(m.close_tab(second, t0).unwrap(), None);
        assert_eq!(m.active_tab_id(), third);
        assert!(m.tab(first).is_ok());
    }

    #[test]
    fn test_close_pip_tab_clears_pip() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(7);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let video = m.active_tab_id();
        let url = "https://video.example/live";
        m.navigate(video, url, &verdict_for(url), t0, &mut rng).unwrap();
        let other = m.new_tab(t0);
        m.switch_active(video, t0).unwrap();
        m.switch_active(other, t0).unwrap();
        assert_eq!(m.pip_tab(), Some(video));

        m.close_tab(video, t0).unwrap();
        assert_eq!(m.pip_tab(), None);
    }

    #[test]
    fn test_pip_set_on_leave_and_cleared_on_return() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(8);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let video = m.active_tab_id();
        let url = "https://www.youtube.com/watch?v=abc";
        m.navigate(video, url, &verdict_for(url), t0, &mut rng).unwrap();
        assert!(m.tab(video).unwrap().is_video);

        let other = m.new_tab(t0);
        m.switch_active(video, t0).unwrap();
        m.switch_active(other, t0 + secs(1)).unwrap();
        assert_eq!(m.pip_tab(), Some(video));

        m.switch_active(video, t0 + secs(2)).unwrap();
        assert_eq!(m.pip_tab(), None);
        assert_eq!(m.tab(video).unwrap().last_active, t0 + secs(2));
    }

    #[test]
    fn test_crashed_video_tab_does_not_enter_pip() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(9);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let video = m.active_tab_id();
        let url = "https://video.example/";
        m.navigate(video, url, &verdict_for(url), t0, &mut rng).unwrap();
        let other = m.new_tab(t0);
        m.switch_active(video, t0).unwrap();
        m.crash(video).unwrap();
        m.switch_active(other, t0).unwrap();
        assert_eq!(m.pip_tab(), None);
    }

    #[test]
    fn test_navigate_supersedes_pending_settle() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(10);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();
        let a = "https://a.example/";
        let b = "https://b.example/";
        let first = m.navigate(id, a, &verdict_for(a), t0, &mut rng).unwrap();
        let second = m.navigate(id, b, &verdict_for(b), t0, &mut rng).unwrap();

        assert!(!m.complete_load(id, first.ticket).unwrap());
        assert_eq!(m.tab(id).unwrap().state, TabState::Loading);
        assert!(m.complete_load(id, second.ticket).unwrap());
        assert_eq!(m.tab(id).unwrap().state, TabState::Idle);
        assert_eq!(m.tab(id).unwrap().url, b);
    }

    #[test]
    fn test_tick_settles_due_loads() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(11);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();
        let url = "https://example.com/";
        m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();

        assert!(m.tick(t0 + Duration::from_millis(500), &mut rng).settled.is_empty());
        assert_eq!(m.tick(t0 + Duration::from_millis(800), &mut rng).settled, vec![id]);
        assert_eq!(m.tab(id).unwrap().state, TabState::Idle);
    }

    #[test]
    fn test_navigation_resets_idle_clock() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(12);
        let (mut m, bg) = with_background("https://example.com/", t0, &mut rng);
        let url = "https://example.org/";
        let t = m.navigate(bg, url, &verdict_for(url), t0 + secs(19), &mut rng).unwrap();
        m.complete_load(bg, t.ticket).unwrap();
        m.tick(t0 + secs(20), &mut rng);
        assert_eq!(m.tab(bg).unwrap().state, TabState::Idle);
    }

    #[test]
    fn test_security_scores() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(13);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();

        let url = "https://minerpool.miner.js";
        m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();
        assert_eq!(m.tab(id).unwrap().security_score, 0);

        let url = "https://doubleclick.net/ads";
        m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();
        let score = m.tab(id).unwrap().security_score;
        assert!((25..=59).contains(&score), "{score}");

        let url = "browser://settings";
        m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();
        assert_eq!(m.tab(id).unwrap().security_score, 100);

        for _ in 0..50 {
            let url = "https://example.com/";
            m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();
            let score = m.tab(id).unwrap().security_score;
            assert!((65..100).contains(&score), "{score}");
        }
    }

    #[test]
    fn test_low_threat_penalty() {
        let mut rng = StdRng::seed_from_u64(14);
        let verdict = ClassificationVerdict {
            is_blocked: true,
            reason: "test".into(),
            threat_level: ThreatLevel::Medium,
            category: crate::classifier::RequestCategory::Unknown,
            timestamp: 0,
        };
        let score = security_score("https://x.example", &verdict, &mut rng);
        assert!((50..=84).contains(&score), "{score}");
    }

    #[test]
    fn test_navigate_updates_tab_fields() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(15);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();
        let url = "https://webf.app/dashboard";
        let ticket = m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();
        let tab = m.tab(id).unwrap();
        assert_eq!(tab.state, TabState::Loading);
        assert_eq!(tab.title, "webf.app");
        assert_eq!(tab.engine, Engine::WebF);
        assert_eq!(tab.memory_usage_mb, 35.5);
        assert_eq!(ticket.settle_after, Duration::from_millis(800));
    }

    #[test]
    fn test_navigate_crashed_is_rejected() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(16);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();
        m.crash(id).unwrap();
        assert!(matches!(
            m.check_navigable(id),
            Err(LifecycleError::InvalidTransition { op: "navigate", .. })
        ));
        assert_eq!(m.check_navigable(TabId(99)), Err(LifecycleError::NotFound(TabId(99))));
        let url = "https://example.com/";
        let err = m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                id,
                from: TabState::Crashed,
                op: "navigate"
            }
        );
    }

    #[test]
    fn test_focused_frozen_tab_drifts_in_active_band() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(21);
        let (mut m, bg) = with_background("https://example.com/", t0, &mut rng);
        m.tick(t0 + secs(20), &mut rng);
        assert!(m.tab(bg).unwrap().is_frozen());

        m.switch_active(bg, t0 + secs(21)).unwrap();
        m.tick(t0 + secs(22), &mut rng);
        let tab = m.tab(bg).unwrap();
        assert!(tab.is_frozen());
        assert!((40.0..=150.0).contains(&tab.memory_usage_mb), "{}", tab.memory_usage_mb);
    }

    #[test]
    fn test_wake_frozen_tab() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(17);
        let (mut m, bg) = with_background("https://example.com/", t0, &mut rng);
        m.tick(t0 + secs(20), &mut rng);

        let ticket = m.wake(bg, t0 + secs(21)).unwrap();
        assert_eq!(ticket.settle_after, Duration::from_millis(500));
        let tab = m.tab(bg).unwrap();
        assert_eq!(tab.state, TabState::Loading);
        assert_eq!(tab.memory_usage_mb, 45.0);
        assert!(m.complete_load(bg, ticket.ticket).unwrap());
        assert_eq!(m.tab(bg).unwrap().state, TabState::Idle);

        assert!(matches!(
            m.wake(bg, t0),
            Err(LifecycleError::InvalidTransition { op: "wake", .. })
        ));
    }

    #[test]
    fn test_crash_and_recover() {
        let t0 = Instant::now();
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();
        assert!(matches!(m.recover(id, t0), Err(LifecycleError::InvalidTransition { .. })));

        m.crash(id).unwrap();
        assert_eq!(m.tab(id).unwrap().state, TabState::Crashed);
        assert!(m.crash(id).is_err());

        let ticket = m.recover(id, t0 + secs(1)).unwrap();
        assert_eq!(m.tab(id).unwrap().state, TabState::Loading);
        assert!(m.complete_load(id, ticket.ticket).unwrap());
        assert_eq!(m.tab(id).unwrap().state, TabState::Idle);
    }

    #[test]
    fn test_crash_invalidates_pending_load() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(18);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let id = m.active_tab_id();
        let url = "https://example.com/";
        let ticket = m.navigate(id, url, &verdict_for(url), t0, &mut rng).unwrap();
        m.crash(id).unwrap();
        assert!(!m.complete_load(id, ticket.ticket).unwrap());
        m.tick(t0 + secs(5), &mut rng);
        assert_eq!(m.tab(id).unwrap().state, TabState::Crashed);
    }

    #[test]
    fn test_unknown_tab_is_not_found() {
        let t0 = Instant::now();
        let mut rng = StdRng::seed_from_u64(19);
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let ghost = TabId(999);
        let v = verdict_for("https://example.com/");
        assert_eq!(m.switch_active(ghost, t0), Err(LifecycleError::NotFound(ghost)));
        assert_eq!(m.crash(ghost), Err(LifecycleError::NotFound(ghost)));
        assert!(matches!(m.wake(ghost, t0), Err(LifecycleError::NotFound(_))));
        assert!(matches!(m.recover(ghost, t0), Err(LifecycleError::NotFound(_))));
        assert!(matches!(
            m.navigate(ghost, "https://example.com/", &v, t0, &mut rng),
            Err(LifecycleError::NotFound(_))
        ));
        assert_eq!(m.complete_load(ghost, 1), Err(LifecycleError::NotFound(ghost)));
        assert_eq!(m.tabs().len(), 1);
    }

    #[test]
    fn test_set_active_workspace_opens_tab_when_empty() {
        let t0 = Instant::now();
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let work = WorkspaceId::new("work");
        let id = m.set_active_workspace(&work, t0).unwrap();
        assert_eq!(m.active_workspace(), &work);
        assert_eq!(m.active_tab_id(), id);
        assert_eq!(m.workspace_tabs(&work).count(), 1);

        // Coming back focuses the existing personal tab.
        let personal = WorkspaceId::new("personal");
        let back = m.set_active_workspace(&personal, t0).unwrap();
        assert_eq!(m.tab(back).unwrap().workspace_id, personal);
        assert_eq!(m.tabs().len(), 2);

        let bogus = WorkspaceId::new("nope");
        assert_eq!(
            m.set_active_workspace(&bogus, t0),
            Err(LifecycleError::UnknownWorkspace(bogus))
        );
    }

    #[test]
    fn test_move_last_tab_out_of_workspace() {
        let t0 = Instant::now();
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        let personal = m.active_workspace().clone();
        let id = m.active_tab_id();
        let dev = WorkspaceId::new("dev");
        let replacement = m.move_to_workspace(id, &dev, t0).unwrap();
        assert!(replacement.is_some());
        assert_eq!(m.workspace_tabs(&personal).count(), 1);
        assert_eq!(m.tab(id).unwrap().workspace_id, dev);
        assert_eq!(Some(m.active_tab_id()), replacement);
    }

    #[test]
    fn test_debug_view_toggle() {
        let t0 = Instant::now();
        let mut m = TabLifecycleManager::new(LifecycleConfig::default(), t0);
        assert!(m.debug_report(t0).is_none());
        assert!(m.toggle_freeze_debug_view());
        let report = m.debug_report(t0).unwrap();
        assert_eq!(report.len(), 1);
        assert!(report[0].contains("[active]"));
        assert!(!m.toggle_freeze_debug_view());
    }
}
