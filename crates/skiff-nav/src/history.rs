//! Guarded navigation engine with keep-alive view instances.

use crate::error::{NavError, NavResult};
use crate::guard::{GuardOutcome, RouteGuard};
use crate::route::{RouteNode, RouteTable};
use crate::view::ViewInstance;
use chrono::{DateTime, Utc};
use skiff_events::{DomainEvent, Emitter, Handle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default bound on retained off-path view instances.
const DEFAULT_KEEP_ALIVE_CAP: usize = 8;

/// Guard redirects allowed within one transition before giving up.
const REDIRECT_BUDGET: usize = 8;

/// Phase of the navigation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    /// No transition in flight.
    Idle,
    /// Matching the target against the route table.
    Resolving,
    /// Evaluating ancestor guards, possibly suspended.
    Guarding,
    /// Building and swapping the view-instance chain.
    Committing,
}

/// How the browser-visible history stack is mutated on commit.
///
/// The Resolving/Guarding/Committing sequence is identical for all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    /// Append a new entry.
    Push,
    /// Replace the top entry.
    Replace,
    /// Pop the departed top entry; used by back navigation. The pop happens
    /// on commit, so a rejected transition leaves the stack intact.
    Pop,
}

/// Per-navigation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateOptions {
    /// Suppress recording a history entry, so back navigation skips this
    /// commit; used for startup redirects.
    pub ignore_history: bool,
}

/// One browser-visible history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Route name of the committed leaf.
    pub name: String,
    /// Pathname of the committed leaf.
    pub pathname: String,
}

/// Payload of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewChange {
    /// Route name of the committed leaf.
    pub name: String,
    /// Pathname of the committed leaf.
    pub pathname: String,
    /// Title of the committed leaf.
    pub title: String,
    /// Root-to-leaf route names of the committed chain.
    pub chain: Vec<String>,
    /// Whether a history entry was recorded for this commit.
    pub recorded: bool,
}

/// Events published by [`NavigationHistory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    /// A transition committed.
    ViewChanged(ViewChange),
    /// A redirecting guard issued a user-facing notice.
    GuardNotice(String),
}

/// Discriminator for [`NavEvent`] subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavEventKind {
    /// Channel for [`NavEvent::ViewChanged`].
    ViewChanged,
    /// Channel for [`NavEvent::GuardNotice`].
    GuardNotice,
}

impl DomainEvent for NavEvent {
    type Kind = NavEventKind;

    fn kind(&self) -> Self::Kind {
        match self {
            Self::ViewChanged(_) => NavEventKind::ViewChanged,
            Self::GuardNotice(_) => NavEventKind::GuardNotice,
        }
    }
}

struct Inner {
    phase: NavPhase,
    instances: HashMap<String, Arc<ViewInstance>>,
    active_chain: Vec<String>,
    stack: Vec<HistoryEntry>,
    pending_target: Option<String>,
}

/// Owns the route table, the guard registry and every live view instance.
///
/// One transition runs at a time: a navigation issued while another is in
/// flight (possibly suspended in an async guard) fails fast with
/// [`NavError::TransitionInProgress`]. A rejected transition leaves the
/// previously committed view mounted; no partial tree is ever visible.
pub struct NavigationHistory {
    table: RouteTable,
    guards: HashMap<String, Arc<dyn RouteGuard>>,
    keep_alive_cap: usize,
    inner: Mutex<Inner>,
    emitter: Emitter<NavEvent>,
}

impl NavigationHistory {
    /// Construct an engine over a built route table.
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self {
            table,
            guards: HashMap::new(),
            keep_alive_cap: DEFAULT_KEEP_ALIVE_CAP,
            inner: Mutex::new(Inner {
                phase: NavPhase::Idle,
                instances: HashMap::new(),
                active_chain: Vec::new(),
                stack: Vec::new(),
                pending_target: None,
            }),
            emitter: Emitter::new(),
        }
    }

    /// Attach a guard to a route node by name, builder style.
    #[must_use]
    pub fn with_guard(mut self, name: impl Into<String>, guard: Arc<dyn RouteGuard>) -> Self {
        self.guards.insert(name.into(), guard);
        self
    }

    /// Override the retained-instance bound, builder style.
    #[must_use]
    pub const fn with_keep_alive_cap(mut self, cap: usize) -> Self {
        self.keep_alive_cap = cap;
        self
    }

    /// Navigate, appending a history entry.
    ///
    /// # Errors
    ///
    /// See [`NavigationHistory::navigate`].
    pub async fn push(&self, target: &str) -> NavResult<ViewChange> {
        self.navigate(target, NavMode::Push, NavigateOptions::default())
            .await
    }

    /// Navigate, replacing the top history entry.
    ///
    /// # Errors
    ///
    /// See [`NavigationHistory::navigate`].
    pub async fn replace(&self, target: &str) -> NavResult<ViewChange> {
        self.navigate(target, NavMode::Replace, NavigateOptions::default())
            .await
    }

    /// Pop the top history entry and navigate to the one below it.
    ///
    /// Returns `Ok(None)` when there is nothing to go back to.
    ///
    /// # Errors
    ///
    /// See [`NavigationHistory::navigate`].
    pub async fn back(&self) -> NavResult<Option<ViewChange>> {
        let target = {
            let inner = self.lock();
            if inner.phase != NavPhase::Idle {
                return Err(NavError::TransitionInProgress);
            }
            if inner.stack.len() < 2 {
                return Ok(None);
            }
            // Peek only; commit pops the departed entry, so a rejected or
            // lost transition leaves the stack matching the committed view.
            inner.stack[inner.stack.len() - 2].name.clone()
        };
        self.navigate(&target, NavMode::Pop, NavigateOptions::default())
            .await
            .map(Some)
    }

    /// Run one full transition: resolve, guard, commit.
    ///
    /// # Errors
    ///
    /// [`NavError::TransitionInProgress`] when another transition is in
    /// flight, [`NavError::GuardRejected`] when a guard rejects without
    /// redirecting, [`NavError::RedirectLoop`] when guard redirects chain
    /// past their budget.
    pub async fn navigate(
        &self,
        target: &str,
        mode: NavMode,
        options: NavigateOptions,
    ) -> NavResult<ViewChange> {
        {
            let mut inner = self.lock();
            if inner.phase != NavPhase::Idle {
                return Err(NavError::TransitionInProgress);
            }
            inner.phase = NavPhase::Resolving;
        }
        let result = self.transition(target, mode, options).await;
        self.lock().phase = NavPhase::Idle;
        result
    }

    async fn transition(
        &self,
        target: &str,
        mode: NavMode,
        options: NavigateOptions,
    ) -> NavResult<ViewChange> {
        let mut target = target.to_string();
        // Guards already passed in this transition; a shared ancestor is
        // never evaluated twice, including across redirect restarts.
        let mut passed: HashSet<String> = HashSet::new();
        for _ in 0..=REDIRECT_BUDGET {
            self.lock().phase = NavPhase::Resolving;
            let leaf = match self.table.resolve(&target) {
                Some(node) => Arc::clone(node),
                None => {
                    tracing::debug!(target = %target, "no route matched, using not-found fallback");
                    let fallback = self.table.not_found().to_string();
                    match self.table.get(&fallback) {
                        Some(node) => Arc::clone(node),
                        None => return Err(NavError::UnknownRoute { name: fallback }),
                    }
                }
            };
            let chain = self.table.chain(&leaf.name);

            self.lock().phase = NavPhase::Guarding;
            let mut redirect = None;
            for node in &chain {
                if passed.contains(&node.name) {
                    continue;
                }
                let Some(guard) = self.guards.get(&node.name) else {
                    passed.insert(node.name.clone());
                    continue;
                };
                match guard.check(node).await {
                    GuardOutcome::Allow => {
                        passed.insert(node.name.clone());
                    }
                    GuardOutcome::Redirect {
                        target: next,
                        remember,
                        message,
                    } => {
                        tracing::debug!(
                            route = %node.name,
                            redirect = %next,
                            "guard redirected transition"
                        );
                        if remember {
                            self.lock().pending_target = Some(target.clone());
                        }
                        if let Some(message) = message {
                            self.emitter.emit(&NavEvent::GuardNotice(message));
                        }
                        redirect = Some(next);
                        break;
                    }
                    GuardOutcome::Reject { reason } => {
                        tracing::debug!(route = %node.name, %reason, "guard rejected transition");
                        return Err(NavError::GuardRejected { reason });
                    }
                }
            }
            if let Some(next) = redirect {
                target = next;
                continue;
            }
            return Ok(self.commit(&leaf, &chain, mode, options));
        }
        Err(NavError::RedirectLoop { target })
    }

    fn commit(
        &self,
        leaf: &RouteNode,
        chain: &[Arc<RouteNode>],
        mode: NavMode,
        options: NavigateOptions,
    ) -> ViewChange {
        let chain_names: Vec<String> = chain.iter().map(|node| node.name.clone()).collect();
        let name_set: HashSet<&str> = chain_names.iter().map(String::as_str).collect();
        let recorded = !options.ignore_history && mode != NavMode::Pop;

        let (to_hide, to_mount, evicted) = {
            let mut inner = self.lock();
            inner.phase = NavPhase::Committing;

            let previous = std::mem::take(&mut inner.active_chain);
            let to_hide: Vec<Arc<ViewInstance>> = previous
                .iter()
                .filter(|name| !name_set.contains(name.as_str()))
                .filter_map(|name| inner.instances.get(name).cloned())
                .collect();
            let to_mount: Vec<Arc<ViewInstance>> = chain
                .iter()
                .map(|node| {
                    Arc::clone(
                        inner
                            .instances
                            .entry(node.name.clone())
                            .or_insert_with(|| Arc::new(ViewInstance::new(node))),
                    )
                })
                .collect();
            inner.active_chain = chain_names.clone();

            let evicted = evict_over_cap(&mut inner.instances, &name_set, self.keep_alive_cap);

            match mode {
                NavMode::Push | NavMode::Replace if recorded => {
                    if mode == NavMode::Replace {
                        inner.stack.pop();
                    }
                    inner.stack.push(HistoryEntry {
                        name: leaf.name.clone(),
                        pathname: leaf.pathname.clone(),
                    });
                }
                // The departed entry stays on the stack until the back
                // transition actually lands.
                NavMode::Pop => {
                    inner.stack.pop();
                }
                _ => {}
            }
            (to_hide, to_mount, evicted)
        };

        for instance in &to_hide {
            instance.mark_kept_alive();
        }
        for instance in &to_mount {
            instance.mark_mounted();
        }
        for instance in evicted {
            tracing::debug!(view = %instance.name, "evicting kept-alive view instance");
            instance.destroy();
        }

        let change = ViewChange {
            name: leaf.name.clone(),
            pathname: leaf.pathname.clone(),
            title: leaf.title.clone(),
            chain: chain_names,
            recorded,
        };
        self.emitter.emit(&NavEvent::ViewChanged(change.clone()));
        change
    }

    /// Current engine phase.
    #[must_use]
    pub fn phase(&self) -> NavPhase {
        self.lock().phase
    }

    /// Live instance for a route name, mounted or kept alive.
    #[must_use]
    pub fn instance(&self, name: &str) -> Option<Arc<ViewInstance>> {
        self.lock().instances.get(name).cloned()
    }

    /// Root-to-leaf instances of the committed chain.
    #[must_use]
    pub fn active_chain(&self) -> Vec<Arc<ViewInstance>> {
        let inner = self.lock();
        inner
            .active_chain
            .iter()
            .filter_map(|name| inner.instances.get(name).cloned())
            .collect()
    }

    /// Leaf instance of the committed chain.
    #[must_use]
    pub fn active_leaf(&self) -> Option<Arc<ViewInstance>> {
        let inner = self.lock();
        inner
            .active_chain
            .last()
            .and_then(|name| inner.instances.get(name).cloned())
    }

    /// Snapshot of the browser-visible history stack.
    #[must_use]
    pub fn stack(&self) -> Vec<HistoryEntry> {
        self.lock().stack.clone()
    }

    /// Number of retained off-path instances.
    #[must_use]
    pub fn retained_count(&self) -> usize {
        let inner = self.lock();
        inner
            .instances
            .keys()
            .filter(|name| !inner.active_chain.contains(name))
            .count()
    }

    /// Take the target remembered by a redirecting guard, if any.
    #[must_use]
    pub fn take_pending_target(&self) -> Option<String> {
        self.lock().pending_target.take()
    }

    /// Subscribe to committed transitions.
    pub fn on_view_changed<F>(&self, handler: F) -> Handle
    where
        F: Fn(&ViewChange) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(NavEventKind::ViewChanged, move |event| {
                if let NavEvent::ViewChanged(change) = event {
                    handler(change);
                }
                Ok(())
            })
    }

    /// Subscribe to guard-issued notices.
    pub fn on_guard_notice<F>(&self, handler: F) -> Handle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.emitter
            .subscribe(NavEventKind::GuardNotice, move |event| {
                if let NavEvent::GuardNotice(message) = event {
                    handler(message);
                }
                Ok(())
            })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Remove the least-recently-visited off-path instances beyond `cap`.
fn evict_over_cap(
    instances: &mut HashMap<String, Arc<ViewInstance>>,
    active: &HashSet<&str>,
    cap: usize,
) -> Vec<Arc<ViewInstance>> {
    let mut retained: Vec<(String, DateTime<Utc>)> = instances
        .iter()
        .filter(|(name, _)| !active.contains(name.as_str()))
        .map(|(name, instance)| (name.clone(), instance.last_visited()))
        .collect();
    if retained.len() <= cap {
        return Vec::new();
    }
    retained.sort_by_key(|(_, visited)| *visited);
    let overflow = retained.len() - cap;
    retained
        .into_iter()
        .take(overflow)
        .filter_map(|(name, _)| instances.remove(&name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteSpec;
    use crate::view::ViewLifecycle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn console_spec() -> RouteSpec {
        RouteSpec::new("ROOT", "/")
            .child(
                "home_layout",
                RouteSpec::new("Home", "/home")
                    .protected()
                    .child("index", RouteSpec::new("Dashboard", "/home/index"))
                    .child("torrent", RouteSpec::new("Torrent search", "/home/torrent"))
                    .child("settings", RouteSpec::new("Settings", "/settings"))
                    .child("task_list", RouteSpec::new("Jobs", "/home/log")),
            )
            .child("login", RouteSpec::new("Sign in", "/login"))
            .child("notfound", RouteSpec::new("404", "/notfound"))
    }

    fn table() -> RouteTable {
        RouteTable::build("root", console_spec(), "root.notfound").expect("table")
    }

    /// Redirects to login while `authed` is false, as the console auth guard
    /// does.
    struct AuthGuard {
        authed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RouteGuard for AuthGuard {
        async fn check(&self, _node: &RouteNode) -> GuardOutcome {
            if self.authed.load(Ordering::SeqCst) {
                GuardOutcome::Allow
            } else {
                GuardOutcome::redirect_remembering("root.login")
            }
        }
    }

    struct RejectGuard;

    #[async_trait]
    impl RouteGuard for RejectGuard {
        async fn check(&self, _node: &RouteNode) -> GuardOutcome {
            GuardOutcome::Reject {
                reason: "maintenance window".to_string(),
            }
        }
    }

    /// Suspends until released, to model a guard awaiting a remote check.
    struct SlowGuard {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl RouteGuard for SlowGuard {
        async fn check(&self, _node: &RouteNode) -> GuardOutcome {
            self.release.notified().await;
            GuardOutcome::Allow
        }
    }

    #[tokio::test]
    async fn sibling_navigation_reuses_the_layout_instance() {
        let history = NavigationHistory::new(table());
        history.push("root.home_layout.index").await.expect("tab a");
        let layout_before = history.instance("root.home_layout").expect("layout");
        let leaf_before = history.instance("root.home_layout.index").expect("leaf");

        history
            .push("root.home_layout.torrent")
            .await
            .expect("tab b");
        let layout_after = history.instance("root.home_layout").expect("layout");

        assert_eq!(layout_before.id, layout_after.id);
        assert_eq!(layout_after.lifecycle(), ViewLifecycle::Mounted);
        // The departed leaf is retained, not destroyed.
        assert_eq!(leaf_before.lifecycle(), ViewLifecycle::KeptAlive);
        // Returning reuses the kept-alive leaf with its state.
        history.push("root.home_layout.index").await.expect("back to a");
        let leaf_again = history.instance("root.home_layout.index").expect("leaf");
        assert_eq!(leaf_before.id, leaf_again.id);
    }

    #[tokio::test]
    async fn unauthenticated_navigation_redirects_and_remembers_the_target() {
        let authed = Arc::new(AtomicBool::new(false));
        let history = NavigationHistory::new(table()).with_guard(
            "root.home_layout",
            Arc::new(AuthGuard {
                authed: Arc::clone(&authed),
            }),
        );

        let change = history
            .push("root.home_layout.settings")
            .await
            .expect("redirected commit");
        assert_eq!(change.name, "root.login");

        // After login the remembered target resolves.
        authed.store(true, Ordering::SeqCst);
        let target = history.take_pending_target().expect("remembered");
        assert_eq!(target, "root.home_layout.settings");
        let change = history.push(&target).await.expect("post-login");
        assert_eq!(change.name, "root.home_layout.settings");
        assert!(history.take_pending_target().is_none());
    }

    #[tokio::test]
    async fn guard_rejection_keeps_the_previous_view() {
        let history = NavigationHistory::new(table())
            .with_guard("root.home_layout.settings", Arc::new(RejectGuard));
        history.push("root.login").await.expect("login");

        let error = history
            .push("root.home_layout.settings")
            .await
            .expect_err("rejected");
        assert!(matches!(error, NavError::GuardRejected { .. }));
        assert_eq!(history.phase(), NavPhase::Idle);
        let leaf = history.active_leaf().expect("previous leaf");
        assert_eq!(leaf.name, "root.login");
        // No partial tree: the rejected chain was never instantiated.
        assert!(history.instance("root.home_layout.settings").is_none());
    }

    /// Rejects while `closed` is set, allowing otherwise.
    struct ToggleGuard {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RouteGuard for ToggleGuard {
        async fn check(&self, _node: &RouteNode) -> GuardOutcome {
            if self.closed.load(Ordering::SeqCst) {
                GuardOutcome::Reject {
                    reason: "maintenance window".to_string(),
                }
            } else {
                GuardOutcome::Allow
            }
        }
    }

    #[tokio::test]
    async fn rejected_back_navigation_keeps_the_history_entry() {
        let closed = Arc::new(AtomicBool::new(false));
        let history = NavigationHistory::new(table()).with_guard(
            "root.home_layout",
            Arc::new(ToggleGuard {
                closed: Arc::clone(&closed),
            }),
        );
        history
            .push("root.home_layout.settings")
            .await
            .expect("settings");
        history.push("root.login").await.expect("login");

        closed.store(true, Ordering::SeqCst);
        let error = history.back().await.expect_err("rejected");
        assert!(matches!(error, NavError::GuardRejected { .. }));
        // The stack still matches the committed view.
        let stack = history.stack();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[1].name, "root.login");
        assert_eq!(history.active_leaf().expect("leaf").name, "root.login");

        // Once the guard opens again the same entry is still reachable.
        closed.store(false, Ordering::SeqCst);
        let change = history.back().await.expect("back").expect("entry");
        assert_eq!(change.name, "root.home_layout.settings");
        assert_eq!(history.stack().len(), 1);
    }

    #[tokio::test]
    async fn unknown_targets_fall_back_to_the_not_found_route() {
        let history = NavigationHistory::new(table());
        let change = history.push("/definitely/not/here").await.expect("commit");
        assert_eq!(change.name, "root.notfound");
    }

    #[tokio::test]
    async fn ignored_commits_leave_no_history_entry() {
        let history = NavigationHistory::new(table());
        history.push("root.login").await.expect("login");
        history
            .navigate(
                "root.home_layout.index",
                NavMode::Push,
                NavigateOptions {
                    ignore_history: true,
                },
            )
            .await
            .expect("startup redirect");

        assert_eq!(history.stack().len(), 1);
        history.push("root.home_layout.torrent").await.expect("tab");

        // Back skips the unrecorded commit and lands on login.
        let change = history.back().await.expect("back").expect("entry");
        assert_eq!(change.name, "root.login");
    }

    #[tokio::test]
    async fn replace_swaps_the_top_entry() {
        let history = NavigationHistory::new(table());
        history.push("root.login").await.expect("login");
        history.replace("root.home_layout.index").await.expect("replace");
        let stack = history.stack();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].name, "root.home_layout.index");
    }

    #[tokio::test]
    async fn navigation_during_a_suspended_guard_fails_fast() {
        let release = Arc::new(Notify::new());
        let history = Arc::new(NavigationHistory::new(table()).with_guard(
            "root.home_layout",
            Arc::new(SlowGuard {
                release: Arc::clone(&release),
            }),
        ));

        let pending = {
            let history = Arc::clone(&history);
            tokio::spawn(async move { history.push("root.home_layout.index").await })
        };
        while history.phase() != NavPhase::Guarding {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert_eq!(
            history.push("root.login").await,
            Err(NavError::TransitionInProgress)
        );

        release.notify_one();
        let change = pending.await.expect("task").expect("commit");
        assert_eq!(change.name, "root.home_layout.index");
        assert_eq!(history.phase(), NavPhase::Idle);
    }

    #[tokio::test]
    async fn retained_instances_are_evicted_least_recently_visited_first() {
        let history = NavigationHistory::new(table()).with_keep_alive_cap(2);
        for name in [
            "root.home_layout.index",
            "root.home_layout.torrent",
            "root.home_layout.settings",
            "root.home_layout.task_list",
        ] {
            history.push(name).await.expect("navigate");
        }

        // Cap 2: of the three departed leaves the oldest one is gone.
        assert_eq!(history.retained_count(), 2);
        assert!(history.instance("root.home_layout.index").is_none());
        let survivor = history
            .instance("root.home_layout.settings")
            .expect("recently visited survives");
        assert_eq!(survivor.lifecycle(), ViewLifecycle::KeptAlive);
    }
}
