use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

use crate::dhcp::{read_database, LeaseDatabase, ParsePolicy};

/// Callback type for freshly parsed lease tables
pub type LeaseDatabaseCallback = Arc<dyn Fn(&LeaseDatabase) + Send + Sync>;

/// The last lease table that parsed successfully
#[derive(Debug, Clone, Serialize)]
pub struct LeaseSnapshot {
    pub database: LeaseDatabase,
    pub parsed_at: DateTime<Utc>,
}

/// What the watcher knows about the lease file right now
#[derive(Debug, Default)]
pub struct WatchState {
    pub snapshot: Option<Arc<LeaseSnapshot>>,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
}

pub type SharedWatchState = Arc<RwLock<WatchState>>;

/// LeaseWatcher re-reads the ISC lease database whenever it is written.
///
/// Change notifications are coalesced into a single pending refresh and
/// drained by one loop, so parses never overlap. A failed read leaves the
/// previous snapshot in place.
pub struct LeaseWatcher {
    lease_path: PathBuf,
    policy: ParsePolicy,
    resync_interval: Duration,
    state: SharedWatchState,
    callbacks: Vec<LeaseDatabaseCallback>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl LeaseWatcher {
    pub fn new(lease_path: impl Into<PathBuf>, policy: ParsePolicy, resync_interval: Duration) -> Self {
        Self {
            lease_path: lease_path.into(),
            policy,
            resync_interval,
            state: Arc::new(RwLock::new(WatchState::default())),
            callbacks: Vec::new(),
            stop_tx: None,
        }
    }

    pub fn state(&self) -> SharedWatchState {
        self.state.clone()
    }

    /// Add a callback to be notified on every successful parse
    pub fn add_callback(&mut self, callback: LeaseDatabaseCallback) {
        self.callbacks.push(callback);
    }

    /// Start watching the lease file.
    ///
    /// The parent directory is watched rather than the file itself because
    /// dhcpd replaces the file by renaming `dhcpd.leases~` over it.
    pub fn start(&mut self) -> anyhow::Result<()> {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let (event_tx, mut event_rx) = mpsc::channel::<()>(1);

        let target = self.lease_path.clone();
        let mut fs_watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_lease_write(&event, &target) => {
                // A full channel already holds a pending refresh
                let _ = event_tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Failed to watch lease file for changes: {}", e),
        })?;
        fs_watcher.watch(watch_dir(&self.lease_path), RecursiveMode::NonRecursive)?;
        tracing::info!("Started watcher on {}", self.lease_path.display());

        self.stop_tx = Some(stop_tx);
        let lease_path = self.lease_path.clone();
        let policy = self.policy;
        let state = self.state.clone();
        let callbacks = self.callbacks.clone();
        let mut resync = resync_ticker(self.resync_interval);

        tokio::spawn(async move {
            let _fs_watcher = fs_watcher;

            // Initial read
            check_leases(&lease_path, policy, &state, &callbacks).await;

            loop {
                tokio::select! {
                    Some(()) = event_rx.recv() => {
                        tracing::info!("Received lease file modified event");
                        check_leases(&lease_path, policy, &state, &callbacks).await;
                    }
                    _ = tick(&mut resync) => {
                        tracing::debug!("Periodic lease file resync");
                        check_leases(&lease_path, policy, &state, &callbacks).await;
                    }
                    _ = &mut stop_rx => {
                        tracing::info!("Lease watcher stopped");
                        break;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop watching the lease file
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn check_leases(
    lease_path: &Path,
    policy: ParsePolicy,
    state: &SharedWatchState,
    callbacks: &[LeaseDatabaseCallback],
) {
    match read_database(lease_path, policy).await {
        Ok(database) => {
            for callback in callbacks {
                callback(&database);
            }

            let mut state = state.write().await;
            state.snapshot = Some(Arc::new(LeaseSnapshot {
                database,
                parsed_at: Utc::now(),
            }));
            state.consecutive_failures = 0;
            state.last_error = None;
        }
        Err(e) => {
            tracing::error!(kind = %e.kind(), "Failed to read lease database, keeping previous table: {}", e);
            let mut state = state.write().await;
            state.consecutive_failures += 1;
            state.last_error = Some(e.to_string());
        }
    }
}

fn is_lease_write(event: &Event, lease_path: &Path) -> bool {
    let relevant = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Access(AccessKind::Close(AccessMode::Write))
    );
    relevant
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == lease_path.file_name())
}

fn watch_dir(lease_path: &Path) -> &Path {
    match lease_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn resync_ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
