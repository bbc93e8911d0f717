//! Scan lifecycle controller.
//!
//! One controller drives one scanner profile through
//! `Idle → Submitted → Polling → {Finished | Errored | Stopped}`. Inline
//! profiles skip `Polling` and finish straight from the create call.
//!
//! Every submit and every stop bumps an epoch. Background work (the poll
//! loop and the distraction timer) captures the epoch it was started with
//! and only touches state while that epoch is still current, so responses
//! that land after a stop or a resubmit are dropped.

use crate::backend::ScanBackend;
use crate::profile::{ScanMode, ScanProfile};
use crate::progress::{ProgressEntry, ProgressMap};
use crate::report;
use crate::store::{Action, Store};
use crate::types::{ResultRecord, ScanRequest, ScanStart, ScanStatus};
use crate::{Result, ScanError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub const DEFAULT_DISTRACTION_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Submitted,
    Polling,
    Finished,
    Errored,
    Stopped,
}

impl Phase {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Submitted | Phase::Polling)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Errored | Phase::Stopped)
    }
}

#[derive(Debug, Clone)]
pub struct ScanState {
    pub phase: Phase,
    pub scan_id: Option<String>,
    pub request: Option<ScanRequest>,
    pub progress: ProgressMap,
    pub results: Vec<ResultRecord>,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    epoch: u64,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            scan_id: None,
            request: None,
            progress: ProgressMap::new(),
            results: Vec::new(),
            message: String::new(),
            started_at: None,
            finished_at: None,
            epoch: 0,
        }
    }
}

/// Notifications for whoever renders the scan.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Submitted { target: String },
    Started { scan_id: String },
    Progress(ProgressMap),
    Finished { count: usize, message: String },
    Errored { message: String },
    Stopped { message: String },
    /// The scan has been in flight long enough to offer a distraction.
    DistractionOffered,
}

impl LifecycleEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Finished { .. } | LifecycleEvent::Errored { .. } | LifecycleEvent::Stopped { .. }
        )
    }
}

struct Shared {
    profile: ScanProfile,
    backend: Arc<dyn ScanBackend>,
    store: Store,
    state: Mutex<ScanState>,
    distraction: Mutex<Option<AbortHandle>>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
}

impl Shared {
    fn emit(&self, event: LifecycleEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.events.send(event);
    }

    fn is_current(&self, epoch: u64) -> bool {
        let state = self.state.lock();
        state.epoch == epoch && state.phase.is_in_flight()
    }

    fn cancel_distraction(&self) {
        if let Some(handle) = self.distraction.lock().take() {
            handle.abort();
        }
    }

    fn apply_progress(&self, epoch: u64, entries: &[ProgressEntry]) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.epoch != epoch || state.phase != Phase::Polling {
                return;
            }
            if !state.progress.merge(entries) {
                return;
            }
            state.progress.clone()
        };
        self.emit(LifecycleEvent::Progress(snapshot));
    }

    fn finish(&self, epoch: u64, results: Vec<ResultRecord>) {
        let (count, message) = {
            let mut state = self.state.lock();
            if state.epoch != epoch || !state.phase.is_in_flight() {
                return;
            }
            let count = results.len();
            state.results = results;
            state.message = format!("Scan finished: {} {}", count, self.profile.result_noun);
            state.phase = Phase::Finished;
            state.finished_at = Some(Utc::now());
            (count, state.message.clone())
        };
        info!("{} {}", self.profile.title, message);
        self.cancel_distraction();
        self.store.dispatch(Action::ScanEnded);
        self.emit(LifecycleEvent::Finished { count, message });
    }

    fn fail(&self, epoch: u64, message: String) {
        {
            let mut state = self.state.lock();
            if state.epoch != epoch || !state.phase.is_in_flight() {
                return;
            }
            state.message = message.clone();
            state.phase = Phase::Errored;
            state.finished_at = Some(Utc::now());
        }
        warn!("{}: {}", self.profile.title, message);
        self.cancel_distraction();
        self.store.dispatch(Action::ScanEnded);
        self.emit(LifecycleEvent::Errored { message });
    }
}

pub struct ScanController {
    shared: Arc<Shared>,
    distraction_delay: Duration,
    poll_task: Option<JoinHandle<()>>,
}

impl ScanController {
    pub fn new(
        profile: ScanProfile,
        backend: Arc<dyn ScanBackend>,
        store: Store,
    ) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            profile,
            backend,
            store,
            state: Mutex::new(ScanState::default()),
            distraction: Mutex::new(None),
            events: tx,
        });

        let controller = Self {
            shared,
            distraction_delay: DEFAULT_DISTRACTION_DELAY,
            poll_task: None,
        };
        (controller, rx)
    }

    pub fn set_distraction_delay(&mut self, delay: Duration) {
        self.distraction_delay = delay;
    }

    pub fn profile(&self) -> &ScanProfile {
        &self.shared.profile
    }

    pub fn snapshot(&self) -> ScanState {
        self.shared.state.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    pub fn message(&self) -> String {
        self.shared.state.lock().message.clone()
    }

    /// Start a scan.
    ///
    /// Rejects empty targets without touching the network, and rejects any
    /// submit while another scan from this controller is still in flight.
    pub async fn submit(&mut self, request: ScanRequest) -> Result<()> {
        let profile = self.shared.profile.clone();

        if request.is_empty() {
            self.shared.state.lock().message = profile.prompt.to_string();
            return Err(ScanError::EmptyTarget);
        }

        let epoch = {
            let mut state = self.shared.state.lock();
            if state.phase.is_in_flight() {
                return Err(ScanError::ScanInProgress {
                    scan_id: state.scan_id.clone(),
                });
            }
            state.epoch += 1;
            state.phase = Phase::Submitted;
            state.scan_id = None;
            state.request = Some(request.clone());
            state.results.clear();
            state.progress = ProgressMap::with_stages(profile.stages.iter().copied());
            state.message = "Scan starting; keep this terminal open until it finishes.".to_string();
            state.started_at = Some(Utc::now());
            state.finished_at = None;
            state.epoch
        };

        self.abort_poll();
        self.shared.emit(LifecycleEvent::Submitted {
            target: request.target.trim().to_string(),
        });
        self.arm_distraction(epoch);

        info!("Submitting {} scan for {}", profile.kind, request.target.trim());
        match self.shared.backend.start_scan(&profile, &request).await {
            Ok(ScanStart::Queued { scan_id }) => {
                {
                    let mut state = self.shared.state.lock();
                    state.scan_id = Some(scan_id.clone());
                    state.phase = Phase::Polling;
                }
                debug!("{} scan queued as {}", profile.kind, scan_id);
                self.shared.store.dispatch(Action::ScanStarted {
                    kind: profile.kind,
                    scan_id: scan_id.clone(),
                });
                self.shared.emit(LifecycleEvent::Started {
                    scan_id: scan_id.clone(),
                });
                let shared = Arc::clone(&self.shared);
                self.poll_task = Some(tokio::spawn(poll_loop(shared, scan_id, epoch)));
                Ok(())
            }
            Ok(ScanStart::Completed { results }) => {
                if matches!(profile.mode, ScanMode::Polling { .. }) {
                    warn!("{} answered a polling scan inline", profile.slug);
                }
                self.shared.finish(epoch, results);
                Ok(())
            }
            Err(err) => {
                self.shared.fail(epoch, err.start_failure_message());
                Err(err)
            }
        }
    }

    /// Stop polling. The backend is not told; its scan keeps running.
    pub fn stop(&mut self) -> bool {
        {
            let mut state = self.shared.state.lock();
            if !state.phase.is_in_flight() {
                return false;
            }
            state.epoch += 1;
            state.phase = Phase::Stopped;
            state.message = "Scan stopped by user.".to_string();
            state.finished_at = Some(Utc::now());
        }

        self.abort_poll();
        self.shared.cancel_distraction();
        self.shared.store.dispatch(Action::ScanEnded);
        self.shared.emit(LifecycleEvent::Stopped {
            message: "Scan stopped by user.".to_string(),
        });
        true
    }

    /// Save the finished scan's PDF report under `dest_dir`.
    pub async fn download_report(&self, dest_dir: &Path) -> Result<PathBuf> {
        let snapshot = self.snapshot();
        report::save_report(self.shared.backend.as_ref(), &self.shared.profile, &snapshot, dest_dir).await
    }

    fn arm_distraction(&self, epoch: u64) {
        self.shared.cancel_distraction();

        let shared = Arc::clone(&self.shared);
        let delay = self.distraction_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if shared.is_current(epoch) {
                shared.emit(LifecycleEvent::DistractionOffered);
            }
        });
        *self.shared.distraction.lock() = Some(handle.abort_handle());
    }

    fn abort_poll(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        // Releases the store's active scan when dropped mid-flight.
        self.stop();
        self.abort_poll();
        self.shared.cancel_distraction();
    }
}

async fn poll_loop(shared: Arc<Shared>, scan_id: String, epoch: u64) {
    let period = shared.profile.poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.is_current(epoch) {
            break;
        }

        let report = match shared.backend.scan_status(&shared.profile, &scan_id).await {
            Ok(report) => report,
            Err(e) => {
                debug!("Status poll for {} failed, retrying next tick: {}", scan_id, e);
                continue;
            }
        };

        shared.apply_progress(epoch, &report.progress);

        match report.scan_status() {
            ScanStatus::Finished => {
                let results = match shared.profile.mode {
                    ScanMode::Polling { separate_results: true } => {
                        match shared.backend.scan_results(&shared.profile, &scan_id).await {
                            Ok(results) => results,
                            Err(e) => {
                                shared.fail(epoch, format!("Failed to fetch results: {}", e));
                                break;
                            }
                        }
                    }
                    _ => report.results.unwrap_or_default(),
                };
                shared.finish(epoch, results);
                break;
            }
            ScanStatus::Error => {
                shared.fail(epoch, format!("Scan error: {}", report.error_detail()));
                break;
            }
            ScanStatus::Running => {}
            ScanStatus::Other(status) => {
                debug!("Scan {} reported non-terminal status {:?}", scan_id, status);
            }
        }
    }
}
