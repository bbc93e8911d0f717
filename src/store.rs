//! Application state shared between the CLI and the scan controller.
//!
//! State only changes through [`Action`]s; [`reduce`] is the single place
//! that knows how each action affects it.

use crate::auth::AuthTokens;
use crate::profile::ScannerKind;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppState {
    pub session: Option<AuthTokens>,
    pub active_scan: Option<ActiveScan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveScan {
    pub kind: ScannerKind,
    pub scan_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    LoggedIn(AuthTokens),
    LoggedOut,
    ScanStarted { kind: ScannerKind, scan_id: String },
    ScanEnded,
}

pub fn reduce(state: &AppState, action: Action) -> AppState {
    let mut next = state.clone();
    match action {
        Action::LoggedIn(tokens) => next.session = Some(tokens),
        Action::LoggedOut => next.session = None,
        Action::ScanStarted { kind, scan_id } => {
            next.active_scan = Some(ActiveScan { kind, scan_id })
        }
        Action::ScanEnded => next.active_scan = None,
    }
    next
}

#[derive(Debug, Clone)]
pub struct Store {
    tx: Arc<watch::Sender<AppState>>,
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn dispatch(&self, action: Action) {
        log::debug!("store action: {:?}", action);
        self.tx.send_modify(|state| *state = reduce(state, action));
    }

    pub fn state(&self) -> AppState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.tx.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().session.as_ref().map(|s| s.access.clone())
    }

    pub fn is_scan_running(&self) -> bool {
        self.tx.borrow().active_scan.is_some()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}
