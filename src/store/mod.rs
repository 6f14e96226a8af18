//! Observable application state
//!
//! [`EntityStore`] holds the current [`AppState`] snapshot. Every mutation
//! produces a new snapshot and, unless silent, publishes a [`StateChange`]
//! carrying the new and previous snapshots to subscribers. Bulk updates can
//! be routed through a [`Throttle`] so bursts reach subscribers at a bounded
//! rate.

pub mod state;
pub mod throttle;

pub use state::*;
pub use throttle::Throttle;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::node::{BlockchainInfo, TotalBalances};
use crate::settings::Settings;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Published after each non-silent mutation
#[derive(Debug, Clone)]
pub struct StateChange {
    pub state: Arc<AppState>,
    pub prev: Arc<AppState>,
}

/// How a mutation is announced to subscribers
///
/// A throttled trailing delivery can arrive after later immediate ones and
/// carries the snapshot of the last throttled mutation. Finish a throttled
/// burst with a throttled update so the final snapshot is delivered last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    Immediate,
    Throttled,
    Silent,
}

/// A single scalar field of [`AppState`] with its new value
#[derive(Debug, Clone, PartialEq)]
pub enum StateField {
    Initializing(bool),
    Status(String),
    Error(String),
    Nav(Nav),
    Settings(Settings),
    SettingsPath(String),
    EditSettings(bool),
    NetworkError(String),
    Info(BlockchainInfo),
    InfoLoaded(bool),
    InfoLoading(bool),
    TotalBalances(TotalBalances),
    AddressesLoaded(bool),
    AddressesLoading(bool),
    AddressPageLoading(bool),
    SendFrom(Option<Address>),
    SendingCoins(bool),
    ContributionsLoaded(bool),
    ContributionsLoading(bool),
    ContributionsAdding(bool),
    IsWatchOperation(bool),
}

impl StateField {
    fn apply(self, s: &mut AppState) {
        match self {
            StateField::Initializing(v) => s.initializing = v,
            StateField::Status(v) => s.status = v,
            StateField::Error(v) => s.error = v,
            StateField::Nav(v) => s.nav = v,
            StateField::Settings(v) => s.settings = v,
            StateField::SettingsPath(v) => s.settings_path = v,
            StateField::EditSettings(v) => s.edit_settings = v,
            StateField::NetworkError(v) => s.network_error = v,
            StateField::Info(v) => s.info = v,
            StateField::InfoLoaded(v) => s.info_loaded = v,
            StateField::InfoLoading(v) => s.info_loading = v,
            StateField::TotalBalances(v) => s.total_balances = v,
            StateField::AddressesLoaded(v) => s.addresses_loaded = v,
            StateField::AddressesLoading(v) => s.addresses_loading = v,
            StateField::AddressPageLoading(v) => s.address_page_loading = v,
            StateField::SendFrom(v) => s.send_from = v,
            StateField::SendingCoins(v) => s.sending_coins = v,
            StateField::ContributionsLoaded(v) => s.contributions_loaded = v,
            StateField::ContributionsLoading(v) => s.contributions_loading = v,
            StateField::ContributionsAdding(v) => s.contributions_adding = v,
            StateField::IsWatchOperation(v) => s.is_watch_operation = v,
        }
    }
}

pub struct EntityStore {
    state: Mutex<Arc<AppState>>,
    events: broadcast::Sender<StateChange>,
    throttle: Throttle<StateChange>,
}

impl EntityStore {
    pub fn new(throttle_window: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let sink = events.clone();
        let throttle = Throttle::new(throttle_window, move |change| {
            // No subscribers is fine
            let _ = sink.send(change);
        });

        Self {
            state: Mutex::new(Arc::new(AppState::default())),
            events,
            throttle,
        }
    }

    /// Current snapshot
    pub fn read(&self) -> Arc<AppState> {
        Arc::clone(&self.lock())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    pub fn set_scalar(&self, field: StateField, emit: Emit) -> StateChange {
        self.mutate(emit, |s| field.apply(s))
    }

    /// Apply several fields as one transition with one emission
    pub fn set_many(&self, fields: Vec<StateField>, emit: Emit) -> StateChange {
        self.mutate(emit, |s| {
            for field in fields {
                field.apply(s);
            }
        })
    }

    /// Merge a partial entity update, materializing the entity if needed
    pub fn merge_entity<P: EntityPatch>(&self, patch: P, emit: Emit) -> StateChange {
        self.mutate(emit, |s| merge_into(P::Target::map_mut(s), patch))
    }

    /// Partially replace the paginated view of `E`
    pub fn replace_page<E: Paged>(&self, patch: PagePatch<E>, emit: Emit) -> StateChange {
        self.mutate(emit, |s| patch.apply(E::page_mut(s)))
    }

    /// Rows of page `page` of `E`, highest balance first
    pub fn paginate<E: Paged>(&self, page: usize, per_page: usize) -> Vec<E> {
        paginate(E::map(&self.read()), page, per_page)
    }

    /// Append a numbered line to the activity log without publishing
    pub fn add_log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        log::info!("{}", message);
        self.mutate(Emit::Silent, |s| {
            let line = format!("{}) {}", s.log.len() + 1, message);
            s.log.push(line);
        });
    }

    pub fn latest_operation(&self) -> Option<Operation> {
        self.read().latest_operation().cloned()
    }

    fn mutate<F: FnOnce(&mut AppState)>(&self, emit: Emit, f: F) -> StateChange {
        let change = {
            let mut current = self.lock();
            let prev = Arc::clone(&current);
            let mut next = (*prev).clone();
            f(&mut next);
            let next = Arc::new(next);
            *current = Arc::clone(&next);
            StateChange { state: next, prev }
        };

        match emit {
            Emit::Immediate => {
                let _ = self.events.send(change.clone());
            }
            // Requires a tokio runtime
            Emit::Throttled => self.throttle.call(change.clone()),
            Emit::Silent => {}
        }
        change
    }

    fn lock(&self) -> MutexGuard<'_, Arc<AppState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
