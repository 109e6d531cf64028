use crate::crd::AppliedState;
use crate::error::format_error_chain;
use crate::telemetry::SyncLog;

use super::{InfoCatalog, State, SyncFailure, SyncState, WatchSources};

/// Result of one state within a manager run
#[derive(Debug)]
pub struct StateResult {
    pub name: String,
    pub state: SyncState,
    pub error: Option<SyncFailure>,
}

/// Results of syncing every state of a manager
#[derive(Debug)]
pub struct Results {
    pub status: SyncState,
    pub states: Vec<StateResult>,
}

impl Results {
    /// Per-state results in the shape recorded on a resource status
    pub fn applied_states(&self) -> Vec<AppliedState> {
        self.states
            .iter()
            .map(|r| AppliedState {
                name: r.name.clone(),
                state: r.state.to_string(),
            })
            .collect()
    }

    /// Error chains of the failed states, one line per state
    pub fn reason(&self) -> Option<String> {
        let reasons: Vec<String> = self
            .states
            .iter()
            .filter_map(|r| {
                r.error
                    .as_ref()
                    .map(|e| format!("{}: {}", r.name, format_error_chain(e)))
            })
            .collect();
        (!reasons.is_empty()).then(|| reasons.join("\n"))
    }
}

/// Overall verdict of a set of state results
pub fn overall_state<'a>(states: impl IntoIterator<Item = &'a SyncState>) -> SyncState {
    let mut overall = SyncState::Ready;
    for state in states {
        match state {
            SyncState::Error => return SyncState::Error,
            SyncState::NotReady => overall = SyncState::NotReady,
            SyncState::Ready | SyncState::Ignore => {}
        }
    }
    overall
}

/// Ordered states synced together for resources of type `K`
pub struct StateManager<K: Send + Sync> {
    states: Vec<Box<dyn State<K>>>,
    log: SyncLog,
}

impl<K: Send + Sync> StateManager<K> {
    pub fn new(states: Vec<Box<dyn State<K>>>, log: &SyncLog) -> Self {
        Self {
            states,
            log: log.scoped("state-manager"),
        }
    }

    pub fn states(&self) -> impl Iterator<Item = &dyn State<K>> {
        self.states.iter().map(|s| s.as_ref())
    }

    /// Sync every state in order; a failing state does not stop the others
    pub async fn sync_state(&self, cr: &K, catalog: &InfoCatalog) -> Results {
        let mut states = Vec::with_capacity(self.states.len());

        for state in &self.states {
            let result = match state.sync(cr, catalog).await {
                Ok(sync_state) => StateResult {
                    name: state.name().to_string(),
                    state: sync_state,
                    error: None,
                },
                Err(failure) => {
                    self.log.error(format_args!(
                        "State {} ended {}: {}",
                        state.name(),
                        failure.state,
                        format_error_chain(&failure.source)
                    ));
                    StateResult {
                        name: state.name().to_string(),
                        state: failure.state,
                        error: Some(failure),
                    }
                }
            };
            self.log
                .debug(format_args!("State {} is {}", result.name, result.state));
            states.push(result);
        }

        let status = overall_state(states.iter().map(|r| &r.state));
        self.log.info(format_args!("Overall sync state: {}", status));
        Results { status, states }
    }

    /// Union of the watch sources of every state
    pub fn watch_sources(&self) -> WatchSources {
        self.states
            .iter()
            .flat_map(|s| s.watch_sources().clone())
            .collect()
    }
}
