use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    api::RegistryClient,
    error::ApiResult,
    models::UserView,
};

/// Snapshot of the current session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// No refresh has completed yet.
    #[default]
    Unknown,
    Anonymous,
    Authenticated(UserView),
}

impl SessionState {
    pub fn user(&self) -> Option<&UserView> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }
}

/// Answers "who is the caller" using whatever credential the transport holds.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn current_user(&self) -> ApiResult<Option<UserView>>;
}

#[async_trait]
impl IdentitySource for RegistryClient {
    async fn current_user(&self) -> ApiResult<Option<UserView>> {
        self.show_user_self().await
    }
}

/// Owner of the session snapshot.
///
/// Readers take snapshots with [`SessionStore::get`] or follow changes
/// through [`SessionStore::subscribe`]. Only [`SessionStore::refresh`]
/// writes.
pub struct SessionStore {
    source: Arc<dyn IdentitySource>,
    state: watch::Sender<SessionState>,
    // Generation of the newest refresh; older refreshes may not publish.
    latest: Mutex<u64>,
}

impl SessionStore {
    pub fn new(source: Arc<dyn IdentitySource>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            source,
            state,
            latest: Mutex::new(0),
        }
    }

    /// Current snapshot.
    pub fn get(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<UserView> {
        self.state.borrow().user().cloned()
    }

    /// Receiver woken on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Ask the registry who is logged in and publish the answer.
    ///
    /// Failures are logged and treated as "nobody". When refreshes overlap
    /// only the one started last publishes. Returns the snapshot after the
    /// call, which may come from a newer refresh.
    pub async fn refresh(&self) -> SessionState {
        let generation = {
            let mut latest = self.latest.lock();
            *latest += 1;
            *latest
        };

        let next = match self.source.current_user().await {
            Ok(Some(user)) => SessionState::Authenticated(user),
            Ok(None) => SessionState::Anonymous,
            Err(err) => {
                warn!(error = %err, "session refresh failed; treating as logged out");
                SessionState::Anonymous
            }
        };

        let latest = self.latest.lock();
        if *latest != generation {
            debug!(generation, latest = *latest, "dropping superseded session refresh");
            return self.get();
        }
        match &next {
            SessionState::Authenticated(user) => info!(user = %user.name, "session authenticated"),
            _ => info!("session anonymous"),
        }
        self.state.send_replace(next.clone());
        next
    }
}
