use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::protocol::ThermostatApi;
use crate::transport::Transport;
use crate::{Error, Result};

pub const DEFAULT_SESSION_CALLS: u32 = 300;

#[derive(Debug)]
struct Session {
    id: String,
    calls_left: u32,
}

// The slot is never locked across an `.await`; concurrent callers that
// find no session each log in.
pub(crate) struct SessionManager {
    slot: Mutex<Option<Session>>,
    calls_per_session: u32,
}

impl SessionManager {
    pub fn new(calls_per_session: u32) -> Self {
        Self {
            slot: Mutex::new(None),
            calls_per_session: calls_per_session.max(1),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.slot().as_ref().is_some_and(|s| s.calls_left > 0)
    }

    pub async fn ensure_authenticated(&self, transport: &Transport, api: &dyn ThermostatApi) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }
        let id = self.exchange(transport, api).await?;
        self.store(id, 0);
        Ok(())
    }

    pub async fn acquire(&self, transport: &Transport, api: &dyn ThermostatApi) -> Result<String> {
        if let Some(id) = self.take_call() {
            return Ok(id);
        }
        let id = self.exchange(transport, api).await?;
        self.store(id.clone(), 1);
        Ok(id)
    }

    pub fn invalidate(&self) {
        if self.slot().take().is_some() {
            debug!("session invalidated");
        }
    }

    async fn exchange(&self, transport: &Transport, api: &dyn ThermostatApi) -> Result<String> {
        self.invalidate();
        debug!(series = ?api.series(), "logging in");

        let response = transport.send(&api.login_request()).await?;
        if response.is_auth_rejection() {
            return Err(Error::Authentication(format!(
                "login rejected with HTTP {}",
                response.status
            )));
        }
        api.parse_login_response(&response.body)
    }

    fn take_call(&self) -> Option<String> {
        let mut slot = self.slot();
        let session = slot.as_mut().filter(|s| s.calls_left > 0)?;
        session.calls_left -= 1;
        Some(session.id.clone())
    }

    fn store(&self, id: String, used: u32) {
        *self.slot() = Some(Session {
            id,
            calls_left: self.calls_per_session.saturating_sub(used),
        });
    }

    fn slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
