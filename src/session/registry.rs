//! Maps session identifiers to live interpreters, one lock per identifier.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{Session, SessionOptions};
use crate::{
    error::{EvalError, Result},
    execution::ResultType,
    process::Dialect,
};

/// Session identifier meaning "no persistence, run one-shot".
pub const NO_SESSION: &str = "none";

type Slot = Arc<AsyncMutex<Option<Session>>>;

pub struct SessionRegistry {
    dialect: Arc<dyn Dialect>,
    options: SessionOptions,
    slots: Mutex<HashMap<String, Slot>>,
}

pub enum SessionHandle {
    /// Route to a fresh one-shot process.
    OneShot,
    Interactive(SessionLease),
}

/// Exclusive use of one live session until dropped.
pub struct SessionLease {
    id: String,
    slot: Slot,
    guard: OwnedMutexGuard<Option<Session>>,
}

impl SessionLease {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn run(&mut self, source: &str, kind: ResultType, pp: bool) -> Result<String> {
        match &mut *self.guard {
            Some(session) => session.run(source, kind, pp).await,
            None => Err(EvalError::SessionExited { session: self.id.clone() }),
        }
    }
}

impl SessionRegistry {
    pub fn new(dialect: Arc<dyn Dialect>, options: SessionOptions) -> Self {
        Self { dialect, options, slots: Mutex::new(HashMap::new()) }
    }

    fn slot(&self, id: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.entry(id.to_string()).or_default().clone()
    }

    fn is_registered(&self, id: &str, slot: &Slot) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.get(id).is_some_and(|s| Arc::ptr_eq(s, slot))
    }

    fn unregister(&self, id: &str, slot: &Slot) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        if slots.get(id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(id);
        }
    }

    /// Resolve an identifier to a live session, starting one when none is
    /// registered or the registered one has died. Waits while another
    /// evaluation holds the same session.
    pub async fn resolve(&self, id: &str) -> Result<SessionHandle> {
        if id == NO_SESSION {
            return Ok(SessionHandle::OneShot);
        }

        loop {
            let slot = self.slot(id);
            let mut guard = slot.clone().lock_owned().await;
            // Discarded or closed while we waited; take the fresh slot instead.
            if !self.is_registered(id, &slot) {
                continue;
            }

            let live = matches!(&*guard, Some(session) if session.is_alive());
            if !live {
                if guard.is_some() {
                    tracing::debug!(session = id, "registered session is dead; replacing");
                }
                // Dropping the old session reaps its process.
                *guard = None;
                match Session::start(id, self.dialect.clone(), self.options.clone()).await {
                    Ok(session) => *guard = Some(session),
                    Err(e) => {
                        self.unregister(id, &slot);
                        return Err(e);
                    }
                }
            }

            return Ok(SessionHandle::Interactive(SessionLease { id: id.to_string(), slot, guard }));
        }
    }

    /// Tear down a session after a fatal failure so the next resolve
    /// starts over.
    pub fn discard(&self, mut lease: SessionLease) {
        if let Some(mut session) = lease.guard.take() {
            session.kill();
        }
        self.unregister(&lease.id, &lease.slot);
        tracing::debug!(session = %lease.id, "session discarded");
    }

    /// Kill and unregister one session. Returns whether it existed.
    pub async fn close(&self, id: &str) -> bool {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.remove(id)
        };
        let Some(slot) = slot else {
            return false;
        };
        let mut guard = slot.lock().await;
        match guard.take() {
            Some(mut session) => {
                session.kill();
                tracing::debug!(session = id, "session closed");
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&self) {
        let ids: Vec<String> = {
            let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.keys().cloned().collect()
        };
        for id in ids {
            self.close(&id).await;
        }
    }

    /// Identifiers with a live process, sorted. A slot that is busy counts
    /// as live; an empty or dead one is left out until resolved again.
    pub fn sessions(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| match slot.try_lock() {
                Ok(guard) => matches!(&*guard, Some(session) if session.is_alive()),
                Err(_) => true,
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
