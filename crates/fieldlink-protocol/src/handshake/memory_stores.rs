//! In-memory implementations of the handshake stores.
//!
//! Entries carry an expiry instant and read as absent once it has passed,
//! whether or not `purge_expired` has run yet. Touching a session moves its
//! expiry forward. Data is lost on process exit.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::ProtocolError;
use crate::handshake::store::{PreKeyRecord, PreKeyStore, SessionRecord, SessionStore};

struct Expiring<T> {
    /// `None` when the TTL overflows the clock, i.e. never.
    expires_at: Option<Instant>,
    value: T,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(ttl),
            value,
        }
    }

    fn renew(&mut self, now: Instant, ttl: Duration) {
        self.expires_at = now.checked_add(ttl);
    }

    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }
}

fn purge<T>(entries: &mut HashMap<String, Expiring<T>>) -> usize {
    let now = Instant::now();
    let before = entries.len();
    entries.retain(|_, entry| entry.is_live(now));
    before - entries.len()
}

/// In-memory pre-key store.
#[derive(Default)]
pub struct MemoryPreKeyStore {
    records: Mutex<HashMap<String, Expiring<PreKeyRecord>>>,
}

impl MemoryPreKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PreKeyStore for MemoryPreKeyStore {
    fn insert(&self, record: PreKeyRecord, ttl: Duration) -> Result<(), ProtocolError> {
        self.records
            .lock()
            .insert(record.index.clone(), Expiring::new(record, ttl));
        Ok(())
    }

    fn take(&self, index: &str) -> Result<Option<PreKeyRecord>, ProtocolError> {
        let entry = self.records.lock().remove(index);
        Ok(entry
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value))
    }

    fn purge_expired(&self) -> Result<usize, ProtocolError> {
        Ok(purge(&mut self.records.lock()))
    }
}

/// In-memory session store, keyed by token.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Expiring<SessionRecord>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn insert(&self, record: SessionRecord, ttl: Duration) -> Result<(), ProtocolError> {
        self.sessions
            .lock()
            .insert(record.token.clone(), Expiring::new(record, ttl));
        Ok(())
    }

    fn get(&self, token: &str) -> Result<Option<SessionRecord>, ProtocolError> {
        Ok(self
            .sessions
            .lock()
            .get(token)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    fn touch(&self, token: &str, ttl: Duration) -> Result<Option<SessionRecord>, ProtocolError> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        let Some(entry) = sessions.get_mut(token).filter(|e| e.is_live(now)) else {
            return Ok(None);
        };
        entry.renew(now, ttl);
        Ok(Some(entry.value.clone()))
    }

    fn invalidate(&self, token: &str) -> Result<bool, ProtocolError> {
        Ok(self
            .sessions
            .lock()
            .remove(token)
            .is_some_and(|e| e.is_live(Instant::now())))
    }

    fn purge_expired(&self) -> Result<usize, ProtocolError> {
        Ok(purge(&mut self.sessions.lock()))
    }
}
