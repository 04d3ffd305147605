use std::{collections::HashMap, fmt};
use subtle::ConstantTimeEq;
use tokio::{sync::Mutex, time::Instant};

use super::{Purpose, Verification};

/// An issued code scoped to `(email, purpose)`.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub email: String,
    pub purpose: Purpose,
    code: String,
    pub expires_at: Instant,
}

impl OtpRecord {
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Time left before the record expires, zero once it has.
    #[must_use]
    pub fn remaining(&self) -> std::time::Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

impl fmt::Debug for OtpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpRecord")
            .field("email", &self.email)
            .field("purpose", &self.purpose)
            .field("code", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

struct Entry {
    code: String,
    expires_at: Instant,
    failed_attempts: u32,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    fn matches(&self, presented: &str) -> bool {
        self.code.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

/// Process-local record store. Every read-modify-write runs under one lock, so an issue and
/// a verify for the same pair are linearized.
pub struct OtpStore {
    records: Mutex<HashMap<(String, Purpose), Entry>>,
    max_attempts: u32,
}

impl OtpStore {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Store a record, superseding any previous one for the pair and pruning expired ones.
    pub async fn insert(
        &self,
        email: &str,
        purpose: Purpose,
        code: &str,
        expires_at: Instant,
    ) -> OtpRecord {
        let now = Instant::now();
        let mut records = self.records.lock().await;
        records.retain(|_, entry| !entry.expired(now));
        records.insert(
            (email.to_string(), purpose),
            Entry {
                code: code.to_string(),
                expires_at,
                failed_attempts: 0,
            },
        );
        OtpRecord {
            email: email.to_string(),
            purpose,
            code: code.to_string(),
            expires_at,
        }
    }

    /// The active record when `code` matches it. Expired records are dropped.
    pub async fn active(&self, email: &str, purpose: Purpose, code: &str) -> Option<OtpRecord> {
        let now = Instant::now();
        let key = (email.to_string(), purpose);
        let mut records = self.records.lock().await;
        let entry = records.get(&key)?;
        if entry.expired(now) {
            records.remove(&key);
            return None;
        }
        if !entry.matches(code) {
            return None;
        }
        Some(OtpRecord {
            email: key.0,
            purpose,
            code: entry.code.clone(),
            expires_at: entry.expires_at,
        })
    }

    /// Check a presented code. `Valid`, `Expired` and the final allowed `Invalid` all remove
    /// the record.
    pub async fn verify(&self, email: &str, purpose: Purpose, presented: &str) -> Verification {
        let now = Instant::now();
        let key = (email.to_string(), purpose);
        let mut records = self.records.lock().await;
        let Some(entry) = records.get_mut(&key) else {
            return Verification::NotFound;
        };

        if entry.expired(now) {
            records.remove(&key);
            return Verification::Expired;
        }

        if entry.matches(presented) {
            records.remove(&key);
            return Verification::Valid;
        }

        entry.failed_attempts += 1;
        if entry.failed_attempts >= self.max_attempts {
            records.remove(&key);
        }
        Verification::Invalid
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
