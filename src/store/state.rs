//! In-memory snapshot storage with lazy expiration.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;

use crate::config::StoreConfig;

/// Identifier alphabet: 62 symbols, 8 characters per id.
pub const ID_ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
pub const ID_LEN: usize = 8;

/// Metadata attached to a stored snapshot. `expires_at == None` means the
/// snapshot never expires.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One stored document plus its metadata.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    pub html: String,
    pub content_type: String,
    pub metadata: SnapshotMetadata,
}

/// Outcome of reading a snapshot by identifier.
#[derive(Debug)]
pub enum ReadOutcome {
    Missing,
    /// The entry had expired; it has been deleted as a side effect of this
    /// read, so the next read reports `Missing`.
    Expired,
    Found {
        html: String,
        content_type: String,
    },
}

/// Shared store state behind the router.
pub struct StoreState {
    pub config: StoreConfig,
    entries: DashMap<String, StoredSnapshot>,
}

impl StoreState {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Store a snapshot under a fresh identifier. Collisions are handled by
    /// regeneration; with a 62^8 space they are effectively never hit.
    pub fn insert(&self, snapshot: StoredSnapshot) -> String {
        loop {
            let id = generate_id();
            match self.entries.entry(id.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(snapshot);
                    return id;
                }
            }
        }
    }

    /// Read a snapshot, enforcing expiration lazily: an expired entry is
    /// deleted on the read that detects it.
    pub fn read(&self, id: &str) -> ReadOutcome {
        let expired = match self.entries.get(id) {
            None => return ReadOutcome::Missing,
            Some(entry) => entry
                .metadata
                .expires_at
                .map(|t| t <= Utc::now())
                .unwrap_or(false),
        };

        if expired {
            self.entries.remove(id);
            log::debug!("deleted expired snapshot {id}");
            return ReadOutcome::Expired;
        }

        match self.entries.get(id) {
            Some(entry) => ReadOutcome::Found {
                html: entry.html.clone(),
                content_type: entry.content_type.clone(),
            },
            None => ReadOutcome::Missing,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Parse an `expiresIn` spec: `<integer><unit>` with unit in {m, h, d}.
/// Anything else, including `"never"`, means no expiration; malformed
/// values are treated the same way, silently.
#[must_use]
pub fn parse_expires_in(spec: &str) -> Option<Duration> {
    let spec = spec.trim();
    if spec.len() < 2 || !spec.is_ascii() {
        return None;
    }

    let (count, unit) = spec.split_at(spec.len() - 1);
    let count: i64 = count.parse().ok()?;
    if count <= 0 {
        return None;
    }

    match unit {
        "m" => Some(Duration::minutes(count)),
        "h" => Some(Duration::hours(count)),
        "d" => Some(Duration::days(count)),
        _ => None,
    }
}
