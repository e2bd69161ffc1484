//! Process-wide store for pending approvals.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};
use uuid::Uuid;

use crate::error::{ApprovalError, ApprovalResult};
use crate::record::{ApprovalRecord, ApprovalRequest, command_hash};

/// Default time an approval stays valid.
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Default bound on pending approvals per org.
pub const DEFAULT_MAX_PENDING: usize = 100;

static SHARED: LazyLock<Arc<ApprovalStore>> = LazyLock::new(|| Arc::new(ApprovalStore::new()));

type OrgRecords = HashMap<String, ApprovalRecord>;

/// Counts reported by [`ApprovalStore::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalStats {
    /// Orgs with at least one record.
    pub orgs: usize,
    /// Unexpired records.
    pub pending: usize,
    /// Expired records not yet swept.
    pub expired: usize,
}

/// Pending approvals keyed by org.
///
/// Thread-safe via an internal [`RwLock`]. [`consume`](Self::consume)
/// checks and removes under a single write lock, so two concurrent
/// consumers of one approval see exactly one success.
///
/// # Example
///
/// ```
/// use pulse_approval::{ApprovalRequest, ApprovalStore};
///
/// let store = ApprovalStore::new();
/// let record = store
///     .create("org", ApprovalRequest::new("systemctl restart nginx", "host", "delly-agent"))
///     .unwrap();
///
/// assert!(!store.consume("org", &record.id, "systemctl restart nginx", "host", "other-agent"));
/// assert!(store.consume("org", &record.id, "systemctl restart nginx", "host", "delly-agent"));
/// assert!(!store.consume("org", &record.id, "systemctl restart nginx", "host", "delly-agent"));
/// ```
pub struct ApprovalStore {
    records: RwLock<HashMap<String, OrgRecords>>,
    ttl: Duration,
    max_pending: usize,
}

impl ApprovalStore {
    /// Store with the default TTL and capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(600),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    /// Store with explicit settings. A `max_pending` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidTtl`] if `ttl_secs` cannot be
    /// represented as a duration.
    pub fn with_settings(ttl_secs: u64, max_pending: usize) -> ApprovalResult<Self> {
        let secs = i64::try_from(ttl_secs).map_err(|_| ApprovalError::InvalidTtl(ttl_secs))?;
        let ttl = Duration::try_seconds(secs).ok_or(ApprovalError::InvalidTtl(ttl_secs))?;
        Ok(Self {
            records: RwLock::new(HashMap::new()),
            ttl,
            max_pending: max_pending.max(1),
        })
    }

    /// The process-wide store.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new approval for `org_id`.
    ///
    /// When the org is at capacity, its oldest record is evicted.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidRequest`] when the command, action
    /// type, or target is empty, and [`ApprovalError::Storage`] if the lock
    /// is poisoned.
    pub fn create(&self, org_id: &str, request: ApprovalRequest) -> ApprovalResult<ApprovalRecord> {
        for (field, value) in [
            ("command", &request.command),
            ("action_type", &request.action_type),
            ("target_id", &request.target_id),
        ] {
            if value.trim().is_empty() {
                return Err(ApprovalError::InvalidRequest(format!("{field} is empty")));
            }
        }

        let created_at = Utc::now();
        let expires_at = created_at
            .checked_add_signed(self.ttl)
            .ok_or(ApprovalError::InvalidTtl(self.ttl.num_seconds().unsigned_abs()))?;
        let record = ApprovalRecord {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            command_hash: command_hash(&request.command, &request.action_type, &request.target_id),
            command: request.command,
            action_type: request.action_type,
            target_id: request.target_id,
            target_label: request.target_label,
            rationale: request.rationale,
            risk_level: request.risk_level,
            created_at,
            expires_at,
        };

        let mut store = self
            .records
            .write()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        let org = store.entry(org_id.to_string()).or_default();
        org.retain(|_, r| !r.is_expired_at(created_at));
        while org.len() >= self.max_pending {
            let Some(oldest) = org
                .values()
                .min_by_key(|r| r.created_at)
                .map(|r| r.id.clone())
            else {
                break;
            };
            tracing::warn!(
                org_id,
                approval_id = %oldest,
                "Approval capacity reached, evicting oldest"
            );
            org.remove(&oldest);
        }
        org.insert(record.id.clone(), record.clone());

        tracing::info!(
            org_id,
            approval_id = %record.id,
            action_type = %record.action_type,
            target_id = %record.target_id,
            risk = %record.risk_level,
            "Approval issued"
        );
        Ok(record)
    }

    /// Consume an approval.
    ///
    /// Removes the record and returns `true` if and only if it exists, has
    /// not expired, and is bound to exactly this command, action type, and
    /// target. A binding mismatch leaves the record in place; an expired
    /// record is removed.
    #[must_use]
    pub fn consume(
        &self,
        org_id: &str,
        approval_id: &str,
        command: &str,
        action_type: &str,
        target_id: &str,
    ) -> bool {
        let now = Utc::now();
        let mut store = self.records.write().unwrap_or_else(|e| {
            tracing::warn!("ApprovalStore lock poisoned, recovering");
            e.into_inner()
        });
        let Some(org) = store.get_mut(org_id) else {
            return false;
        };
        let Some(record) = org.get(approval_id) else {
            return false;
        };
        if record.is_expired_at(now) {
            org.remove(approval_id);
            tracing::info!(org_id, approval_id, "Approval expired before use");
            return false;
        }
        if !record.binds(command, action_type, target_id) {
            tracing::warn!(
                org_id,
                approval_id,
                action_type,
                target_id,
                "Approval presented for a different command or target"
            );
            return false;
        }
        org.remove(approval_id);
        if org.is_empty() {
            store.remove(org_id);
        }
        tracing::info!(org_id, approval_id, "Approval consumed");
        true
    }

    /// Look up an unexpired record.
    #[must_use]
    pub fn get(&self, org_id: &str, approval_id: &str) -> Option<ApprovalRecord> {
        let now = Utc::now();
        let store = self.records.read().unwrap_or_else(|e| {
            tracing::warn!("ApprovalStore read lock poisoned, recovering");
            e.into_inner()
        });
        store
            .get(org_id)?
            .get(approval_id)
            .filter(|r| !r.is_expired_at(now))
            .cloned()
    }

    /// Unexpired records for `org_id`, oldest first.
    #[must_use]
    pub fn pending(&self, org_id: &str) -> Vec<ApprovalRecord> {
        let now = Utc::now();
        let store = self.records.read().unwrap_or_else(|e| {
            tracing::warn!("ApprovalStore read lock poisoned, recovering");
            e.into_inner()
        });
        let mut records: Vec<ApprovalRecord> = store
            .get(org_id)
            .map(|org| {
                org.values()
                    .filter(|r| !r.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Withdraw an approval. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the lock is poisoned.
    pub fn revoke(&self, org_id: &str, approval_id: &str) -> ApprovalResult<bool> {
        let mut store = self
            .records
            .write()
            .map_err(|e| ApprovalError::Storage(e.to_string()))?;
        let removed = store
            .get_mut(org_id)
            .and_then(|org| org.remove(approval_id))
            .is_some();
        if removed {
            tracing::info!(org_id, approval_id, "Approval revoked");
        }
        Ok(removed)
    }

    /// Remove expired records from every org.
    ///
    /// Returns the number of records removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut store) = self.records.write() else {
            return 0;
        };
        let mut removed = 0usize;
        for org in store.values_mut() {
            let before = org.len();
            org.retain(|_, r| !r.is_expired_at(now));
            removed = removed.saturating_add(before.saturating_sub(org.len()));
        }
        store.retain(|_, org| !org.is_empty());
        if removed > 0 {
            tracing::debug!(removed, "Swept expired approvals");
        }
        removed
    }

    /// Current counts.
    #[must_use]
    pub fn stats(&self) -> ApprovalStats {
        let now = Utc::now();
        let Ok(store) = self.records.read() else {
            return ApprovalStats::default();
        };
        let mut stats = ApprovalStats {
            orgs: store.len(),
            ..ApprovalStats::default()
        };
        for record in store.values().flat_map(HashMap::values) {
            if record.is_expired_at(now) {
                stats.expired = stats.expired.saturating_add(1);
            } else {
                stats.pending = stats.pending.saturating_add(1);
            }
        }
        stats
    }

    /// Total records held, expired or not.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records
            .read()
            .map(|s| s.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }
}

impl Default for ApprovalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ApprovalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.count();
        f.debug_struct("ApprovalStore")
            .field("count", &count)
            .field("ttl_secs", &self.ttl.num_seconds())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
