// src/store.rs
//! Persistence sink: organizations (read), attempts and snapshots (append-only),
//! and the per-day spend ledger (read/upsert).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::{AumSnapshot, NewOrganization, Organization, SourceAttempt, SpendLedger};

/// Each write is one row, committed immediately; no cross-row transactions.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// All organizations when `ids` is `None`, otherwise those whose id is listed.
    async fn list_organizations(&self, ids: Option<&[i64]>) -> Result<Vec<Organization>>;
    async fn add_organization(&self, new: NewOrganization) -> Result<Organization>;

    async fn append_attempt(&self, attempt: SourceAttempt) -> Result<()>;
    /// Newest first.
    async fn recent_attempts(&self, limit: usize) -> Result<Vec<SourceAttempt>>;

    async fn append_snapshot(&self, snapshot: AumSnapshot) -> Result<()>;
    /// Newest first.
    async fn snapshots(&self) -> Result<Vec<AumSnapshot>>;

    async fn usage_for(&self, date: NaiveDate) -> Result<Option<SpendLedger>>;
    async fn upsert_usage(&self, record: SpendLedger) -> Result<()>;
}

pub type DynSink = Arc<dyn PersistenceSink>;

#[derive(Debug, Default)]
struct Tables {
    next_org_id: i64,
    organizations: Vec<Organization>,
    attempts: Vec<SourceAttempt>,
    snapshots: Vec<AumSnapshot>,
    usage: Vec<SpendLedger>,
}

/// In-process store guarded by a single mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed organizations from a JSON array of `NewOrganization`.
    pub fn from_seed_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading organization seed from {}", path.display()))?;
        Self::from_seed_json(&data)
    }

    pub fn from_seed_json(json: &str) -> Result<Self> {
        let items: Vec<NewOrganization> =
            serde_json::from_str(json).context("parsing organization seed json")?;
        let store = Self::new();
        {
            let mut t = store.tables()?;
            for item in items {
                insert_org(&mut t, item);
            }
        }
        Ok(store)
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.inner.lock().map_err(|_| anyhow!("store mutex poisoned"))
    }
}

fn insert_org(t: &mut Tables, new: NewOrganization) -> Organization {
    t.next_org_id += 1;
    let org = Organization {
        id: t.next_org_id,
        name: new.name.trim().to_string(),
        url_site: new.url_site,
        url_linkedin: new.url_linkedin,
        url_instagram: new.url_instagram,
        url_x: new.url_x,
        created_at: Utc::now(),
    };
    t.organizations.push(org.clone());
    org
}

#[async_trait]
impl PersistenceSink for MemoryStore {
    async fn list_organizations(&self, ids: Option<&[i64]>) -> Result<Vec<Organization>> {
        let t = self.tables()?;
        Ok(match ids {
            None => t.organizations.clone(),
            Some(ids) => t
                .organizations
                .iter()
                .filter(|o| ids.contains(&o.id))
                .cloned()
                .collect(),
        })
    }

    async fn add_organization(&self, new: NewOrganization) -> Result<Organization> {
        if new.name.trim().is_empty() {
            return Err(anyhow!("organization name must not be empty"));
        }
        let mut t = self.tables()?;
        Ok(insert_org(&mut t, new))
    }

    async fn append_attempt(&self, attempt: SourceAttempt) -> Result<()> {
        self.tables()?.attempts.push(attempt);
        Ok(())
    }

    async fn recent_attempts(&self, limit: usize) -> Result<Vec<SourceAttempt>> {
        let t = self.tables()?;
        Ok(t.attempts.iter().rev().take(limit).cloned().collect())
    }

    async fn append_snapshot(&self, snapshot: AumSnapshot) -> Result<()> {
        self.tables()?.snapshots.push(snapshot);
        Ok(())
    }

    async fn snapshots(&self) -> Result<Vec<AumSnapshot>> {
        let t = self.tables()?;
        Ok(t.snapshots.iter().rev().cloned().collect())
    }

    async fn usage_for(&self, date: NaiveDate) -> Result<Option<SpendLedger>> {
        let t = self.tables()?;
        Ok(t.usage.iter().find(|u| u.date == date).cloned())
    }

    async fn upsert_usage(&self, record: SpendLedger) -> Result<()> {
        let mut t = self.tables()?;
        match t.usage.iter_mut().find(|u| u.date == record.date) {
            Some(existing) => *existing = record,
            None => t.usage.push(record),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttemptStatus;

    #[tokio::test]
    async fn seed_assigns_sequential_ids_and_filters_by_id() {
        let store = MemoryStore::from_seed_json(
            r#"[{"name":"Alfa"},{"name":"Beta","url_site":"https://beta.com"},{"name":"Gama"}]"#,
        )
        .unwrap();
        let all = store.list_organizations(None).await.unwrap();
        assert_eq!(all.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2, 3]);

        let some = store.list_organizations(Some(&[2, 99])).await.unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].name, "Beta");
    }

    #[tokio::test]
    async fn attempts_are_returned_newest_first() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .append_attempt(SourceAttempt {
                    organization_id: i,
                    url: format!("https://o{i}.com"),
                    status: AttemptStatus::Success,
                    content_length: 1,
                    error_message: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let recent = store.recent_attempts(2).await.unwrap();
        assert_eq!(
            recent.iter().map(|a| a.organization_id).collect::<Vec<_>>(),
            vec![2, 1]
        );
    }

    #[tokio::test]
    async fn upsert_replaces_same_day_record() {
        let store = MemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        store.upsert_usage(SpendLedger::empty(day)).await.unwrap();
        let mut rec = SpendLedger::empty(day);
        rec.total_tokens = 500;
        store.upsert_usage(rec.clone()).await.unwrap();
        assert_eq!(store.usage_for(day).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let store = MemoryStore::new();
        let err = store
            .add_organization(NewOrganization {
                name: "  ".into(),
                ..Default::default()
            })
            .await;
        assert!(err.is_err());
    }
}
