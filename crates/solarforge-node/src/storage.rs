//! RocksDB storage backend for the SolarForge node.
//!
//! Every record is a JSON document keyed by its id. Conditional updates run
//! read-modify-write under a single write mutex.

use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use solarforge_core::{
    ForgeStats, Galaxy, GalaxyId, Issue, IssueForgeState, IssueId, User, UserId, UserStarSnapshot,
    Version, VersionId,
};
use solarforge_settlement::ledger;
use solarforge_settlement::{
    GalaxySpaceStore, GalaxyStore, IssueStore, StatsStore, StoreError, UserStore, VersionStore,
};

/// Column family names for different data types.
const CF_ISSUES: &str = "issues";
const CF_USERS: &str = "users";
const CF_GALAXIES: &str = "galaxies";
const CF_VERSIONS: &str = "versions";
const CF_GALAXY_SPACE: &str = "galaxy_space";

/// RocksDB-backed storage for the SolarForge node.
pub struct RocksStore {
    db: DB,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ISSUES, Options::default()),
            ColumnFamilyDescriptor::new(CF_USERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_GALAXIES, Options::default()),
            ColumnFamilyDescriptor::new(CF_VERSIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_GALAXY_SPACE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    /// Put a value into a column family.
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        self.db.put_cf(&cf, key, value)?;
        Ok(())
    }

    /// Get a value from a column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| anyhow::anyhow!("column family '{}' not found", cf_name))?;
        let value = self.db.get_cf(&cf, key)?;
        Ok(value)
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Encoding(e.to_string()))?;
        self.put(cf_name, key.as_bytes(), &bytes)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>, StoreError> {
        let bytes = self
            .get(cf_name, key.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        bytes
            .map(|b| serde_json::from_slice(&b).map_err(|e| StoreError::Encoding(e.to_string())))
            .transpose()
    }

    /// Every record of a column family, in key order.
    fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>, StoreError> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Backend(format!("column family '{}' not found", cf_name)))?;
        let mut records = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            records.push(
                serde_json::from_slice(&value).map_err(|e| StoreError::Encoding(e.to_string()))?,
            );
        }
        Ok(records)
    }

    /// Read-modify-write one issue under the write lock.
    ///
    /// `f` returns whether it changed the record; nothing is written otherwise.
    fn update_issue<F>(&self, id: &IssueId, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Issue) -> bool,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Backend("write lock poisoned".into()))?;
        let Some(mut issue) = self.get_json::<Issue>(CF_ISSUES, id.as_str())? else {
            return Ok(false);
        };
        if !f(&mut issue) {
            return Ok(false);
        }
        self.put_json(CF_ISSUES, id.as_str(), &issue)?;
        Ok(true)
    }

    fn update_user<F>(&self, id: &UserId, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut User),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Backend("write lock poisoned".into()))?;
        let Some(mut user) = self.get_json::<User>(CF_USERS, id.as_str())? else {
            return Ok(false);
        };
        f(&mut user);
        self.put_json(CF_USERS, id.as_str(), &user)?;
        Ok(true)
    }

    /// Create or edit an issue. The forge lifecycle fields and, on edits,
    /// the credits are kept from the stored record. Returns what was stored.
    pub fn upsert_issue(&self, issue: Issue) -> Result<Issue, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Backend("write lock poisoned".into()))?;
        let stored = self.get_json::<Issue>(CF_ISSUES, issue.id.as_str())?;
        let merged = ledger::upsert_issue(stored.as_ref(), issue);
        self.put_json(CF_ISSUES, merged.id.as_str(), &merged)?;
        Ok(merged)
    }

    /// Create or edit a user, keeping an existing reward balance.
    pub fn upsert_user(&self, user: User) -> Result<User, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Backend("write lock poisoned".into()))?;
        let stored = self.get_json::<User>(CF_USERS, user.id.as_str())?;
        let merged = ledger::upsert_user(stored.as_ref(), user);
        self.put_json(CF_USERS, merged.id.as_str(), &merged)?;
        Ok(merged)
    }

    pub fn put_galaxy(&self, galaxy: &Galaxy) -> Result<(), StoreError> {
        self.put_json(CF_GALAXIES, galaxy.id.as_str(), galaxy)
    }

    pub fn put_version(&self, version: &Version) -> Result<(), StoreError> {
        self.put_json(CF_VERSIONS, version.id.as_str(), version)
    }

    /// Attach sunshines to an open issue. Returns `false` if the issue does
    /// not exist or is reserved or settled.
    pub fn add_credits(&self, id: &IssueId, amount: u64) -> Result<bool, StoreError> {
        self.update_issue(id, |issue| {
            if issue.forge_state() != IssueForgeState::Open {
                return false;
            }
            issue.credits = issue.credits.saturating_add(amount);
            true
        })
    }

    fn space_key(galaxy_id: &GalaxyId, user_id: &UserId) -> String {
        format!("{}/{}", galaxy_id, user_id)
    }
}

#[async_trait]
impl IssueStore for RocksStore {
    async fn get_issue(&self, id: &IssueId) -> Result<Option<Issue>, StoreError> {
        self.get_json(CF_ISSUES, id.as_str())
    }

    async fn has_settlement_marker(&self, id: &IssueId) -> Result<bool, StoreError> {
        Ok(self
            .get_json::<Issue>(CF_ISSUES, id.as_str())?
            .map(|i| i.settlement_marker.is_some())
            .unwrap_or(false))
    }

    async fn apply_forge(
        &self,
        id: &IssueId,
        reward_delta: u64,
        expected_prior_credits: u64,
    ) -> Result<bool, StoreError> {
        self.update_issue(id, |issue| {
            ledger::reserve(issue, reward_delta, expected_prior_credits)
        })
    }

    async fn set_settlement_marker(
        &self,
        id: &IssueId,
        tx_hash: &str,
    ) -> Result<bool, StoreError> {
        self.update_issue(id, |issue| ledger::confirm(issue, tx_hash))
    }

    async fn revert_forge(
        &self,
        id: &IssueId,
        reward_delta: u64,
        restored_credits: u64,
    ) -> Result<bool, StoreError> {
        self.update_issue(id, |issue| {
            ledger::release(issue, reward_delta, restored_credits)
        })
    }

    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<IssueId>, StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Backend("write lock poisoned".into()))?;
        let mut released = Vec::new();
        for mut issue in self.scan_json::<Issue>(CF_ISSUES)? {
            if ledger::release_stale(&mut issue, cutoff).is_some() {
                self.put_json(CF_ISSUES, issue.id.as_str(), &issue)?;
                released.push(issue.id);
            }
        }
        Ok(released)
    }
}

#[async_trait]
impl StatsStore for RocksStore {
    async fn stats(&self) -> Result<ForgeStats, StoreError> {
        let users = self.scan_json::<User>(CF_USERS)?;
        let issues = self.scan_json::<Issue>(CF_ISSUES)?;
        let galaxies = self.scan_json::<Galaxy>(CF_GALAXIES)?;
        Ok(ForgeStats {
            total_galaxies: galaxies.len() as u64,
            total_stars: users
                .iter()
                .fold(0u64, |acc, u| acc.saturating_add(u.reward_balance)),
            total_users: users.len() as u64,
            total_sunshines: issues
                .iter()
                .fold(0u64, |acc, i| acc.saturating_add(i.credits)),
        })
    }
}

#[async_trait]
impl UserStore for RocksStore {
    async fn add_reward(&self, user_id: &UserId, amount: u64) -> Result<bool, StoreError> {
        self.update_user(user_id, |user| {
            user.reward_balance = user.reward_balance.saturating_add(amount);
        })
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        self.get_json(CF_USERS, id.as_str())
    }
}

#[async_trait]
impl GalaxyStore for RocksStore {
    async fn get_galaxy(&self, id: &GalaxyId) -> Result<Option<Galaxy>, StoreError> {
        self.get_json(CF_GALAXIES, id.as_str())
    }
}

#[async_trait]
impl VersionStore for RocksStore {
    async fn get_version(&self, id: &VersionId) -> Result<Option<Version>, StoreError> {
        self.get_json(CF_VERSIONS, id.as_str())
    }
}

#[async_trait]
impl GalaxySpaceStore for RocksStore {
    async fn upsert_user_star(&self, snapshot: UserStarSnapshot) -> Result<(), StoreError> {
        let key = Self::space_key(&snapshot.galaxy_id, &snapshot.user_id);
        self.put_json(CF_GALAXY_SPACE, &key, &snapshot)
    }

    async fn get_user_star(
        &self,
        galaxy_id: &GalaxyId,
        user_id: &UserId,
    ) -> Result<Option<UserStarSnapshot>, StoreError> {
        self.get_json(CF_GALAXY_SPACE, &Self::space_key(galaxy_id, user_id))
    }

    async fn galaxy_space(
        &self,
        galaxy_id: &GalaxyId,
    ) -> Result<Vec<UserStarSnapshot>, StoreError> {
        let cf = self
            .db
            .cf_handle(CF_GALAXY_SPACE)
            .ok_or_else(|| StoreError::Backend("column family 'galaxy_space' not found".into()))?;
        let prefix = format!("{}/", galaxy_id);

        let mut stars = Vec::new();
        let iter = self.db.iterator_cf(
            &cf,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let star: UserStarSnapshot =
                serde_json::from_slice(&value).map_err(|e| StoreError::Encoding(e.to_string()))?;
            if star.galaxy_id == *galaxy_id {
                stars.push(star);
            }
        }
        Ok(stars)
    }
}
