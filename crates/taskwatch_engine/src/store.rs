//! Durable client-side key/value storage.
//!
//! Values survive restarts the way browser local storage survives reloads.
//! The whole map lives in one RON file rewritten atomically on every change.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use taskwatch_core::{RememberedLogin, RestoredSession, StoreChange};
use watch_logging::{mask_secret, watch_info, watch_warn};

use crate::persist::{write_atomic, StoreError};

pub const SESSION_TOKEN_KEY: &str = "session_token";
pub const BEARER_OVERRIDE_KEY: &str = "bearer_override";
pub const REMEMBERED_LOGIN_KEY: &str = "remembered_login";

#[derive(Debug, Clone)]
pub struct ClientStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ClientStore {
    /// Loads the store at `path`. A missing file is an empty store; so is an
    /// unreadable or corrupt one, which gets overwritten on the next change.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match ron::from_str::<BTreeMap<String, String>>(&text) {
                Ok(entries) => entries,
                Err(err) => {
                    watch_warn!("Discarding corrupt store {:?}: {}", path, err);
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                watch_warn!("Failed to read store {:?}: {}", path, err);
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.into());
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Remembered login, if present and unexpired at `now_ms`.
    ///
    /// Expired and unparsable records are purged and never returned.
    pub fn remembered_login(&mut self, now_ms: i64) -> Result<Option<RememberedLogin>, StoreError> {
        let Some(raw) = self.get(REMEMBERED_LOGIN_KEY) else {
            return Ok(None);
        };
        match serde_json::from_str::<RememberedLogin>(raw) {
            Ok(login) if !login.is_expired(now_ms) => Ok(Some(login)),
            Ok(_) => {
                watch_info!("Remembered login expired; purging");
                self.remove(REMEMBERED_LOGIN_KEY)?;
                Ok(None)
            }
            Err(err) => {
                watch_warn!("Remembered login record is corrupt ({}); purging", err);
                self.remove(REMEMBERED_LOGIN_KEY)?;
                Ok(None)
            }
        }
    }

    /// Everything the client restores at start-up.
    pub fn restore_session(&mut self, now_ms: i64) -> RestoredSession {
        let remembered_login = self.remembered_login(now_ms).unwrap_or_else(|err| {
            watch_warn!("Failed to purge remembered login: {}", err);
            None
        });
        RestoredSession {
            credential: self.get(SESSION_TOKEN_KEY).map(str::to_string),
            bearer_override: self.get(BEARER_OVERRIDE_KEY).map(str::to_string),
            remembered_login,
        }
    }

    pub fn apply(&mut self, change: StoreChange, now_ms: i64) -> Result<(), StoreError> {
        match change {
            StoreChange::SaveCredential(token) => {
                watch_info!("Storing session credential {}", mask_secret(&token));
                self.set(SESSION_TOKEN_KEY, token)
            }
            StoreChange::ClearCredential => self.remove(SESSION_TOKEN_KEY),
            StoreChange::SaveBearerOverride(bearer) => self.set(BEARER_OVERRIDE_KEY, bearer),
            StoreChange::RememberLogin { username, password } => {
                watch_warn!(
                    "Remembering login for {} stores the password in plain text at {:?}",
                    username,
                    self.path
                );
                let record = RememberedLogin::new(username, password, now_ms);
                let raw = serde_json::to_string(&record)
                    .map_err(|err| StoreError::Serialize(err.to_string()))?;
                self.set(REMEMBERED_LOGIN_KEY, raw)
            }
            StoreChange::ForgetLogin => self.remove(REMEMBERED_LOGIN_KEY),
        }
    }

    fn save(&self) -> Result<(), StoreError> {
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&self.entries, pretty)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        write_atomic(&self.path, &content)
    }
}
