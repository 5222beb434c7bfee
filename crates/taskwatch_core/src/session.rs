use serde::{Deserialize, Serialize};

use crate::ObservedTask;

/// How long a remembered login stays usable.
pub const REMEMBER_DURATION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Login form contents kept across restarts when the user asks for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedLogin {
    pub username: String,
    pub password: String,
    #[serde(rename = "expiresAt")]
    pub expires_at_ms: i64,
}

impl RememberedLogin {
    pub fn new(username: String, password: String, now_ms: i64) -> Self {
        Self {
            username,
            password,
            expires_at_ms: now_ms.saturating_add(REMEMBER_DURATION_MS),
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// Durable values loaded at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RestoredSession {
    pub credential: Option<String>,
    pub bearer_override: Option<String>,
    /// Already filtered for expiry by the store.
    pub remembered_login: Option<RememberedLogin>,
}

/// Writes to the durable client store requested by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    SaveCredential(String),
    ClearCredential,
    SaveBearerOverride(String),
    RememberLogin { username: String, password: String },
    ForgetLogin,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    credential: Option<String>,
    bearer_override: Option<String>,
    observed: Option<ObservedTask>,
}

impl Session {
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn bearer_override(&self) -> Option<&str> {
        self.bearer_override.as_deref()
    }

    pub fn observed(&self) -> Option<&ObservedTask> {
        self.observed.as_ref()
    }

    pub(crate) fn restore(&mut self, restored: &RestoredSession) {
        self.credential = restored.credential.clone().filter(|token| !token.is_empty());
        self.bearer_override = restored.bearer_override.clone();
    }

    pub(crate) fn sign_in(&mut self, credential: String) {
        self.credential = Some(credential);
    }

    pub(crate) fn sign_out(&mut self) {
        self.credential = None;
        self.observed = None;
    }

    pub(crate) fn set_bearer_override(&mut self, bearer: String) {
        self.bearer_override = Some(bearer);
    }

    pub(crate) fn observe(&mut self, observed: ObservedTask) {
        self.observed = Some(observed);
    }
}
