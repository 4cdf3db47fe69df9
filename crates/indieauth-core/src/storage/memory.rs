//! In-memory storage backend.
//!
//! Implements every storage trait on top of `DashMap`. Intended for tests
//! and local development; nothing survives a restart.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

use super::{
    AccessTokenStorage, AuthorizationCodeStorage, IssuedTokenStorage, RefreshTokenStorage,
    StorageError, StorageResult, UserProfileStorage,
};
use crate::types::{
    AccessTokenRecord, AuthorizationCode, IssuedTokens, RefreshTokenRecord, UserProfile, unix_now,
};

/// In-memory credential storage.
///
/// Individual operations can be made to fail with [`InMemoryStorage::failing`]
/// to exercise error paths.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    codes: DashMap<String, AuthorizationCode>,
    access_tokens: DashMap<String, AccessTokenRecord>,
    refresh_tokens: DashMap<String, RefreshTokenRecord>,
    profiles: DashMap<String, UserProfile>,
    issued: RwLock<Vec<IssuedTokens>>,
    revoke_calls: AtomicU64,
    failing: HashSet<&'static str>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the named operation (e.g. `"revoke_refresh_token"`) fail.
    #[must_use]
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Inserts an authorization code.
    pub fn insert_code(&self, code: AuthorizationCode) {
        self.codes.insert(code.code.clone(), code);
    }

    /// Inserts an access token companion record.
    pub fn insert_access_token(&self, record: AccessTokenRecord) {
        self.access_tokens.insert(record.jti.clone(), record);
    }

    /// Inserts a refresh token record.
    pub fn insert_refresh_token(&self, record: RefreshTokenRecord) {
        self.refresh_tokens
            .insert(record.refresh_token.clone(), record);
    }

    /// Sets the profile released for `me`.
    pub fn insert_profile(&self, me: impl Into<String>, profile: UserProfile) {
        self.profiles.insert(me.into(), profile);
    }

    /// Returns a copy of a stored code.
    #[must_use]
    pub fn code(&self, code: &str) -> Option<AuthorizationCode> {
        self.codes.get(code).map(|c| c.clone())
    }

    /// Returns a copy of a stored access token record.
    #[must_use]
    pub fn access_token(&self, jti: &str) -> Option<AccessTokenRecord> {
        self.access_tokens.get(jti).map(|r| r.clone())
    }

    /// Returns a copy of a stored refresh token record.
    #[must_use]
    pub fn refresh_token(&self, token: &str) -> Option<RefreshTokenRecord> {
        self.refresh_tokens.get(token).map(|r| r.clone())
    }

    /// All pairs passed to `on_issued_tokens`, oldest first.
    pub async fn issued(&self) -> Vec<IssuedTokens> {
        self.issued.read().await.clone()
    }

    /// Number of successful revoke calls across both token families.
    #[must_use]
    pub fn revoke_calls(&self) -> u64 {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &'static str) -> StorageResult<()> {
        if self.failing.contains(operation) {
            return Err(StorageError::new(format!("{operation} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorizationCodeStorage for InMemoryStorage {
    async fn store(&self, code: &AuthorizationCode) -> StorageResult<()> {
        self.check("store_authorization_code")?;
        self.insert_code(code.clone());
        Ok(())
    }

    async fn retrieve(&self, code: &str) -> StorageResult<Option<AuthorizationCode>> {
        self.check("retrieve_authorization_code")?;
        Ok(self.code(code))
    }

    async fn mark_used(&self, code: &str) -> StorageResult<bool> {
        self.check("mark_authorization_code_used")?;
        match self.codes.get_mut(code) {
            Some(mut record) if !record.used => {
                record.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AccessTokenStorage for InMemoryStorage {
    async fn retrieve(&self, jti: &str) -> StorageResult<Option<AccessTokenRecord>> {
        self.check("retrieve_access_token")?;
        Ok(self.access_token(jti))
    }

    async fn is_revoked(&self, jti: &str) -> StorageResult<bool> {
        self.check("is_access_token_revoked")?;
        Ok(self
            .access_tokens
            .get(jti)
            .is_some_and(|record| record.revoked))
    }

    async fn revoke(&self, jti: &str, reason: Option<&str>) -> StorageResult<()> {
        self.check("revoke_access_token")?;
        let mut record = self
            .access_tokens
            .entry(jti.to_string())
            .or_insert_with(|| AccessTokenRecord {
                jti: jti.to_string(),
                client_id: String::new(),
                redirect_uri: String::new(),
                created_at: unix_now(),
                revoked: false,
                revocation_reason: None,
            });
        record.revoked = true;
        record.revocation_reason = reason.map(str::to_string);
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStorage for InMemoryStorage {
    async fn retrieve(&self, refresh_token: &str) -> StorageResult<Option<RefreshTokenRecord>> {
        self.check("retrieve_refresh_token")?;
        Ok(self.refresh_token(refresh_token))
    }

    async fn is_revoked(&self, refresh_token: &str) -> StorageResult<bool> {
        self.check("is_refresh_token_revoked")?;
        Ok(self
            .refresh_tokens
            .get(refresh_token)
            .is_some_and(|record| record.revoked))
    }

    async fn revoke(&self, refresh_token: &str, reason: Option<&str>) -> StorageResult<()> {
        self.check("revoke_refresh_token")?;
        let mut record = self
            .refresh_tokens
            .get_mut(refresh_token)
            .ok_or_else(|| StorageError::new("refresh token not found"))?;
        record.revoked = true;
        record.revocation_reason = reason.map(str::to_string);
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl IssuedTokenStorage for InMemoryStorage {
    async fn on_issued_tokens(&self, issued: &IssuedTokens) -> StorageResult<()> {
        self.check("on_issued_tokens")?;
        let now = unix_now();
        self.insert_access_token(issued.access_token_record(now));
        self.insert_refresh_token(issued.refresh_token_record(now));
        self.issued.write().await.push(issued.clone());
        Ok(())
    }
}

#[async_trait]
impl UserProfileStorage for InMemoryStorage {
    async fn retrieve_user_profile(&self, me: &str) -> StorageResult<Option<UserProfile>> {
        self.check("retrieve_user_profile")?;
        Ok(self.profiles.get(me).map(|p| p.clone()))
    }
}
