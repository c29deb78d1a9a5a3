//! Session credential storage.
//!
//! The access and refresh tokens of the current session live behind the
//! [`CredentialStore`] trait. Each execution context gets its own
//! implementation and passes it explicitly to the components that need it:
//!
//! - [`FileCredentialStore`] - persisted per client installation (CLI, daemons)
//! - [`CookieCredentialStore`] - request-scoped view over the inbound `Cookie`
//!   header; changes are rendered back as `Set-Cookie` headers
//! - [`MemoryCredentialStore`] - process-local, for tests and embedding
//!
//! Stores perform no validation of token contents. Every single-key read or
//! write is atomic; access and refresh tokens are independent keys, so no
//! multi-key transactions exist.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cookie::{Cookie, SameSite};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Default credentials file name within the portico data directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

// ============================================================================
// TokenKind
// ============================================================================

/// Which of the two session credentials is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 2] = [TokenKind::Access, TokenKind::Refresh];

    /// Cookie (and storage key) name.
    pub fn cookie_name(&self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }

    fn from_cookie_name(name: &str) -> Option<Self> {
        TokenKind::ALL.into_iter().find(|k| k.cookie_name() == name)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cookie_name())
    }
}

// ============================================================================
// CredentialStore Trait
// ============================================================================

/// Storage for the session's access and refresh tokens.
///
/// Writes are visible to the next read in the same context. Clearing is
/// idempotent, so concurrent clears from different components are safe.
pub trait CredentialStore: Send + Sync + fmt::Debug {
    /// Store a token, replacing any previous value.
    fn set(&self, kind: TokenKind, value: &str) -> Result<()>;

    /// Read a token.
    fn get(&self, kind: TokenKind) -> Option<String>;

    /// Erase a token. Erasing an absent token is not an error.
    fn clear(&self, kind: TokenKind) -> Result<()>;

    /// Erase both tokens.
    fn clear_all(&self) -> Result<()> {
        for kind in TokenKind::ALL {
            self.clear(kind)?;
        }
        Ok(())
    }

    /// True when no token is stored.
    fn is_empty(&self) -> bool {
        TokenKind::ALL.iter().all(|kind| self.get(*kind).is_none())
    }
}

/// Shared credential store for use across async contexts.
pub type SharedCredentialStore = Arc<dyn CredentialStore>;

/// Create a shared file-backed store in `data_dir`.
pub fn create_file_store(data_dir: &Path) -> SharedCredentialStore {
    Arc::new(FileCredentialStore::new(data_dir))
}

/// Create a shared in-memory store.
pub fn create_memory_store() -> SharedCredentialStore {
    Arc::new(MemoryCredentialStore::new())
}

// ============================================================================
// MemoryCredentialStore
// ============================================================================

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    tokens: RwLock<HashMap<TokenKind, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        let store = Self::new();
        {
            let mut tokens = store.tokens.write();
            if let Some(a) = access {
                tokens.insert(TokenKind::Access, a.to_string());
            }
            if let Some(r) = refresh {
                tokens.insert(TokenKind::Refresh, r.to_string());
            }
        }
        store
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn set(&self, kind: TokenKind, value: &str) -> Result<()> {
        self.tokens.write().insert(kind, value.to_string());
        tracing::debug!(kind = %kind, "Credential stored");
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        self.tokens.read().get(&kind).cloned()
    }

    fn clear(&self, kind: TokenKind) -> Result<()> {
        if self.tokens.write().remove(&kind).is_some() {
            tracing::debug!(kind = %kind, "Credential cleared");
        }
        Ok(())
    }
}

// ============================================================================
// FileCredentialStore
// ============================================================================

/// On-disk representation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl StoredCredentials {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Access => &mut self.access_token,
            TokenKind::Refresh => &mut self.refresh_token,
        }
    }

    fn value(&self, kind: TokenKind) -> Option<&String> {
        match kind {
            TokenKind::Access => self.access_token.as_ref(),
            TokenKind::Refresh => self.refresh_token.as_ref(),
        }
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Credentials persisted to a JSON file, scoped to one installation.
///
/// The file is read once and cached; writes go through the cache and are
/// persisted with a temp-file rename, so readers never observe a partially
/// written file. Removing the last credential removes the file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    /// `None` until the file has been read.
    cache: Mutex<Option<StoredCredentials>>,
}

impl FileCredentialStore {
    /// Store at `data_dir/credentials.json`.
    pub fn new(data_dir: &Path) -> Self {
        Self::with_path(data_dir.join(CREDENTIALS_FILE))
    }

    /// Store at an explicit file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<StoredCredentials> {
        if !self.path.exists() {
            return Ok(StoredCredentials::default());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            AuthError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_file(&self, creds: &StoredCredentials) -> Result<()> {
        if creds.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::Storage(format!("Failed to create credential directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(creds)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply `f` to the cached credentials and persist the result.
    ///
    /// A file that cannot be parsed fails the update, unless
    /// `discard_unreadable` is set (erasures), in which case it is replaced.
    fn update<F>(&self, discard_unreadable: bool, f: F) -> Result<()>
    where
        F: FnOnce(&mut StoredCredentials),
    {
        let mut cache = self.cache.lock();
        let mut creds = match cache.as_ref() {
            Some(c) => c.clone(),
            None => match self.read_file() {
                Ok(creds) => creds,
                Err(e) if discard_unreadable => {
                    tracing::warn!(
                        error = %e,
                        path = %self.path.display(),
                        "Discarding unreadable credentials file"
                    );
                    StoredCredentials::default()
                }
                Err(e) => return Err(e),
            },
        };
        f(&mut creds);
        self.write_file(&creds)?;
        *cache = Some(creds);
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn set(&self, kind: TokenKind, value: &str) -> Result<()> {
        self.update(false, |c| *c.slot(kind) = Some(value.to_string()))?;
        tracing::info!(kind = %kind, path = %self.path.display(), "Credential saved");
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        let mut cache = self.cache.lock();
        if cache.is_none() {
            match self.read_file() {
                Ok(creds) => *cache = Some(creds),
                Err(e) => {
                    tracing::warn!(error = %e, path = %self.path.display(), "Unreadable credentials file");
                    return None;
                }
            }
        }
        cache.as_ref().and_then(|c| c.value(kind).cloned())
    }

    fn clear(&self, kind: TokenKind) -> Result<()> {
        self.update(true, |c| *c.slot(kind) = None)?;
        tracing::debug!(kind = %kind, "Credential cleared");
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        let empty = StoredCredentials::default();
        self.write_file(&empty)?;
        *cache = Some(empty);
        drop(cache);
        tracing::info!(path = %self.path.display(), "All credentials cleared");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

// ============================================================================
// CookieCredentialStore
// ============================================================================

/// Request-scoped credential view over HTTP cookies.
///
/// Seeded from the inbound `Cookie` header(s). Mutations update the view
/// immediately and are remembered so they can be sent back to the client
/// with [`CookieCredentialStore::set_cookie_headers`].
#[derive(Debug, Default)]
pub struct CookieCredentialStore {
    state: Mutex<CookieJarState>,
}

#[derive(Debug, Default)]
struct CookieJarState {
    values: HashMap<TokenKind, String>,
    changed: BTreeSet<TokenKind>,
}

impl CookieCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one or more `Cookie` header values.
    ///
    /// Only the session cookies are retained; when a name repeats the first
    /// occurrence wins. Empty values are treated as absent, and pairs that
    /// do not parse are skipped.
    pub fn from_cookie_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = HashMap::new();
        for header in headers {
            for cookie in Cookie::split_parse_encoded(header).filter_map(|c| c.ok()) {
                let value = cookie.value_trimmed();
                if let Some(kind) = TokenKind::from_cookie_name(cookie.name())
                    && !value.is_empty()
                {
                    values.entry(kind).or_insert_with(|| value.to_string());
                }
            }
        }

        Self {
            state: Mutex::new(CookieJarState {
                values,
                changed: BTreeSet::new(),
            }),
        }
    }

    /// `Set-Cookie` header values for every credential changed on this jar.
    ///
    /// Values are percent-encoded; cleared credentials become removal
    /// cookies.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        let state = self.state.lock();
        state
            .changed
            .iter()
            .map(|kind| {
                session_cookie(*kind, state.values.get(kind).map(String::as_str))
                    .encoded()
                    .to_string()
            })
            .collect()
    }

    /// Whether any credential was changed through this jar.
    pub fn has_changes(&self) -> bool {
        !self.state.lock().changed.is_empty()
    }
}

impl CredentialStore for CookieCredentialStore {
    fn set(&self, kind: TokenKind, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(AuthError::InvalidValue(format!(
                "{} cookie cannot be empty",
                kind
            )));
        }
        let mut state = self.state.lock();
        state.values.insert(kind, value.to_string());
        state.changed.insert(kind);
        Ok(())
    }

    fn get(&self, kind: TokenKind) -> Option<String> {
        self.state.lock().values.get(&kind).cloned()
    }

    fn clear(&self, kind: TokenKind) -> Result<()> {
        let mut state = self.state.lock();
        state.values.remove(&kind);
        state.changed.insert(kind);
        Ok(())
    }
}

/// `Path=/; HttpOnly; SameSite=Lax`, or the matching removal cookie.
fn session_cookie(kind: TokenKind, value: Option<&str>) -> Cookie<'static> {
    let mut cookie = Cookie::build((kind.cookie_name(), value.unwrap_or_default().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    if value.is_none() {
        cookie.make_removal();
    }
    cookie
}
