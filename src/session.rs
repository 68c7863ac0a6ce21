use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::api::JobTrackerApi;
use crate::models::{Credentials, Registration};

const TOKEN_KEY: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Storage has not been read yet.
    Unknown,
    Authenticated,
    Anonymous,
}

pub trait TokenStore: Send {
    fn load_token(&self) -> Result<Option<String>>;
    fn save_token(&self, token: &str) -> Result<()>;
    fn clear_token(&self) -> Result<()>;
}

/// Small key/value table in SQLite, the terminal stand-in for browser
/// local storage.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open local store at {}", path.display()))?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read local storage")
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }
}

impl TokenStore for LocalStore {
    fn load_token(&self) -> Result<Option<String>> {
        Ok(self.get(TOKEN_KEY)?.filter(|t| !t.is_empty()))
    }

    fn save_token(&self, token: &str) -> Result<()> {
        self.set(TOKEN_KEY, token)
    }

    fn clear_token(&self) -> Result<()> {
        self.remove(TOKEN_KEY)
    }
}

struct Inner {
    store: Box<dyn TokenStore>,
    token: Option<String>,
}

/// Process-wide session. Lifecycle is initialize -> set on login ->
/// clear on logout or 401; views observe it through `subscribe`.
pub struct SessionService {
    inner: Mutex<Inner>,
    state: watch::Sender<SessionState>,
}

impl SessionService {
    pub fn new(store: impl TokenStore + 'static) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            inner: Mutex::new(Inner {
                store: Box::new(store),
                token: None,
            }),
            state,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("session lock poisoned"))
    }

    pub fn initialize(&self) -> Result<SessionState> {
        let mut inner = self.lock()?;
        inner.token = inner.store.load_token()?;
        let next = if inner.token.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        self.state.send_replace(next);
        tracing::debug!(state = ?next, "session initialized from storage");
        Ok(next)
    }

    pub fn set_token(&self, token: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.store.save_token(token)?;
        inner.token = Some(token.to_string());
        self.state.send_replace(SessionState::Authenticated);
        tracing::info!("session authenticated");
        Ok(())
    }

    /// Removes the stored token, then drops the in-memory one. The session
    /// ends even when storage fails; the storage error is still returned.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let removed = inner
            .store
            .clear_token()
            .context("Failed to remove the saved session token");
        inner.token = None;
        self.state.send_replace(SessionState::Anonymous);
        match &removed {
            Ok(()) => tracing::info!("session cleared"),
            Err(e) => tracing::error!(error = %e, "session ended but storage was not cleared"),
        }
        removed
    }

    pub fn token(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|inner| inner.token.clone())
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

pub fn login(
    api: &dyn JobTrackerApi,
    session: &SessionService,
    email: &str,
    password: &str,
) -> Result<()> {
    let credentials = Credentials {
        email: email.to_string(),
        password: password.to_string(),
    };
    let response = api.authenticate(&credentials)?;
    let token = response
        .token
        .ok_or_else(|| anyhow!("Login failed: no token in response"))?;
    session.set_token(&token)
}

pub fn register(api: &dyn JobTrackerApi, session: &SessionService, registration: &Registration) -> Result<()> {
    let response = api.register(registration)?;
    let token = response
        .token
        .ok_or_else(|| anyhow!("Registration failed: no token in response"))?;
    session.set_token(&token)
}

pub fn logout(session: &SessionService) -> Result<()> {
    session.clear()
}
