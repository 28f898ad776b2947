// src/session.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionData {
    token: String,
    username: String,
}

struct SessionInner {
    data: Option<SessionData>,
    /// Parent token for everything owned by the current login. Cancelled
    /// by clear(), replaced by the next store().
    scope: CancellationToken,
}

/// Holds the auth token for the current login and persists it across runs.
///
/// clear() cancels the session scope, which tears down any stream
/// connection derived from it. A later store() installs a fresh scope so
/// re-login works within the same process.
#[derive(Clone)]
pub struct SessionStore {
    path: PathBuf,
    inner: Arc<RwLock<SessionInner>>,
}

impl SessionStore {
    /// Loads any persisted session from `path`. An unreadable or corrupt
    /// file just means starting logged out.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<SessionData>(&raw) {
                Ok(data) => {
                    info!(username = %data.username, "Restored session from {}", path.display());
                    Some(data)
                }
                Err(e) => {
                    warn!("Ignoring corrupt session file {}: {}", path.display(), e);
                    None
                }
            },
            Err(_) => None,
        };

        Self {
            path,
            inner: Arc::new(RwLock::new(SessionInner {
                data,
                scope: CancellationToken::new(),
            })),
        }
    }

    /// Stores a fresh login and persists it. Failure to write the file is
    /// logged but the in-memory session still takes effect.
    pub async fn store(&self, token: &str, username: &str) {
        let data = SessionData {
            token: token.to_string(),
            username: username.to_string(),
        };

        let mut inner = self.inner.write().await;
        if inner.scope.is_cancelled() {
            inner.scope = CancellationToken::new();
        }
        inner.data = Some(data.clone());
        drop(inner);

        match serde_json::to_string_pretty(&data) {
            Ok(raw) => {
                if let Err(e) = tokio::fs::write(&self.path, raw).await {
                    error!("Failed to persist session to {}: {}", self.path.display(), e);
                }
            }
            Err(e) => error!("Failed to serialize session: {}", e),
        }
    }

    pub async fn token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .data
            .as_ref()
            .map(|d| d.token.clone())
    }

    pub async fn username(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .data
            .as_ref()
            .map(|d| d.username.clone())
    }

    /// Child token tied to the current login. Cancelled when clear() runs.
    pub async fn connection_scope(&self) -> CancellationToken {
        self.inner.read().await.scope.child_token()
    }

    /// Logs out: forgets the token, cancels the session scope and removes
    /// the persisted file. Safe to call twice.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.data = None;
        inner.scope.cancel();
        drop(inner);

        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove session file {}: {}", self.path.display(), e);
            }
        }
        info!("Session cleared");
    }
}
