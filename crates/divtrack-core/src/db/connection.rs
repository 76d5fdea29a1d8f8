//! Database connection management

use crate::error::{Error, Result};
use crate::util::{is_remote_database_url, normalize_text_option};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a database lives
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// Private in-memory database (tests, throwaway runs)
    Memory,
    /// Local `SQLite` file
    Local(PathBuf),
    /// Remote libSQL server (e.g., `libsql://your-db.turso.io`)
    Remote { url: String, auth_token: String },
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => formatter.write_str("Memory"),
            Self::Local(path) => formatter.debug_tuple("Local").field(path).finish(),
            Self::Remote { url, .. } => formatter
                .debug_struct("Remote")
                .field("url", url)
                .field("auth_token", &"[REDACTED]")
                .finish(),
        }
    }
}

impl DatabaseTarget {
    /// Interpret a connection string.
    ///
    /// `:memory:` selects an in-memory database, `libsql://` and `http(s)://`
    /// URLs a remote one (an auth token is then required), anything else a
    /// local file path.
    pub fn parse(url: &str, auth_token: Option<&str>) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("Database URL must not be empty".into()));
        }
        if url == ":memory:" {
            return Ok(Self::Memory);
        }
        if is_remote_database_url(url) {
            let auth_token = normalize_text_option(auth_token.map(str::to_string))
                .ok_or_else(|| {
                    Error::InvalidInput("Auth token is required for remote databases".into())
                })?;
            return Ok(Self::Remote {
                url: url.to_string(),
                auth_token,
            });
        }
        let path = url.strip_prefix("file:").unwrap_or(url);
        Ok(Self::Local(PathBuf::from(path)))
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    // Owns the handle the connection was created from.
    _db: LibSqlDatabase,
    conn: Connection,
    remote: bool,
}

impl Database {
    /// Open the database described by `target`
    pub async fn open_target(target: &DatabaseTarget) -> Result<Self> {
        match target {
            DatabaseTarget::Memory => Self::open_in_memory().await,
            DatabaseTarget::Local(path) => Self::open(path).await,
            DatabaseTarget::Remote { url, auth_token } => {
                Self::open_remote(url.clone(), auth_token.clone()).await
            }
        }
    }

    /// Open a local database at the given path, creating it if it doesn't exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path_str = path.to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::connect(db, false).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::connect(db, false).await
    }

    /// Open a connection to a remote libSQL server
    pub async fn open_remote(url: String, auth_token: String) -> Result<Self> {
        tracing::info!("Connecting to remote database at {}", url);
        let db = Builder::new_remote(url, auth_token).build().await?;
        Self::connect(db, true).await
    }

    async fn connect(db: LibSqlDatabase, remote: bool) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self {
            _db: db,
            conn,
            remote,
        };
        database.configure().await?;
        Ok(database)
    }

    /// Configure `SQLite` pragmas for local databases
    async fn configure(&self) -> Result<()> {
        if self.remote {
            return Ok(());
        }
        // In-memory databases reject WAL; that is fine.
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    pub const fn is_remote(&self) -> bool {
        self.remote
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
