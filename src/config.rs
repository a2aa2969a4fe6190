use crate::error::BatchError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Runtime configuration for the batch engine and edit sessions.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on updates + inserts + deletes in one batch.
    pub max_batch_rows: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Emit full statement text in debug logs instead of a truncated preview.
    pub log_statements: bool,
    pub sql_preview_chars: usize,
    /// JSON-lines file receiving one entry per executed statement.
    pub audit_log_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_rows: 10_000,
            default_page_size: 100,
            max_page_size: 1_000,
            log_statements: false,
            sql_preview_chars: 200,
            audit_log_path: None,
        }
    }
}

impl EngineConfig {
    pub fn development() -> Self {
        Self {
            log_statements: true,
            sql_preview_chars: 2_000,
            ..Self::default()
        }
    }

    pub fn with_audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log_path = Some(path.into());
        self
    }

    pub fn with_max_batch_rows(mut self, max_batch_rows: usize) -> Self {
        self.max_batch_rows = max_batch_rows;
        self
    }

    pub fn with_page_size(mut self, default_page_size: u32) -> Self {
        self.default_page_size = default_page_size;
        self
    }

    /// Clamps a requested page size into `1..=max_page_size`.
    pub fn clamp_page_size(&self, requested: u32) -> u32 {
        requested.clamp(1, self.max_page_size.max(1))
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.max_batch_rows == 0 {
            return Err(BatchError::InvalidConfig {
                message: "max_batch_rows must be > 0".into(),
            });
        }
        if self.max_page_size == 0 {
            return Err(BatchError::InvalidConfig {
                message: "max_page_size must be > 0".into(),
            });
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(BatchError::InvalidConfig {
                message: "default_page_size must be > 0 and <= max_page_size".into(),
            });
        }
        if self.sql_preview_chars == 0 {
            return Err(BatchError::InvalidConfig {
                message: "sql_preview_chars must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// PostgreSQL server coordinates. The database itself comes from the batch's
/// table reference.
#[derive(Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Wrapped so the secret is zeroed once the last clone is dropped.
    pub password: Arc<Zeroizing<String>>,
    pub default_database: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "postgres".into(),
            password: Arc::new(Zeroizing::new(String::new())),
            default_database: "postgres".into(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("default_database", &self.default_database)
            .finish()
    }
}

impl ConnectionConfig {
    /// Defaults overridden by `PG_HOST`, `PG_PORT`, `PG_USER`, `PG_PASSWORD`
    /// and `PG_DATABASE` when set.
    pub fn from_env() -> Result<Self, BatchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BatchError> {
        let mut config = Self::default();
        if let Some(host) = lookup("PG_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PG_PORT") {
            config.port = port.trim().parse().map_err(|_| BatchError::InvalidConfig {
                message: format!("PG_PORT is not a valid port: {port}"),
            })?;
        }
        if let Some(user) = lookup("PG_USER") {
            config.user = user;
        }
        if let Some(password) = lookup("PG_PASSWORD") {
            config.password = Arc::new(Zeroizing::new(password));
        }
        if let Some(database) = lookup("PG_DATABASE") {
            config.default_database = database;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Arc::new(Zeroizing::new(password.into()));
        self
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        if self.host.trim().is_empty() {
            return Err(BatchError::InvalidConfig {
                message: "host must not be empty".into(),
            });
        }
        if self.port == 0 {
            return Err(BatchError::InvalidConfig {
                message: "port must be > 0".into(),
            });
        }
        if self.user.trim().is_empty() {
            return Err(BatchError::InvalidConfig {
                message: "user must not be empty".into(),
            });
        }
        Ok(())
    }
}
