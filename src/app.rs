use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::compactor;
use crate::config::Config;
use crate::error::BookingError;
use crate::model::{Role, User};
use crate::notify::NotifyHub;
use crate::scheduler::Scheduler;
use crate::session::BookingSession;
use crate::store::{AccountService, GroomingStore};

/// A replayed store plus its background compactor, set up from [`Config`].
///
/// Every [`Scheduler`] handed out here carries the configured overrun policy.
pub struct App {
    config: Config,
    store: Arc<GroomingStore>,
    compactor: JoinHandle<()>,
}

impl App {
    /// Open the store under `config.data_dir`, give the configured accounts
    /// the admin role and start compacting. Must run inside a tokio runtime.
    pub async fn start(config: Config) -> Result<Self, BookingError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(GroomingStore::open(
            config.wal_path(),
            Arc::new(NotifyHub::new()),
        )?);
        for id in &config.admin_ids {
            provision_admin(&store, id).await?;
        }

        let compactor = tokio::spawn(compactor::run_compactor(
            store.clone(),
            config.compact_threshold,
            config.compact_interval,
        ));
        Ok(Self {
            config,
            store,
            compactor,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<GroomingStore> {
        &self.store
    }

    /// Scheduler for one client, acting as whoever `accounts` reports.
    pub fn scheduler(&self, accounts: Arc<dyn AccountService>) -> Scheduler<GroomingStore> {
        Scheduler::new(self.store.clone(), accounts).with_overrun_policy(self.config.overrun_policy)
    }

    pub fn session(&self, accounts: Arc<dyn AccountService>) -> BookingSession<GroomingStore> {
        BookingSession::new(self.scheduler(accounts))
    }

    /// Stop the compactor and leave a compacted log behind.
    pub async fn shutdown(self) -> Result<(), BookingError> {
        self.compactor.abort();
        self.store.compact_wal().await
    }
}

async fn provision_admin(store: &GroomingStore, id: &str) -> Result<(), BookingError> {
    let user = match store.get_user(id).await {
        Ok(user) if user.is_admin() => return Ok(()),
        Ok(user) => User {
            role: Role::Admin,
            ..user
        },
        Err(BookingError::UserNotFound(_)) => User {
            id: id.to_string(),
            name: id.to_string(),
            email: String::new(),
            role: Role::Admin,
        },
        Err(e) => return Err(e),
    };
    store.put_user(user).await?;
    info!("granted admin role to {id}");
    Ok(())
}
