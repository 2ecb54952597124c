//! Application State
//!
//! Holds the configuration, the session identity, and the services built
//! from them. Shared by the CLI loop and anything else driving the client.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use fidus_core::identity::SessionIdentity;
use fidus_core::preference::AiConfig;
use fidus_core::streaming::MemoryStreamEvent;
use fidus_transport::{build_http_client, ChatClient, MemoryApiClient, PreferenceApi};

use crate::models::settings::{AppConfig, SettingsUpdate};
use crate::services::chat::{ChatService, ChatState};
use crate::services::conflicts::ConflictResolver;
use crate::services::views::MemoryViews;
use crate::storage::ConfigService;
use crate::utils::error::{AppError, AppResult};

/// Services wired against one backend configuration.
#[derive(Clone)]
pub struct Services {
    pub chat: Arc<ChatService>,
    pub resolver: Arc<ConflictResolver>,
    pub views: MemoryViews,
    pub api: Arc<dyn PreferenceApi>,
}

impl Services {
    /// Build the HTTP clients and services from `config`.
    pub fn build(
        config: &AppConfig,
        identity: Arc<dyn SessionIdentity>,
        observer: Option<mpsc::Sender<MemoryStreamEvent>>,
    ) -> AppResult<Self> {
        let transport_config = config.to_transport_config();
        let http = build_http_client(
            transport_config.proxy.as_ref(),
            transport_config.connect_timeout,
        )?;

        let api: Arc<dyn PreferenceApi> = Arc::new(MemoryApiClient::new(
            http.clone(),
            &transport_config,
            identity.clone(),
        )?);
        let transport = Arc::new(ChatClient::new(http, &transport_config, identity)?);

        let views = MemoryViews::new(api.clone());
        let hooks = Arc::new(views.clone());
        let chat_state = Arc::new(RwLock::new(ChatState::new()));

        let mut chat = ChatService::new(transport, chat_state.clone()).with_hooks(hooks.clone());
        if let Some(tx) = observer {
            chat = chat.with_observer(tx);
        }
        let resolver = ConflictResolver::new(chat_state, api.clone()).with_hooks(hooks);

        Ok(Self {
            chat: Arc::new(chat),
            resolver: Arc::new(resolver),
            views,
            api,
        })
    }
}

/// Application state
pub struct AppState {
    config: Arc<RwLock<Option<ConfigService>>>,
    identity: Arc<RwLock<Option<Arc<dyn SessionIdentity>>>>,
    services: Arc<RwLock<Option<Services>>>,
    /// Fetched once per session
    ai_config: Arc<RwLock<Option<AiConfig>>>,
    initialized: Arc<RwLock<bool>>,
}

impl AppState {
    /// Create a new uninitialized app state
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
            identity: Arc::new(RwLock::new(None)),
            services: Arc::new(RwLock::new(None)),
            ai_config: Arc::new(RwLock::new(None)),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Initialize all services
    pub async fn initialize(
        &self,
        config: ConfigService,
        identity: Arc<dyn SessionIdentity>,
        observer: Option<mpsc::Sender<MemoryStreamEvent>>,
    ) -> AppResult<()> {
        let mut initialized = self.initialized.write().await;
        if *initialized {
            return Ok(());
        }

        let services = Services::build(&config.get_config(), identity.clone(), observer)?;
        tracing::info!(
            "[AppState] Using memory API at {} (identity {})",
            config.get_config().backend_url,
            if identity.has() { "restored" } else { "not yet assigned" }
        );

        *self.config.write().await = Some(config);
        *self.identity.write().await = Some(identity);
        *self.services.write().await = Some(services);

        *initialized = true;
        Ok(())
    }

    /// Check if config is healthy
    pub fn is_config_healthy(&self) -> bool {
        if let Ok(guard) = self.config.try_read() {
            if let Some(ref config) = *guard {
                return config.is_healthy();
            }
        }
        false
    }

    /// Get the current configuration
    pub async fn get_config(&self) -> AppResult<AppConfig> {
        let guard = self.config.read().await;
        match &*guard {
            Some(config) => Ok(config.get_config()),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Update and persist the configuration. Takes effect on next start.
    pub async fn update_config(&self, update: SettingsUpdate) -> AppResult<AppConfig> {
        let mut guard = self.config.write().await;
        match &mut *guard {
            Some(config) => config.update_config(update),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Restore and persist default settings. Takes effect on next start.
    pub async fn reset_config(&self) -> AppResult<AppConfig> {
        let mut guard = self.config.write().await;
        match &mut *guard {
            Some(config) => config.reset(),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    /// Location of the settings file
    pub async fn config_path(&self) -> AppResult<std::path::PathBuf> {
        let guard = self.config.read().await;
        match &*guard {
            Some(config) => Ok(config.config_path().to_path_buf()),
            None => Err(AppError::config("Config service not initialized")),
        }
    }

    pub async fn services(&self) -> AppResult<Services> {
        let guard = self.services.read().await;
        match &*guard {
            Some(services) => Ok(services.clone()),
            None => Err(AppError::internal("Services not initialized")),
        }
    }

    /// Identity assigned by the backend, if any
    pub async fn current_identity(&self) -> AppResult<Option<String>> {
        let guard = self.identity.read().await;
        match &*guard {
            Some(identity) => Ok(identity.get()),
            None => Err(AppError::internal("Identity store not initialized")),
        }
    }

    /// Forget the stored identity; the backend assigns a new one next time.
    pub async fn forget_identity(&self) -> AppResult<()> {
        let guard = self.identity.read().await;
        match &*guard {
            Some(identity) => {
                identity.clear();
                Ok(())
            }
            None => Err(AppError::internal("Identity store not initialized")),
        }
    }

    /// Model configuration, fetched on first use
    pub async fn ai_config(&self) -> AppResult<AiConfig> {
        if let Some(config) = self.ai_config.read().await.clone() {
            return Ok(config);
        }
        let api = self.services().await?.api;
        let fetched = api.ai_config().await?;
        *self.ai_config.write().await = Some(fetched.clone());
        Ok(fetched)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("initialized", &self.initialized)
            .finish()
    }
}
