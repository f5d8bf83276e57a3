//! Application Startup
//!
//! Composes the persistence backend, Redis, the realtime core and the
//! services into [`AppState`], and serves the router.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use redis::aio::ConnectionManager;
use tokio::net::TcpListener;
use tracing::info;

use crate::application::realtime::{
    run_relay, Dispatcher, FanoutEngine, LocalDispatcher, PresenceRegistry, RealtimeHub,
    RedisDispatcher,
};
use crate::application::services::{
    AuthService, ChatService, ContactService, MessageService, ReportService, UserService,
};
use crate::config::{DatabaseBackend, Settings};
use crate::domain::MembershipResolver;
use crate::infrastructure::identity::{GoogleIdentityProvider, IdentityProvider};
use crate::infrastructure::notify::{build_notifier, ReportNotifier};
use crate::infrastructure::repositories::{MemoryStore, Repositories};
use crate::infrastructure::storage::{FileStorage, LocalFileStorage};
use crate::infrastructure::{cache, database};
use crate::presentation::http::routes;
use crate::presentation::http::handlers::health;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub repos: Repositories,
    pub redis: Option<ConnectionManager>,
    pub hub: RealtimeHub,
    pub fanout: Arc<FanoutEngine>,
    pub resolver: MembershipResolver,
    pub storage: Arc<dyn FileStorage>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub contacts: Arc<ContactService>,
    pub chats: Arc<ChatService>,
    pub messages: Arc<MessageService>,
    pub reports: Arc<ReportService>,
    local_dispatcher: LocalDispatcher,
}

/// External collaborators the state is composed from.
pub struct Collaborators {
    pub repos: Repositories,
    pub redis: Option<ConnectionManager>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifier: Arc<dyn ReportNotifier>,
    pub storage: Arc<dyn FileStorage>,
}

impl AppState {
    /// Wire services and the realtime core. Performs no I/O.
    ///
    /// Events go through the Redis relay when `websocket.distributed` is set
    /// and a Redis connection is available, otherwise straight to local
    /// sessions.
    pub fn assemble(settings: Settings, collaborators: Collaborators) -> Self {
        let Collaborators {
            repos,
            redis,
            identity,
            notifier,
            storage,
        } = collaborators;

        let presence = Arc::new(PresenceRegistry::new());
        let local_dispatcher = LocalDispatcher::new(
            presence.clone(),
            Duration::from_millis(settings.websocket.push_timeout_ms),
        );
        let dispatcher: Arc<dyn Dispatcher> = match (&redis, settings.websocket.distributed) {
            (Some(conn), true) => Arc::new(RedisDispatcher::new(
                conn.clone(),
                settings.redis.fanout_channel.clone(),
            )),
            _ => Arc::new(local_dispatcher.clone()),
        };
        let hub = RealtimeHub::new(presence, dispatcher.clone());

        let resolver = MembershipResolver::new(repos.chats.clone(), repos.memberships.clone());
        let fanout = Arc::new(FanoutEngine::new(
            resolver.clone(),
            repos.messages.clone(),
            dispatcher,
            &settings.fanout,
        ));
        let snowflake = Arc::new(SnowflakeGenerator::from_settings(&settings.snowflake));

        Self {
            auth: Arc::new(AuthService::new(
                repos.users.clone(),
                identity,
                snowflake,
                settings.jwt.clone(),
            )),
            users: Arc::new(UserService::new(repos.users.clone())),
            contacts: Arc::new(ContactService::new(
                repos.users.clone(),
                repos.contacts.clone(),
                hub.clone(),
            )),
            chats: Arc::new(ChatService::new(
                repos.users.clone(),
                repos.chats.clone(),
                repos.memberships.clone(),
                resolver.clone(),
                hub.clone(),
            )),
            messages: Arc::new(MessageService::new(
                repos.messages.clone(),
                resolver.clone(),
                settings.fanout.history_page_size,
            )),
            reports: Arc::new(ReportService::new(
                repos.users.clone(),
                repos.reports.clone(),
                notifier,
            )),
            settings: Arc::new(settings),
            repos,
            redis,
            hub,
            fanout,
            resolver,
            storage,
            local_dispatcher,
        }
    }

    /// Router with every middleware layer applied.
    pub fn router(&self) -> Router {
        routes::create_router(self.clone())
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let repos = match settings.database.backend {
            DatabaseBackend::Postgres => {
                let pool = database::create_pool(&settings.database)
                    .await
                    .context("failed to create database pool")?;
                if settings.database.run_migrations {
                    database::run_migrations(&pool)
                        .await
                        .context("failed to run migrations")?;
                }
                Repositories::postgres(pool)
            }
            DatabaseBackend::Memory => {
                info!("Using the in-memory store; data is lost on restart");
                Repositories::memory(Arc::new(MemoryStore::new()))
            }
        };

        let redis = if settings.redis.enabled {
            Some(
                cache::create_redis_client(&settings.redis)
                    .await
                    .context("failed to connect to Redis")?,
            )
        } else {
            None
        };

        let identity = Arc::new(
            GoogleIdentityProvider::new(&settings.auth)
                .context("failed to build identity provider")?,
        );
        let notifier = build_notifier(&settings.report).context("failed to build report notifier")?;
        let storage = Arc::new(LocalFileStorage::new(&settings.storage));

        let relay_client = if settings.websocket.distributed {
            Some(cache::open_client(&settings.redis).context("failed to open Redis pub/sub client")?)
        } else {
            None
        };

        let state = AppState::assemble(
            settings,
            Collaborators {
                repos,
                redis,
                identity,
                notifier,
                storage,
            },
        );

        if let Some(client) = relay_client {
            let channel = state.settings.redis.fanout_channel.clone();
            info!(channel = %channel, "Starting fan-out relay");
            tokio::spawn(run_relay(client, channel, state.local_dispatcher.clone()));
        }

        let router = state.router();

        let addr = state.settings.server_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
