//! TCP listener for the content gateway.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::auth::{NonceStore, RateLimiter, RequestAuthorizer};
use crate::config::Settings;
use crate::content::{ContentGateway, ContentStore, FsContentStore};
use crate::error::GateError;

use super::connection::{handle_connection, GatewayState};

/// Interval of the rate limiter sweep.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Connection metrics for monitoring.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    /// Total content requests processed.
    pub requests_total: AtomicU64,
    /// Total failed content requests.
    pub requests_failed: AtomicU64,
    /// Content requests refused by the authorizer.
    pub requests_denied: AtomicU64,
    /// Currently active connections.
    pub active_connections: AtomicUsize,
}

impl ConnectionMetrics {
    /// Create new connection metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment request count.
    pub fn record_request(&self, success: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Increment denial count.
    pub fn record_denial(&self) {
        self.requests_denied.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total request count.
    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    /// Get failed request count.
    pub fn failed_requests(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }

    /// Get denied request count.
    pub fn denied_requests(&self) -> u64 {
        self.requests_denied.load(Ordering::Relaxed)
    }

    /// Get active connection count.
    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// HTTP server for gated content.
pub struct GatewayServer {
    listener: TcpListener,
    state: Arc<GatewayState>,
    nonce_store: Arc<NonceStore>,
    /// Semaphore for connection limiting
    connection_semaphore: Arc<Semaphore>,
}

impl GatewayServer {
    /// Bind the listener and serve content from `settings.content.root`.
    pub async fn bind(settings: Arc<Settings>) -> Result<Self, GateError> {
        let root = &settings.content.root;
        if !root.is_dir() {
            warn!(
                root = %root.display(),
                "Content root is not a directory, every listing will be empty"
            );
        }
        let store: Arc<dyn ContentStore> = Arc::new(FsContentStore::new(root));
        Self::bind_with_store(settings, store).await
    }

    /// Bind the listener and serve content from `store`.
    pub async fn bind_with_store(
        settings: Arc<Settings>,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self, GateError> {
        let bind_address = settings.server.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|e| GateError::Server {
                message: format!("Failed to bind to {}: {}", bind_address, e),
            })?;

        // Nonce store for replay prevention
        let security = &settings.security;
        let nonce_store = Arc::new(NonceStore::new(
            Duration::from_secs(security.nonce_ttl_seconds),
            security.nonce_cache_capacity,
        ));
        nonce_store.start_cleanup_task(Duration::from_secs(security.nonce_cleanup_interval_seconds));

        let authorizer = RequestAuthorizer::from_settings(&settings, Arc::clone(&nonce_store));
        info!(
            chain_id = %authorizer.chain_id(),
            max_nonce_age = security.max_nonce_age_seconds,
            accept_opaque_nonces = security.accept_opaque_nonces,
            "Request authorizer ready"
        );

        let gateway = ContentGateway::new(
            store,
            settings.content.chunk_size,
            Duration::from_secs(settings.limits.stream_idle_timeout_seconds),
        );

        // Create connection semaphore for limiting concurrent connections
        let connection_semaphore =
            Arc::new(Semaphore::new(settings.limits.max_concurrent_connections));
        info!(
            max_connections = settings.limits.max_concurrent_connections,
            "Connection limiting enabled"
        );

        // Create per-client rate limiter
        let rate_limiter = Arc::new(RateLimiter::new(
            security.rate_limit_requests,
            security.rate_limit_window_seconds,
            security.rate_limit_max_clients,
        ));
        rate_limiter.start_cleanup_task(RATE_LIMIT_CLEANUP_INTERVAL);
        info!(
            max_requests = security.rate_limit_requests,
            window_seconds = security.rate_limit_window_seconds,
            max_clients = security.rate_limit_max_clients,
            "Per-client rate limiting enabled"
        );

        // Create the audit logger if enabled
        let audit_logger = if settings.audit.enabled {
            match AuditLogger::new(&settings.audit.log_path) {
                Ok(logger) => {
                    info!(
                        path = %settings.audit.log_path.display(),
                        "Audit logging enabled"
                    );
                    Some(Arc::new(logger))
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %settings.audit.log_path.display(),
                        "Failed to create audit logger, audit logging disabled"
                    );
                    None
                }
            }
        } else {
            info!("Audit logging disabled");
            None
        };

        info!(address = %bind_address, "HTTP listener bound");

        let state = Arc::new(GatewayState {
            settings,
            authorizer,
            gateway,
            rate_limiter,
            audit_logger,
            metrics: Arc::new(ConnectionMetrics::new()),
        });

        Ok(Self {
            listener,
            state,
            nonce_store,
            connection_semaphore,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, GateError> {
        Ok(self.listener.local_addr()?)
    }

    /// Get connection metrics.
    pub fn metrics(&self) -> Arc<ConnectionMetrics> {
        Arc::clone(&self.state.metrics)
    }

    /// Get the nonce store.
    pub fn nonce_store(&self) -> Arc<NonceStore> {
        Arc::clone(&self.nonce_store)
    }

    /// Run the listener, accepting connections.
    ///
    /// The listener stops accepting new connections when `shutdown` is
    /// notified. Open connections finish their current request and close.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<(), GateError> {
        info!("Gateway running, waiting for connections...");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            // Try to acquire a connection permit
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        peer = %peer,
                                        max = self.state.settings.limits.max_concurrent_connections,
                                        "Connection limit reached, rejecting connection"
                                    );
                                    continue;
                                }
                            };

                            let state = Arc::clone(&self.state);
                            let shutdown = Arc::clone(&shutdown);
                            let metrics = Arc::clone(&self.state.metrics);

                            metrics.active_connections.fetch_add(1, Ordering::Relaxed);
                            debug!(peer = %peer, active = metrics.active(), "New connection accepted");

                            tokio::spawn(async move {
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, peer, state, shutdown).await {
                                    debug!(peer = %peer, error = %e, "Connection ended with error");
                                }

                                metrics.active_connections.fetch_sub(1, Ordering::Relaxed);
                                debug!(peer = %peer, active = metrics.active(), "Connection closed");
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                _ = shutdown.notified() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Wait for all active connections to drain.
    ///
    /// Returns immediately if there are no active connections.
    pub async fn wait_for_drain(&self) {
        let poll_interval = Duration::from_millis(100);

        while self.state.metrics.active() > 0 {
            debug!(
                active = self.state.metrics.active(),
                "Waiting for connections to drain"
            );
            tokio::time::sleep(poll_interval).await;
        }

        info!("All connections drained");
    }
}
