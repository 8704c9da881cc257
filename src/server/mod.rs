//! HTTP surface: the public verify endpoint, the storefront and the admin API.

pub mod admin;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::StoreConfig;
use crate::core::{BackOffice, LicenseVerifier, Storefront};
use crate::domain::ports::{ConfigProvider, Store};
use crate::utils::error::Result;

pub struct AppState<S: Store> {
    pub verifier: LicenseVerifier<S>,
    pub storefront: Storefront<S>,
    pub back_office: BackOffice<S>,
    pub config: Arc<dyn ConfigProvider>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: Arc<S>, config: Arc<dyn ConfigProvider>) -> Arc<Self> {
        Arc::new(Self {
            verifier: LicenseVerifier::new(store.clone()),
            storefront: Storefront::new(store.clone(), config.default_commission_rate()),
            back_office: BackOffice::new(store),
            config,
        })
    }
}

pub fn router<S: Store + 'static>(state: Arc<AppState<S>>, cors: bool) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/verify-license", post(handlers::verify_license::<S>))
        .route("/api/products", get(handlers::list_products::<S>))
        .route("/api/brokers", get(handlers::list_brokers::<S>))
        .route("/api/payment-settings", get(handlers::payment_settings::<S>));

    let account = Router::new()
        .route("/api/profiles", post(handlers::register::<S>))
        .route("/api/orders", post(handlers::place_order::<S>))
        .route("/api/ib-requests", post(handlers::request_ib::<S>))
        .route("/api/me/orders", get(handlers::my_orders::<S>))
        .route("/api/me/licenses", get(handlers::my_licenses::<S>))
        .route("/api/me/referrals", get(handlers::my_referrals::<S>));

    let back_office = Router::new()
        .route("/stats", get(admin::stats::<S>))
        .route("/orders", get(admin::list_orders::<S>))
        .route("/orders/:id/approve", post(admin::approve_order::<S>))
        .route("/orders/:id/reject", post(admin::reject_order::<S>))
        .route(
            "/licenses",
            get(admin::list_licenses::<S>).post(admin::create_license::<S>),
        )
        .route("/licenses/sweep", post(admin::sweep_licenses::<S>))
        .route("/licenses/:id/expiry", put(admin::set_license_expiry::<S>))
        .route("/licenses/:id/extend", post(admin::extend_license::<S>))
        .route("/licenses/:id/revoke", post(admin::revoke_license::<S>))
        .route("/ib-requests", get(admin::list_ib_requests::<S>))
        .route("/ib-requests/:id/approve", post(admin::approve_ib_request::<S>))
        .route("/ib-requests/:id/reject", post(admin::reject_ib_request::<S>))
        .route("/affiliates/:id/rate", put(admin::set_commission_rate::<S>))
        .route("/commissions", get(admin::list_commissions::<S>))
        .route("/commissions/:id/pay", post(admin::pay_commission::<S>))
        .route("/products", post(admin::create_product::<S>))
        .route("/products/:id", put(admin::update_product::<S>))
        .route("/brokers", post(admin::create_broker::<S>))
        .route("/brokers/:id/active", put(admin::set_broker_active::<S>))
        .route("/payment-settings", put(admin::update_payment_settings::<S>));

    let mut app = public
        .merge(account)
        .nest("/api/admin", back_office)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    HeaderName::from_static(auth::API_KEY_HEADER),
                    HeaderName::from_static(auth::USER_ID_HEADER),
                ]),
        );
    }

    app
}

/// Binds the configured address and serves until SIGINT/SIGTERM.
pub async fn serve<S: Store + 'static>(store: Arc<S>, config: StoreConfig) -> Result<()> {
    let address = config.bind_address();
    let cors = config.cors_enabled();
    if config.admin_token().is_none() {
        tracing::warn!("⚠️ No admin token configured; admin API is disabled");
    }
    if config.verify_api_key().is_none() {
        tracing::warn!("⚠️ No licensing API key configured; verify endpoint is open");
    }

    let state = AppState::new(store, Arc::new(config));
    let app = router(state, cors);

    let listener = TcpListener::bind(&address).await?;
    tracing::info!("🚀 Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Shutdown signal received");
}
