use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::{routing::get, Router};
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod services;

use config::Config;
use services::ai::AiCampaignService;
use services::email::EmailProvider;
use services::payment::PaymentService;
use services::sms::SmsProvider;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub sms: Arc<dyn SmsProvider>,
    pub email: Arc<dyn EmailProvider>,
    pub payments: PaymentService,
    pub ai: Option<AiCampaignService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "klario_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Klario backend");

    // Initialize database
    let pool = services::init::init_db(&config).await?;

    // Select providers once from configuration presence; the engine only
    // ever sees the injected trait objects.
    let sms = services::init::select_sms_provider(&config);
    let email = services::init::select_email_provider(&config);
    let ai = services::init::select_ai_service(&config);
    let payments = PaymentService::new(&config.payment, &config.server.base_url);

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        sms,
        email,
        payments,
        ai,
    });

    // Rate limiters for public endpoints (auth, payment webhooks)
    let auth_gov_conf = {
        let mut builder = GovernorConfigBuilder::default();
        builder.per_second(config.rate_limit.auth_per_second.into());
        builder.burst_size(config.rate_limit.auth_burst);
        builder.key_extractor(SmartIpKeyExtractor);
        builder.error_handler(rate_limit_error);
        Arc::new(
            builder
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Failed to build auth governor config"))?,
        )
    };

    let webhook_gov_conf = {
        let mut builder = GovernorConfigBuilder::default();
        builder.per_second(config.rate_limit.webhook_per_second.into());
        builder.burst_size(config.rate_limit.webhook_burst);
        builder.key_extractor(SmartIpKeyExtractor);
        builder.error_handler(rate_limit_error);
        Arc::new(
            builder
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Failed to build webhook governor config"))?,
        )
    };

    // Periodic cleanup of rate limiter storage
    {
        let auth_limiter = auth_gov_conf.limiter().clone();
        let webhook_limiter = webhook_gov_conf.limiter().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                auth_limiter.retain_recent();
                webhook_limiter.retain_recent();
            }
        });
    }

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Auth routes (rate limited, public)
        .nest(
            "/api/auth",
            routes::auth::router().layer(GovernorLayer {
                config: auth_gov_conf,
            }),
        )
        // Customer management
        .nest("/api/customers", routes::customers::router())
        // Campaign management + delivery
        .nest("/api/campaigns", routes::campaigns::router())
        // AI content endpoints
        .nest("/api/ai", routes::ai::router())
        // Payment operations + provider callbacks (callbacks rate limited)
        .nest(
            "/api/payment",
            routes::payments::router().merge(routes::payments::webhook_router().layer(
                GovernorLayer {
                    config: webhook_gov_conf,
                },
            )),
        )
        // Add shared state
        .with_state(app_state)
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    config
                        .server
                        .frontend_url
                        .parse::<HeaderValue>()
                        .expect("Invalid FRONTEND_URL for CORS"),
                )
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to bind SIGTERM");
        tokio::select! {
            _ = ctrl_c => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("Failed to bind Ctrl+C");
    }

    tracing::info!("Shutdown signal received");
}

/// Shared error handler for the rate limiting layers: proper 429s with a
/// Retry-After header, in the same JSON error shape as `AppError`.
fn rate_limit_error(error: GovernorError) -> http::Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            let body = serde_json::json!({
                "error": {
                    "code": "RATE_LIMITED",
                    "message": "Rate limit exceeded",
                    "details": { "retry_after_seconds": wait_time }
                }
            })
            .to_string();

            let mut resp = http::Response::new(Body::from(body));
            *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
            resp.headers_mut().insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }
            if let Ok(value) = HeaderValue::from_str(&wait_time.to_string()) {
                resp.headers_mut().insert(http::header::RETRY_AFTER, value);
            }
            resp
        }
        GovernorError::UnableToExtractKey => {
            let body = serde_json::json!({
                "error": {
                    "code": "INVALID_REQUEST",
                    "message": "Unable to determine client IP for rate limiting"
                }
            })
            .to_string();

            let mut resp = http::Response::new(Body::from(body));
            *resp.status_mut() = StatusCode::BAD_REQUEST;
            resp.headers_mut().insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            resp
        }
        GovernorError::Other { code, msg, headers } => {
            let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
            let mut resp = http::Response::new(Body::from(body));
            *resp.status_mut() =
                StatusCode::from_u16(code.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if let Some(hmap) = headers {
                for (name, value) in hmap.iter() {
                    resp.headers_mut().append(name.clone(), value.clone());
                }
            }
            resp
        }
    }
}
