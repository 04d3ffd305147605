use crate::{
    admission::{DEFAULT_WINDOW, FixedWindowLimiter, NoopRateLimiter, RateLimiter},
    delivery::DeliveryConfig,
    directory::{Directory, PgDirectory},
    guard::{self, AccessGuard},
    otp::{OtpConfig, OtpIssuer},
    token::{Role, TokenVerifier},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    middleware,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{Span, debug, info, info_span};
use ulid::Ulid;

pub mod handlers;
pub mod response;
pub mod state;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;
pub use state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Runtime settings for [`new`].
#[derive(Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: String,
    pub verifier: TokenVerifier,
    pub rate_limit: u32,
    pub otp: OtpConfig,
    pub delivery: DeliveryConfig,
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    let ServerConfig {
        port,
        dsn,
        verifier,
        rate_limit,
        otp,
        delivery,
    } = config;

    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;
    let directory: Arc<dyn Directory> = Arc::new(PgDirectory::new(pool));

    let client = reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;
    let mailer = delivery.mailer(&client);
    let messenger = delivery.messenger(&client);

    let limiter: Arc<dyn RateLimiter> = if rate_limit == 0 {
        info!("Admission limiting disabled");
        Arc::new(NoopRateLimiter)
    } else {
        Arc::new(FixedWindowLimiter::new(DEFAULT_WINDOW))
    };
    spawn_admission_sweep(Arc::clone(&limiter));

    let guard = Arc::new(AccessGuard::new(limiter, Arc::new(verifier), rate_limit));
    let issuer = Arc::new(OtpIssuer::new(otp, Arc::clone(&mailer)));
    let state = Arc::new(AppState::new(guard, issuer, directory, mailer, messenger));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Build the full router: route groups with their gates plus the shared middleware stack.
pub fn app(state: Arc<AppState>) -> Router {
    let guard = Arc::clone(state.guard());
    let (public, _) = openapi::public_routes().split_for_parts();
    let (admitted, _) = openapi::admitted_routes().split_for_parts();
    let (member, _) = openapi::member_routes().split_for_parts();
    let (admin, _) = openapi::admin_routes().split_for_parts();

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true);

    public
        .merge(guard::admit_only(admitted, &guard))
        .merge(guard::protect(member, &guard, None))
        .merge(guard::protect(admin, &guard, Some(&[Role::Admin])))
        .fallback(response::route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CatchPanicLayer::custom(response::panic_response))
                .layer(middleware::map_response(response::timeout_response))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors)
                .layer(Extension(state)),
        )
}

fn spawn_admission_sweep(limiter: Arc<dyn RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DEFAULT_WINDOW);
        loop {
            interval.tick().await;
            limiter.sweep();
            debug!(tracked = limiter.tracked_clients(), "admission buckets swept");
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
