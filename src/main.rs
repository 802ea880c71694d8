use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::Extension;
use axum::routing::get;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dialback::clock::{Clock, SystemClock};
use dialback::config::{self, Config, StoreBackend};
use dialback::protocol::{responder, verifier, DialbackClient, RemoteIdentity, Responder, Verifier};
use dialback::discovery::WebfingerDiscovery;
use dialback::jobs;
use dialback::store::{Databank, MemoryBank, RedisBank, TokenStore};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OTLP export is opt-in through OTEL_EXPORTER_OTLP_ENDPOINT.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "dialbackd"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "dialback=debug,dialbackd=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Post {
            url,
            id,
            body,
            content_type,
        }) => run_post(cfg, url, id, body, content_type).await,
        Some(cli::Commands::Sweep) => run_sweep(cfg).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn open_store(cfg: &Config) -> anyhow::Result<TokenStore> {
    let bank: Arc<dyn Databank> = match cfg.store {
        StoreBackend::Memory => Arc::new(MemoryBank::new()),
        StoreBackend::Redis => {
            tracing::info!("Connecting to Redis...");
            Arc::new(RedisBank::connect(&cfg.redis_url).await?)
        }
    };
    Ok(TokenStore::new(bank))
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    if !cfg.shares_issued_tokens() {
        tracing::warn!("DIALBACK_STORE=memory: tokens issued by `dialbackd post` cannot be confirmed by this node; use DIALBACK_STORE=redis to pair them");
    }

    let callback = Arc::new(Responder::new(cfg.hostname.clone(), store.clone(), clock.clone()));
    let discovery = Arc::new(WebfingerDiscovery::new(cfg.discovery_scheme.clone(), cfg.http_timeout())?);
    let verifier = Arc::new(Verifier::new(
        discovery,
        clock.clone(),
        cfg.public_scheme.clone(),
        cfg.public_authority.clone(),
        cfg.http_timeout(),
    )?);

    let protected = axum::Router::new()
        .route("/whoami", get(whoami).post(whoami))
        .layer(axum::middleware::from_fn_with_state(verifier, verifier::dialback_auth));

    let app = axum::Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(responder::router(callback, &cfg.dialback_path))
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware));

    jobs::sweep::spawn(store, clock, cfg.sweep_interval());
    tracing::info!(
        interval_ms = cfg.sweep_interval_ms,
        "Background sweep job started"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        hostname = %cfg.hostname,
        path = %cfg.dialback_path,
        "dialbackd listening on {}",
        addr
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Sample protected resource: echoes the confirmed caller.
async fn whoami(Extension(identity): Extension<RemoteIdentity>) -> String {
    match identity {
        RemoteIdentity::Host(host) => format!("host {}", host),
        RemoteIdentity::User(user) => format!("user {}", user),
    }
}

async fn run_post(
    cfg: Config,
    url: String,
    id: Option<String>,
    body: String,
    content_type: String,
) -> anyhow::Result<()> {
    if !cfg.shares_issued_tokens() {
        eprintln!("warning: DIALBACK_STORE=memory; the issued token dies with this process and the callback will not be confirmed");
    }
    let store = open_store(&cfg).await?;
    let client = DialbackClient::new(store, Arc::new(SystemClock), &cfg.user_agent, cfg.http_timeout())?;
    let id = id.unwrap_or_else(|| cfg.hostname.clone());

    let resp = client
        .post(&url, &id, body, &content_type)
        .await
        .with_context(|| format!("dialback POST to {} failed", url))?;
    println!("{}\n{}", resp.status, resp.body);
    Ok(())
}

async fn run_sweep(cfg: Config) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;
    let evicted = jobs::sweep::run_once(&store, &SystemClock).await?;
    println!("Evicted {} expired token(s).", evicted);
    Ok(())
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
