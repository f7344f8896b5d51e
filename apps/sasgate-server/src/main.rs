//! sasgate server - SAS-protected webhook gateway.
//!
//! Serves the notification endpoints of `sasgate-http` and answers health probes.
//! The same binary signs callback URLs for producers.
//!
//! # Usage
//!
//! ```text
//! SECRET_KEY=... PUBLIC_BASE_URL=https://bot.example.com sasgate-server
//! SECRET_KEY=... sasgate-server --sign-url flow-messages channelId=c1 flowName=deploy
//! sasgate-server --health-check
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEWAY_LISTEN` | `0.0.0.0:4580` | Bind address |
//! | `PUBLIC_BASE_URL` | `http://localhost:4580` | Base URL of signed channel ids |
//! | `SECRET_KEY` | *(unset)* | Primary shared secret (required) |
//! | `SECONDARY_SECRET_KEY` | *(unset)* | Secret still accepted during rotation |
//! | `SAS_ALLOWED_VERSIONS` | `1.0` | Accepted `sv` values |
//! | `SAS_CLOCK_SKEW_SECS` | `300` | Tolerated clock skew |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use sasgate_auth::{SasConfig, WebhookAuthorizer, WebhookEndpoint};
use sasgate_http::{LoggingNotificationHandler, NotificationHandler, WebhookService};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Server version logged at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Validity of URLs produced by `--sign-url` unless `--ttl-secs` is given.
const DEFAULT_CALLBACK_TTL_SECS: i64 = 3600;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// The endpoints this gateway protects.
fn default_endpoints() -> Vec<WebhookEndpoint> {
    vec![
        WebhookEndpoint::itsm_incidents(),
        WebhookEndpoint::flow_messages(),
    ]
}

fn build_authorizer(config: &SasConfig) -> Result<WebhookAuthorizer> {
    WebhookAuthorizer::from_config(config, default_endpoints())
        .context("invalid SAS configuration")
}

/// Arguments of `--sign-url ENDPOINT [NAME=VALUE ...] [--ttl-secs N]`.
#[derive(Debug, PartialEq, Eq)]
struct SignRequest {
    endpoint: String,
    values: Vec<(String, String)>,
    ttl_secs: i64,
}

fn parse_sign_request(args: &[String]) -> Result<SignRequest> {
    let mut iter = args.iter();
    let endpoint = iter
        .next()
        .context("usage: --sign-url ENDPOINT [NAME=VALUE ...] [--ttl-secs N]")?
        .clone();

    let mut values = Vec::new();
    let mut ttl_secs = DEFAULT_CALLBACK_TTL_SECS;
    while let Some(arg) = iter.next() {
        if arg == "--ttl-secs" {
            let raw = iter.next().context("--ttl-secs requires a value")?;
            ttl_secs = raw
                .parse()
                .with_context(|| format!("invalid --ttl-secs value: {raw}"))?;
        } else {
            let (name, value) = arg
                .split_once('=')
                .with_context(|| format!("expected NAME=VALUE, got {arg}"))?;
            values.push((name.to_owned(), value.to_owned()));
        }
    }

    Ok(SignRequest {
        endpoint,
        values,
        ttl_secs,
    })
}

/// Produce a signed callback URL for the named endpoint.
fn sign_url(config: &SasConfig, request: &SignRequest) -> Result<String> {
    let authorizer = build_authorizer(config)?;
    let endpoint = authorizer
        .endpoint_by_name(&request.endpoint)
        .with_context(|| format!("unknown endpoint: {}", request.endpoint))?;

    if request.ttl_secs <= 0 {
        anyhow::bail!("--ttl-secs must be positive, got {}", request.ttl_secs);
    }
    let ttl = chrono::Duration::try_seconds(request.ttl_secs)
        .with_context(|| format!("ttl out of range: {}", request.ttl_secs))?;
    let policy = endpoint
        .policy_at(chrono::Utc::now(), ttl)
        .with_context(|| format!("expiry out of range for ttl {}s", request.ttl_secs))?;
    let values: Vec<(&str, &str)> = request
        .values
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    Ok(authorizer.sign_callback(endpoint, &values, policy))
}

/// Run the accept loop, serving connections until a shutdown signal is received.
async fn serve<H: NotificationHandler>(
    listener: TcpListener,
    service: WebhookService<H>,
) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Request the health endpoint of a running gateway.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request = format!("GET /health HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"status\":\"running\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = SasConfig::from_env();

    // Docker HEALTHCHECK.
    if args.iter().any(|a| a == "--health-check") {
        let addr = config.gateway_listen.replace("0.0.0.0", "127.0.0.1");
        let healthy = run_health_check(&addr).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    if let Some(pos) = args.iter().position(|a| a == "--sign-url") {
        let request = parse_sign_request(&args[pos + 1..])?;
        println!("{}", sign_url(&config, &request)?);
        return Ok(());
    }

    init_tracing(&config.log_level)?;

    info!(
        gateway_listen = %config.gateway_listen,
        public_base_url = %config.public_base_url,
        allowed_versions = ?config.allowed_versions,
        clock_skew_secs = config.clock_skew_secs,
        key_rotation = config.secondary_secret_key.is_some(),
        version = VERSION,
        "starting sasgate server",
    );

    let authorizer = build_authorizer(&config)?;
    for endpoint in authorizer.endpoints() {
        info!(name = %endpoint.name, path = %endpoint.path, "protecting endpoint");
    }
    let service = WebhookService::new(LoggingNotificationHandler, authorizer);

    let addr: SocketAddr = config
        .gateway_listen
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.gateway_listen))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
