//! Component Orchestrator
//!
//! Serves the component REST API over either a Kubernetes cluster or, in
//! standalone mode, an in-process store. Health and metrics endpoints run on
//! their own listeners.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use component_orchestrator::{
    crd, ApiServer, ApiServerConfig, Component, ComponentPluginBinding, ComponentSynchronizer,
    ComponentTranslator, Error, KubeStore, MemoryStore, ObjectStore, ResponseBuilder, Result,
    SyncMetrics, TimestampClaimNames,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Component Orchestrator - component synchronization and plugin-binding reconciliation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Run in standalone mode (in-memory store, no Kubernetes)
    #[arg(long, env = "STANDALONE")]
    standalone: bool,

    /// Namespaces known to the standalone store; empty accepts any
    #[arg(long, env = "NAMESPACES", value_delimiter = ',')]
    namespaces: Vec<String>,

    /// Print the CRD manifests and exit
    #[arg(long)]
    print_crds: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_crds {
        print!("{}", crd::crds_yaml()?);
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting Component Orchestrator");
    info!("  Version: {}", component_orchestrator::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!("  Standalone mode: {}", args.standalone);

    let metrics = SyncMetrics::new();
    metrics.register(prometheus::default_registry())?;

    let (components, bindings) = build_stores(&args).await?;

    let synchronizer = ComponentSynchronizer::new(
        ComponentTranslator::new(Arc::new(TimestampClaimNames)),
        components,
        bindings,
        metrics,
    );
    let responses = ResponseBuilder::new(synchronizer.reconciler().clone());

    let ready = Arc::new(AtomicBool::new(false));

    // Start health server
    let health_addr = args.health_addr.clone();
    let health_ready = ready.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_ready).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr).await {
            error!("Metrics server error: {}", e);
        }
    });

    let api_config = ApiServerConfig {
        rest_addr: args
            .api_addr
            .parse()
            .map_err(|e| Error::Configuration(format!("Invalid REST API address: {}", e)))?,
    };

    let api_server = ApiServer::new(api_config, synchronizer, responses);

    let shutdown = api_server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });

    ready.store(true, Ordering::SeqCst);
    api_server.run().await?;

    info!("Orchestrator shutdown complete");
    Ok(())
}

type Stores = (
    Arc<dyn ObjectStore<Component>>,
    Arc<dyn ObjectStore<ComponentPluginBinding>>,
);

async fn build_stores(args: &Args) -> Result<Stores> {
    if args.standalone {
        let namespaces: Vec<&str> = args
            .namespaces
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();

        let (components, bindings): (MemoryStore<Component>, MemoryStore<ComponentPluginBinding>) =
            if namespaces.is_empty() {
                info!("Using in-memory store accepting any namespace");
                (MemoryStore::new(), MemoryStore::new())
            } else {
                info!("Using in-memory store for namespaces {:?}", namespaces);
                (
                    MemoryStore::with_namespaces(namespaces.iter().copied()),
                    MemoryStore::with_namespaces(namespaces.iter().copied()),
                )
            };
        let components: Arc<dyn ObjectStore<Component>> = Arc::new(components);
        let bindings: Arc<dyn ObjectStore<ComponentPluginBinding>> = Arc::new(bindings);
        return Ok((components, bindings));
    }

    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let components: Arc<dyn ObjectStore<Component>> =
        Arc::new(KubeStore::<Component>::new(client.clone()));
    let bindings: Arc<dyn ObjectStore<ComponentPluginBinding>> =
        Arc::new(KubeStore::<ComponentPluginBinding>::new(client));
    Ok((components, bindings))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "axum=info"] {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| Error::Configuration(format!("Invalid log directive: {}", e)))?,
        );
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

// =============================================================================
// Health Server
// =============================================================================

fn text_response(
    status: hyper::StatusCode,
    body: impl Into<hyper::Body>,
) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(body.into());
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: &str, ready: Arc<AtomicBool>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let ready = ready.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let ready = ready.load(Ordering::SeqCst);
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => text_response(StatusCode::OK, "ok"),
                        "/readyz" if ready => text_response(StatusCode::OK, "ok"),
                        "/readyz" => text_response(StatusCode::SERVICE_UNAVAILABLE, "starting"),
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid health server address: {}", e)))?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};
    use prometheus::{Encoder, TextEncoder};

    let make_svc = make_service_fn(|_conn| async {
        Ok::<_, std::convert::Infallible>(service_fn(|req: Request<Body>| async move {
            let response = match req.uri().path() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();
                    match encoder.encode(&prometheus::gather(), &mut buffer) {
                        Ok(()) => {
                            let mut response = text_response(StatusCode::OK, buffer);
                            if let Ok(value) = encoder.format_type().parse() {
                                response
                                    .headers_mut()
                                    .insert(hyper::header::CONTENT_TYPE, value);
                            }
                            response
                        }
                        Err(e) => {
                            error!("Failed to encode metrics: {}", e);
                            text_response(StatusCode::INTERNAL_SERVER_ERROR, "encoding failed")
                        }
                    }
                }
                _ => text_response(StatusCode::NOT_FOUND, "not found"),
            };
            Ok::<_, std::convert::Infallible>(response)
        }))
    });

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid metrics server address: {}", e)))?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
