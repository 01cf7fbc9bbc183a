use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glsecrets::api::{self, AppState};
use glsecrets::backend::{Backend, Request};
use glsecrets::client::gitlab::GitlabClientFactory;
use glsecrets::config;
use glsecrets::jobs;
use glsecrets::models::LeasedSecret;
use glsecrets::notification::webhook::WebhookSink;
use glsecrets::notification::{EventSink, LogSink, MultiSink};
use glsecrets::store::file::FileStorage;
use glsecrets::store::Storage;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let otel_enabled = init_tracing()?;

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&cfg.data_dir));
    let backend = Arc::new(build_backend(&cfg)?);

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, backend, storage, port).await,
        Some(cli::Commands::Config { command }) => {
            handle_config_command(command, &backend, Request::new(storage)).await
        }
        Some(cli::Commands::Rotate { name }) => {
            let config = backend.rotate(&Request::new(storage), &name).await?;
            print_json(&config)
        }
        Some(cli::Commands::RotateDue) => {
            let rotated = jobs::auto_rotate::run_once(&backend, &Request::new(storage)).await?;
            println!("rotated {} configuration(s)", rotated);
            Ok(())
        }
        Some(cli::Commands::Revoke { lease_id, metadata }) => {
            let internal_data: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&metadata).context("--metadata must be a JSON object")?;
            let req = Request::new(storage).with_secret(LeasedSecret::new(lease_id, internal_data));
            let outcome = backend.revoke(&req).await?;
            println!("{}", outcome.as_str());
            Ok(())
        }
        None => run_server(cfg, backend, storage, None).await,
    };

    if otel_enabled {
        opentelemetry::global::shutdown_tracer_provider();
    }
    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// Install the tracing subscriber. Returns whether an OTLP exporter was set up.
fn init_tracing() -> anyhow::Result<bool> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "glsecrets"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };
    let otel_enabled = telemetry_layer.is_some();

    let json = std::env::var("GLSECRETS_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "glsecrets=debug,tower_http=info".into()),
        ))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .with(telemetry_layer)
        .init();

    Ok(otel_enabled)
}

fn build_backend(cfg: &config::Config) -> anyhow::Result<Backend> {
    let mut events = MultiSink::new().with(Arc::new(LogSink));
    if !cfg.webhook_urls.is_empty() {
        let webhook = WebhookSink::new(
            cfg.webhook_urls.clone(),
            cfg.webhook_secret.clone(),
            &cfg.event_prefix,
        )?;
        tracing::info!(urls = webhook.urls().len(), "webhook delivery enabled");
        events = events.with(Arc::new(webhook));
    }

    let factory = Arc::new(GitlabClientFactory::new(cfg.remote_timeout));
    let events: Arc<dyn EventSink> = Arc::new(events);
    Ok(Backend::new(factory)?.with_events(events))
}

async fn run_server(
    cfg: config::Config,
    backend: Arc<Backend>,
    storage: Arc<dyn Storage>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&cfg.data_dir)
        .await
        .with_context(|| format!("cannot create data dir {}", cfg.data_dir.display()))?;

    if let Some(every) = cfg.rotate_interval {
        tracing::info!(interval_secs = every.as_secs(), "starting auto-rotate job");
        jobs::auto_rotate::spawn(backend.clone(), storage.clone(), every);
    }

    let state = Arc::new(AppState::new(backend, storage));
    let app = api::router(state);

    let port = port.unwrap_or(cfg.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("glsecrets listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn handle_config_command(
    command: cli::ConfigCommands,
    backend: &Backend,
    req: Request,
) -> anyhow::Result<()> {
    match command {
        cli::ConfigCommands::Write { name, fields } => {
            let config = backend.write_config(&req, &name, fields.into()).await?;
            print_json(&config)
        }
        cli::ConfigCommands::Read { name } => print_json(&backend.read_config(&req, &name).await?),
        cli::ConfigCommands::Patch { name, fields } => {
            let config = backend.patch_config(&req, &name, fields.into()).await?;
            print_json(&config)
        }
        cli::ConfigCommands::Delete { name } => {
            backend.delete_config(&req, &name).await?;
            println!("deleted {}", name);
            Ok(())
        }
        cli::ConfigCommands::List => {
            for name in backend.list_configs(&req).await? {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
