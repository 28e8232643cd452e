mod handlers;
mod worker;

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use argp::FromArgs;
use axum::{
    Router,
    http::{StatusCode, header},
};
use prhook_core::{config::Config, dispatch::Dispatcher};
use prhook_jenkins::Jenkins;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{handlers::build_router, worker::EventQueue};

#[derive(FromArgs, Debug)]
/// Launch Jenkins jobs for Bitbucket pull request webhooks.
struct Args {
    #[argp(option, short = 'c', default = "String::from(\"config.yml\")")]
    /// configuration file for the server
    config: String,
}

#[derive(Clone)]
pub struct AppState {
    queue: EventQueue,
}

#[tokio::main]
async fn main() {
    let args: Args = argp::parse_args_or_exit(argp::DEFAULT);

    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = Arc::new(Config::load(&args.config).expect("Failed to load config file"));
    tracing::info!(
        "Loaded {} projects, jenkins server {}",
        config.projects.len(),
        config.jenkins.url
    );
    let jenkins = Jenkins::new(&config.jenkins).expect("Failed to create Jenkins client");
    let dispatcher = Arc::new(Dispatcher::new(config.clone(), jenkins));

    // Start the dispatch workers
    let (queue, rx) = EventQueue::new(config.worker.queue_size);
    let workers = tokio::spawn(worker::run(rx, dispatcher, config.worker.concurrency));

    let router = app(AppState { queue });
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
    let listener = TcpListener::bind(addr).await.expect("bind error");
    tracing::info!("Web server: Listening on {}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")
    {
        tracing::error!("{e:?}");
    }
    tracing::info!("Web server stopped");

    // The router owned the only queue sender, so the workers exit once the
    // remaining events are dispatched
    match tokio::time::timeout(Duration::from_secs(30), workers).await {
        Ok(Ok(())) => tracing::info!("Shut down gracefully"),
        Ok(Err(e)) => tracing::error!("Dispatch workers failed: {e}"),
        Err(_) => tracing::warn!("Abandoning in-flight dispatches"),
    }
}

fn app(state: AppState) -> Router {
    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION, header::COOKIE].into();
    let middleware = ServiceBuilder::new()
        .sensitive_request_headers(sensitive_headers)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ));
    build_router().with_state(state).layer(middleware)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            result = signal::ctrl_c() => result.expect("Failed to listen for ctrl-c"),
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for ctrl-c");
    }
}
