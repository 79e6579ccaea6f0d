use anyhow::{Context, Result};
use audience_rec::{api::create_router, init_tracing, AppState, Config};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = Config::load_or_default(&args.config)?;
    info!("Starting audience recommendation server with config: {:?}", config.server);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    let addr = config.server.socket_addr()?;

    // No partial availability: a missing or invalid cache stops startup here.
    let state = AppState::new(config)?;

    #[cfg(unix)]
    spawn_reload_on_sighup(state.clone())?;

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(unix)]
fn spawn_reload_on_sighup(state: AppState) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            info!("SIGHUP received, reloading recommendation cache");
            if let Err(e) = state.reload().await {
                tracing::warn!("Keeping the previous cache: {:#}", e);
            }
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
