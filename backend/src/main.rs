use clap::Parser;
use santa_backend::{app, AppState, Args};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(store = ?args.store, "opening state store");
    let store = args.open_store().await?;
    let state = AppState::load(store, args.app_config()).await?;
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(args.listen_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
