use care_app::app::{run, AppConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let config = AppConfig::from_env().unwrap_or_default();
    if let Err(err) = run(config).await {
        eprintln!("Failed to start Tailkeep: {err}");
    }
}
