use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        tracing::error!("Missing required environment variable: DATABASE_URL");
        std::process::exit(1);
    };

    // First CLI argument overrides PASSGATE_MIGRATIONS_DIR
    let dir = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PASSGATE_MIGRATIONS_DIR").ok())
        .filter(|s| !s.trim().is_empty())
        .map(std::path::PathBuf::from);

    if let Err(e) = passgate::migrate::run(&database_url, dir.as_deref()).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
