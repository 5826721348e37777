#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;

    use cohort_scheduling::{SchedulingOptions, SqliteCohortStore, http_api};
    use tracing::info;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let addr: SocketAddr = std::env::var("COHORT_SCHEDULING_HTTP_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    let db_path =
        std::env::var("COHORT_SCHEDULING_DB").unwrap_or_else(|_| "cohorts.db".to_string());
    let options = match std::env::var("COHORT_SCHEDULING_OPTIONS") {
        Ok(path) => SchedulingOptions::from_json_file(path)?,
        Err(_) => SchedulingOptions::default(),
    };
    options.validate()?;

    let store = SqliteCohortStore::new(&db_path)?;
    info!(%addr, db = %db_path, "cohort-scheduling HTTP API listening");
    http_api::serve(addr, http_api::AppState::new(store, options)).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
