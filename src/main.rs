use color_eyre::eyre::{Result, WrapErr};
use fixturesrv::FixtureServer;
use fixturesrv::http::{HttpConfig, Response};
use http::StatusCode;

use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fixturesrv=info".into()),
        )
        .init();

    // fixturesrv [port] [text]
    let args: Vec<String> = std::env::args().collect();
    let port = match args.get(1) {
        Some(port) => port
            .parse::<u16>()
            .wrap_err_with(|| format!("Invalid port {port:?}"))?,
        None => 8080,
    };
    let text = args.get(2).cloned().unwrap_or_else(|| "hello".to_string());

    let config = HttpConfig::default().with_max_connections(1000);
    info!(port, max_connections = config.max_connections, "Starting fixture server");

    let server = FixtureServer::builder()
        .get(move |_| Response::text(StatusCode::OK, text.clone()))
        .config(config)
        .build();

    let mut control = if port == 0 {
        server.start_server().await
    } else {
        server.start_server_on(port).await
    }
    .wrap_err("Failed to start fixture server")?;
    info!(uri = %control.base_uri("http")?, "Serving until Ctrl-C");

    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for Ctrl-C")?;

    info!("Flushing in-flight responses");
    control.flush().await.wrap_err("Flush failed")?;
    control.stop().await;
    info!(
        heard = control.heard_count(),
        matched = control.matched_count(),
        "Fixture server exited"
    );
    Ok(())
}
