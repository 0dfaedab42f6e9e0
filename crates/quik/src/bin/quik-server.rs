use quik::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        addr = %config.bind_addr(),
        time_limit = config.room.time_limit,
        win_threshold = config.room.win_threshold,
        "starting Quik server"
    );

    let server = match QuikServer::builder().config(config).build().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("ctrl-c received");
    };

    if let Err(e) = server.run_until(shutdown).await {
        tracing::error!(error = %e, "server stopped with error");
        std::process::exit(1);
    }
}
