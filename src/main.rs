use std::net::SocketAddr;

use dotenvy::dotenv;
use snafu::ResultExt as _;
use tokio::net::TcpListener;
use tokio::signal;

use clickmap::api::{create_router, App};
use clickmap::config::Config;
use clickmap::database::Database;
use clickmap::error::{
    ApplicationError, BindAddressSnafu, ConnectDatabaseSnafu, TemplatesSnafu, WebServerSnafu,
};
use clickmap::logger;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;

    let database = Database::connect_with_retry(&config.database.url)
        .await
        .context(ConnectDatabaseSnafu)?;
    let app = App::from_config(&config, database).context(TemplatesSnafu)?;

    let address = config.address();
    let listener = TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;
    tracing::info!(%address, geoip = %config.geoip_db_path.display(), "listening for clicks");

    let service = create_router(app).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("received ctrl+c, shutting down"),
            Err(error) => {
                tracing::error!(%error, "could not listen for ctrl+c");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                tracing::info!("received terminate signal, shutting down");
            }
            Err(error) => {
                tracing::error!(%error, "could not listen for the terminate signal");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
