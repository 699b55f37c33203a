use occupancy_fusion::config;
use occupancy_fusion::fusion::FusionEngine;
use occupancy_fusion::oracle::ollama::OllamaOracle;
use occupancy_fusion::pipeline::{AnalysisWorker, EventIngestor};
use occupancy_fusion::{api, transport};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "occupancy-fusion starting"
    );

    let settings = config.fusion();
    tracing::info!(
        occupancy_distance_cm = settings.occupancy_distance_cm,
        min_sensors = settings.min_sensors_for_occupancy,
        vacancy_timeout_secs = settings.vacancy_timeout.as_secs(),
        "Fusion settings loaded"
    );
    let engine = FusionEngine::new(settings).into_shared();

    // The blocking HTTP client owns its own runtime and must be built outside tokio.
    let oracle_settings = config.oracle();
    let oracle = Arc::new(OllamaOracle::new(&oracle_settings)?);
    tracing::info!(url = %oracle_settings.url, model = %oracle_settings.model, "Decision oracle configured");

    let broker = config.broker();
    let (publisher, mqtt_listener) = transport::mqtt::connect(&broker);
    tracing::info!(host = %broker.host, port = broker.port, "Broker client configured");

    let worker = AnalysisWorker::spawn(Arc::clone(&engine), oracle, Arc::new(publisher.clone()));
    let ingestor = EventIngestor::new(Arc::clone(&engine), worker.handle());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let app = api::router(Arc::clone(&engine));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port()));

    let served = runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "API server listening");
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .into_future();
        tokio::select! {
            result = server => result,
            () = mqtt_listener.run(ingestor) => Ok(()),
        }
    });

    tracing::info!("Shutting down");
    publisher.disconnect();
    worker.stop();
    runtime.shutdown_background();
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
