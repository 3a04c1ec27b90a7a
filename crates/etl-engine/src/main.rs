//! etl-engine: consume file-ready events, extract, persist.

mod logging;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use etl_core::PersistenceGateway;
use etl_db::{Database, DatabaseConfig};
use etl_extract::ProcessorRouter;
use etl_pipeline::{
    ConsumerConfig, ConsumerPool, KafkaConfig, KafkaDeadLetterSink, KafkaSource, MessageSource,
    Orchestrator, OrchestratorConfig,
};
use etl_storage::{S3RetrievalGateway, StorageConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let log_settings = logging::LogSettings::from_env();
    let _file_guard = logging::init(&log_settings);

    info!(
        json = log_settings.json,
        log_file = log_settings.file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let kafka_config = KafkaConfig::from_env();
    let consumer_config = ConsumerConfig::from_env();
    let orchestrator_config = OrchestratorConfig::from_env();
    let storage_config = StorageConfig::from_env();
    let database_config = DatabaseConfig::from_env();

    info!(
        kafka_servers = %kafka_config.bootstrap_servers,
        topic = %kafka_config.topic,
        group_id = %kafka_config.group_id,
        workers = consumer_config.workers,
        batch_size = consumer_config.batch_size,
        "ETL engine starting"
    );

    // The engine does nothing useful without its database; fail fast
    info!(database = %database_config.redacted_url(), "Connecting to database...");
    let db = Database::connect_with_config(&database_config.url, database_config.pool_config())
        .await
        .context("Database connection failed")?;
    db.ping().await.context("Database connection failed")?;
    info!("Database connected");

    if database_config.run_migrations {
        info!("Running database migrations...");
        db.migrate().await.context("Database migration failed")?;
        info!("Database migrations complete");
    }

    let storage = S3RetrievalGateway::new(&storage_config)?;
    info!(endpoint = %storage_config.endpoint_url(), "Object store configured");

    let router = ProcessorRouter::with_default_extractors();
    info!(keys = ?router.keys(), "Extractors registered");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(storage),
        Arc::new(router),
        Arc::new(db.clone()),
        orchestrator_config,
    ));

    let mut pool = ConsumerPool::new(orchestrator, consumer_config);
    if let Some(topic) = &kafka_config.dead_letter_topic {
        info!(dead_letter_topic = %topic, "Dead-letter publishing enabled");
        pool = pool.with_dead_letter(Arc::new(KafkaDeadLetterSink::new(&kafka_config, topic)?));
    }

    let handle = pool.start(|_worker_id| {
        let source = KafkaSource::new(&kafka_config)?;
        Ok(Box::new(source) as Box<dyn MessageSource>)
    })?;

    let trigger = handle.shutdown_trigger();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining in-flight messages");
        trigger.trigger();
    });

    info!("ETL engine ready");
    let result = handle.wait().await;

    db.close().await;

    match result {
        Ok(()) => {
            info!("ETL engine stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "ETL engine stopped on fatal error");
            Err(e.into())
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
