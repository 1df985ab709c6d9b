use actix_web::{middleware, web, App, HttpServer};
use chat_relay_service::{
    broker::{
        KafkaPublisher, KafkaTopicProvisioner, MessageDispatcher, PrivateMessageConsumer,
        PrivateMessageConsumerConfig, TopicProvisioner,
    },
    config, db, error, logging, metrics,
    metrics::ChatMetrics,
    routes,
    services::PgMessageStore,
    state::AppState,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = config::Config::from_env()?;
    let metrics = ChatMetrics::new();

    // Connections are lazy; an unreachable database only fails individual writes
    let pool = db::init_pool(&cfg.database_url, cfg.db_max_connections)?;
    if let Err(e) = db::ensure_schema(&pool).await {
        tracing::error!(error = %e, "Failed to prepare message schema");
    }
    let store = Arc::new(PgMessageStore::new(pool));

    let kafka = &cfg.kafka;
    let provisioner: Arc<dyn TopicProvisioner> = Arc::new(KafkaTopicProvisioner::new(
        &kafka.brokers,
        kafka.topic_partitions,
        kafka.topic_replication,
        metrics.clone(),
    )?);
    let publisher = Arc::new(KafkaPublisher::new(
        &kafka.brokers,
        kafka.message_timeout_ms,
        provisioner.clone(),
    )?);

    let state = AppState::new(
        store,
        publisher,
        kafka.topic_strategy.clone(),
        metrics.clone(),
    )
    .with_session_resume(cfg.session_resume_enabled);

    let consumer_config = PrivateMessageConsumerConfig::for_strategy(
        &kafka.brokers,
        &kafka.consumer_group,
        &kafka.topic_strategy,
    );
    let dispatcher = MessageDispatcher::new(state.registry.clone(), metrics.clone());
    match PrivateMessageConsumer::new(consumer_config, dispatcher, provisioner) {
        Ok(consumer) => {
            tokio::spawn(Arc::new(consumer).start_consuming());
        }
        Err(e) => {
            tracing::error!(error = %e, "Kafka consumer unavailable, cross-instance delivery disabled");
        }
    }

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(
        %bind_addr,
        topic_strategy = kafka.topic_strategy.name(),
        session_resume = cfg.session_resume_enabled,
        "starting chat-relay-service"
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))
}
