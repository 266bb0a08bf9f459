use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_mood_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use happitrack::config::AppConfig;
use happitrack::error::AppError;
use happitrack::history::{HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
use happitrack::notify::SmtpMailer;
use happitrack::telemetry;
use happitrack::MoodService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    if !config.mail.enabled() {
        warn!("MAIL_USERNAME not set; history summaries are disabled");
    }

    if args.in_memory {
        info!("history kept in memory; entries are lost on shutdown");
        serve(config, Arc::new(MemoryHistoryStore::new())).await
    } else {
        let store = SqliteHistoryStore::connect(&config.database.url).await?;
        serve(config, Arc::new(store)).await
    }
}

async fn serve<S>(config: AppConfig, store: Arc<S>) -> Result<(), AppError>
where
    S: HistoryStore + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let notifier = Arc::new(SmtpMailer::new(config.mail.clone()));
    let service = Arc::new(MoodService::new(store, notifier));

    let app = with_mood_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "happiness tracker ready");

    axum::serve(listener, app).await?;
    Ok(())
}
