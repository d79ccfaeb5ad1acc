use dotenvy::dotenv;
use migration::MigratorTrait;
use tracing::{error, info};
use uuid::Uuid;

fn init_logging() {
    // Load .env early so RUST_LOG and DATABASE_URL take effect
    dotenv().ok();
    common::utils::logging::init_logging_default();
    info!(service = "sweeper", event = "logger_init", "tracing subscriber initialized");
}

fn load_config() -> configs::AppConfig {
    match configs::AppConfig::load_and_validate() {
        Ok(cfg) => cfg,
        Err(e) => {
            info!(error = %e, "config.toml not usable, falling back to env defaults");
            let mut cfg = configs::AppConfig::default();
            cfg.database.normalize_from_env();
            cfg
        }
    }
}

fn main() -> std::process::ExitCode {
    init_logging();

    let service_id = Uuid::new_v4();
    let pid = std::process::id();

    std::panic::set_hook(Box::new({
        move |info| {
            error!(
                service = "sweeper",
                event = "panic",
                %service_id,
                pid,
                message = %info,
                "unhandled panic occurred"
            );
        }
    }));

    let cfg = load_config();
    if let Err(e) = cfg.database.validate() {
        error!(error = %e, "invalid database configuration");
        return std::process::ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return std::process::ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cfg))
}

async fn run(cfg: configs::AppConfig) -> std::process::ExitCode {
    let db = match models::db::connect_with(&cfg.database).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            return std::process::ExitCode::FAILURE;
        }
    };
    if let Err(e) = migration::Migrator::up(&db, None).await {
        error!(error = %e, "migration failed");
        return std::process::ExitCode::FAILURE;
    }
    info!(
        interval_secs = cfg.sweep.interval_secs,
        retention_days = cfg.sweep.abandoned_retention_days,
        "draft sweep started"
    );

    let mut ticker =
        tokio::time::interval(std::time::Duration::from_secs(cfg.sweep.interval_secs));
    loop {
        ticker.tick().await;
        let now = chrono::Utc::now();
        match service::draft_wizard::sweep_expired_drafts(&db, now).await {
            Ok(swept) if swept > 0 => info!(swept, "abandoned expired drafts"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "draft sweep failed"),
        }
        match service::draft_wizard::purge_abandoned_drafts(
            &db,
            now,
            cfg.sweep.abandoned_retention_days,
        )
        .await
        {
            Ok(purged) if purged > 0 => info!(purged, "purged old abandoned drafts"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "draft purge failed"),
        }
    }
}
