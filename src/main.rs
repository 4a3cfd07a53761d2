use std::time::Duration;

use kameo::request::MessageSend;
use tracing::{error, info, warn};

use rvol_engine::logging::{cleanup_old_logs, init_dual_logging, init_simple_logging, log_system_info};
use rvol_engine::scheduler::SchedulerTell;
use rvol_engine::server;
use rvol_engine::{RvolService, ServiceConfig};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match ServiceConfig::from_toml(CONFIG_PATH) {
        Ok(config) => {
            // Simple print until logging is initialized
            println!("✅ Loaded configuration from {}", CONFIG_PATH);
            config
        }
        Err(e) => {
            println!("⚠️ Failed to load {}: {}. Using default configuration", CONFIG_PATH, e);
            ServiceConfig::default()
        }
    };

    let logging_config = config.logging_config();
    let _logging_guard = match init_dual_logging(&logging_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("❌ Failed to initialize logging system: {}", e);
            init_simple_logging();
            error!("⚠️ Using fallback console-only logging due to error: {}", e);
            None
        }
    };

    if let Err(e) = cleanup_old_logs(&logging_config.log_dir, logging_config.cleanup_days) {
        warn!("⚠️ Failed to clean up old log files: {}", e);
    }
    log_system_info();

    info!("🚀 Starting RVOL engine");
    let service = RvolService::start(config.clone()).await?;

    let scheduler = if config.scheduler.enabled {
        let scheduler = service.spawn_scheduler();
        let ticker = scheduler.clone();
        let tick_interval = Duration::from_secs(config.scheduler.tick_interval_seconds);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                interval.tick().await;
                let now = chrono::Utc::now();
                if let Err(e) = ticker.tell(SchedulerTell::Tick { now }).send().await {
                    warn!("Scheduler tick failed, stopping ticker: {}", e);
                    break;
                }
            }
        });
        Some(scheduler)
    } else {
        info!("Scheduler disabled; daily reset and nightly precompute must be driven externally");
        None
    };

    if config.server.enabled {
        let state = service.server_state();
        let server_config = config.server.clone();
        tokio::spawn(async move {
            if let Err(e) = server::serve(&server_config, state).await {
                error!("❌ HTTP server failed: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C, shutting down");

    if let Some(scheduler) = scheduler {
        if let Err(e) = scheduler.stop_gracefully().await {
            warn!("Failed to stop scheduler: {}", e);
        }
    }
    service.shutdown().await;

    Ok(())
}
