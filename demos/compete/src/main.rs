//! Several in-process "instances" competing for the same schedules.
//!
//! Each instance gets its own handle on a shared `MemoryLock`, so only one of
//! them wins each occurrence. Point `ROTA_CONFIG` at a JSON file to replace the
//! built-in schedules.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use tracing::{info, warn};

use rota_core::{Event, EventKind, HandlerError, MemoryLock, Schedule, Subscribe, handler_fn};
use rota_model::SchedulesConfig;
use rota_observe::{LoggerConfig, install_panic_hook, logger_init};

const INSTANCES: usize = 3;

const DEFAULT_CONFIG: &str = r#"{
    "appName": "demo",
    "schedules": {
        "report":  { "type": 3, "spec": "@every 2s", "compete": true, "lockSeconds": 1, "autoUnlock": false },
        "cleanup": { "type": 2, "spec": "@every 3s", "compete": true, "autoUnlock": true, "overlap": "skip" },
        "flaky":   { "type": 2, "spec": "@every 5s", "compete": true, "autoUnlock": true }
    }
}"#;

/// Logs the events worth seeing in a demo.
struct Reporter {
    instance: usize,
}

#[async_trait]
impl Subscribe for Reporter {
    async fn on_event(&self, event: &Event) {
        match event.kind {
            EventKind::RunSucceeded | EventKind::RunFailed | EventKind::RunCrashed => info!(
                instance = self.instance,
                task = %event.task,
                run = %event.run,
                outcome = ?event.kind,
                reason = event.reason.as_deref().unwrap_or(""),
                "run finished"
            ),
            EventKind::ElectionFailed | EventKind::LockReleaseFailed => warn!(
                instance = self.instance,
                task = %event.task,
                reason = event.reason.as_deref().unwrap_or(""),
                "lock trouble"
            ),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "reporter"
    }
}

fn load_config() -> anyhow::Result<SchedulesConfig> {
    match std::env::var("ROTA_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading schedules from {path}"))?;
            SchedulesConfig::from_json(&raw).with_context(|| format!("parsing {path}"))
        }
        Err(_) => Ok(SchedulesConfig::from_json(DEFAULT_CONFIG)?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1) Logger
    logger_init(&LoggerConfig::from_env()?)?;
    install_panic_hook();
    info!("logger initialized");

    // 2) Schedules
    let config = load_config()?;
    info!(app = %config.app_name, schedules = config.schedules.len(), "config loaded");

    // 3) One schedule per (instance, task), all sharing one lock store
    let store = MemoryLock::new();
    let mut schedules = Vec::new();
    for instance in 0..INSTANCES {
        let lock = Arc::new(store.handle());
        for (name, task) in &config.schedules {
            let handler = handler_fn(move |task| async move {
                if task.name == "flaky" && instance % 2 == 1 {
                    panic!("instance {instance} cannot run {}", task.name);
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
                info!(instance, task = %task.name, args = %task.args, "working");
                Ok::<_, HandlerError>(())
            });

            let schedule = Schedule::builder(name.as_str())
                .with_app_name(config.app_name.as_str())
                .with_config(task)
                .with_lock(lock.clone())
                .with_once_handler(handler.clone())
                .with_periodic_handler(handler)
                .with_subscriber(Arc::new(Reporter { instance }))
                .build()
                .with_context(|| format!("building schedule {name}"))?;
            schedules.push(schedule);
        }
    }

    // 4) Serve
    for schedule in &schedules {
        schedule.serve().await?;
    }
    info!(instances = INSTANCES, "serving; press Ctrl+C to stop");

    // 5) Stop triggers, then wait for in-flight runs
    tokio::signal::ctrl_c().await?;
    info!("shutting down...");
    for schedule in &schedules {
        schedule.shutdown().await?;
    }
    for schedule in &schedules {
        schedule.drain().await;
    }
    info!("all runs finished");

    Ok(())
}
