use crate::events::RunEvent;
use chrono::Utc;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Installs a console subscriber filtered by `RUST_LOG`, `info` by default.
///
/// Calling it again, or after another subscriber was installed, does nothing.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().compact().with_target(false);

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
    {
        tracing::debug!(error = %err, "Global subscriber already installed");
    }
}

/// Durable, human-readable record of one run.
///
/// Each event becomes one timestamped line in
/// `run-<YYYYmmdd-HHMMSS>-<run id>.log` and is mirrored on the tracing
/// subscriber. Writes are serialized, so a `RunLog` can be shared between the
/// controller and the evaluation workers.
pub struct RunLog {
    run_id: Uuid,
    path: Option<PathBuf>,
    sink: Option<Mutex<RollingFileAppender>>,
}

impl RunLog {
    /// Opens a fresh log file for a new run inside `directory`.
    pub fn create(directory: impl AsRef<Path>) -> io::Result<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)?;

        let run_id = Uuid::now_v7();
        let prefix = format!("run-{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), run_id);

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(&prefix)
            .filename_suffix("log")
            .build(directory)
            .map_err(io::Error::other)?;

        Ok(Self {
            run_id,
            path: Some(directory.join(format!("{prefix}.log"))),
            sink: Some(Mutex::new(appender)),
        })
    }

    /// A log that only mirrors events on the tracing subscriber.
    pub fn console_only() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            path: None,
            sink: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Location of the log file, if the log has one.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Records an event. Failing to write the file never interrupts the run.
    pub fn record(&self, event: &RunEvent) {
        let level = event.level();
        if level == Level::ERROR {
            tracing::error!(run_id = %self.run_id, "{event}");
        } else {
            tracing::info!(run_id = %self.run_id, "{event}");
        }

        let Some(sink) = &self.sink else {
            return;
        };

        let line = format!(
            "{} {:<5} {}\n",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            level.to_string(),
            event
        );

        match sink.lock() {
            Ok(mut writer) => {
                if let Err(err) = writer
                    .write_all(line.as_bytes())
                    .and_then(|_| writer.flush())
                {
                    tracing::warn!(error = %err, "Failed to write the run log");
                }
            }
            Err(_) => tracing::warn!("Run log writer is poisoned, line dropped"),
        }
    }
}
