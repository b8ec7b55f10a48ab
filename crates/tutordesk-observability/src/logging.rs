use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tutordesk_config::{LogFormat, LoggingConfig};

/// Installs the global tracing subscriber.
///
/// - **Filter**: `RUST_LOG` when set, otherwise `LOG_LEVEL` for tutordesk
///   crates with noisy dependencies held at `warn`
/// - **Console**: compact or JSON, per `LOG_FORMAT`
/// - **File**: JSON lines in a daily rolling file under `LOG_DIR`, if set
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process. Fails if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "tutordesk={},sqlx=warn,redis=warn",
            config.level
        ))
    });

    let console_layer = match config.format {
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    };

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "tutordesk.json");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_current_span(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        format = ?config.format,
        file_logging = config.directory.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            format: LogFormat::Json,
            ..LoggingConfig::default()
        };
        let guard = init_tracing(&config).unwrap();
        assert!(guard.is_none());

        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("tracing subscriber"));
    }
}
