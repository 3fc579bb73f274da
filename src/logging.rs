use anyhow::Context;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

use crate::config::LoggingConfig;

const LOG_FILE_NAME: &str = "archfind";
const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const LOG_ROTATE_KEEP_FILES: usize = 5;

/// Start file logging with size rotation, mirroring warnings to stderr.
/// The returned handle must outlive all logging.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggerHandle> {
    std::fs::create_dir_all(&config.dir)
        .with_context(|| format!("failed creating log dir {}", config.dir.display()))?;

    let handle = Logger::try_with_str(&config.level)
        .with_context(|| format!("invalid log level {:?}", config.level))?
        .log_to_file(
            FileSpec::default()
                .directory(&config.dir)
                .basename(LOG_FILE_NAME),
        )
        .rotate(
            Criterion::Size(LOG_ROTATE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(LOG_ROTATE_KEEP_FILES),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .format(flexi_logger::detailed_format)
        .start()
        .context("failed to start logger")?;

    log::info!("archfind {} starting", env!("CARGO_PKG_VERSION"));
    Ok(handle)
}
