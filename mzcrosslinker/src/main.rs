use std::fs;
use std::io;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mzcrosslinker::{MZCrossLinker, MZCrossLinkerError};

#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn configure_log(args: &MZCrossLinker) -> io::Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer()
        .compact()
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .with_writer(io::stderr)
        .with_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        );

    let (file_layer, guard) = match args.log_file.as_ref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(fs::File::create(path)?);
            let layer = fmt::layer()
                .compact()
                .with_ansi(false)
                .with_timer(fmt::time::ChronoLocal::rfc_3339())
                .with_writer(writer)
                .with_filter(
                    EnvFilter::builder()
                        .with_default_directive(tracing::Level::INFO.into())
                        .from_env_lossy(),
                );
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
    tracing_log::LogTracer::init().ok();
    Ok(guard)
}

fn load_configuration(args: MZCrossLinker) -> Result<MZCrossLinker, MZCrossLinkerError> {
    let mut config = Figment::from(Serialized::defaults(&args)).merge(Toml::file("mzcrosslinker.toml"));
    if let Some(path) = args.config_file.as_ref() {
        config = config.merge(Toml::file_exact(path));
    }
    config = config.merge(Env::prefixed("MZCROSSLINKER_"));
    Ok(config.extract()?)
}

fn main() -> Result<(), MZCrossLinkerError> {
    let args = MZCrossLinker::parse();
    let driver = load_configuration(args)?;
    let _guard = configure_log(&driver)?;
    if let Err(e) = driver.main() {
        error!("{e}");
        return Err(e);
    }
    Ok(())
}
