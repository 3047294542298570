use log::{info, warn};
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use gpiolight::config::parse_port_arg;
use gpiolight::{AppConfig, AppError, Orchestrator};

#[cfg(not(feature = "hardware-gpio"))]
use gpiolight::MockGpioBackend;
#[cfg(feature = "hardware-gpio")]
use gpiolight::SysfsBackend;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), AppError> {
    let args: Vec<String> = std::env::args().collect();
    let port = parse_port_arg(&args)?;
    let config = AppConfig::load_from_env()?.with_port(port);

    let backend = {
        #[cfg(feature = "hardware-gpio")]
        {
            Arc::new(SysfsBackend::new(config.gpio.sysfs_root.clone()))
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            warn!("Built without hardware-gpio, using mock GPIO lines");
            Arc::new(MockGpioBackend::default())
        }
    };

    let orchestrator = Orchestrator::start(backend, &config).await?;
    orchestrator.run(shutdown_signal()).await?;

    info!("Stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM. A signal that cannot be registered never fires.
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = fire_on_ok("SIGINT", tokio::signal::ctrl_c()) => {}
        _ = terminate => {}
    }
}

/// Completes when `signal` reports delivery; a registration error waits forever.
async fn fire_on_ok<F>(name: &str, signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Cannot listen for {name}: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn delivered_signal_fires() {
        let fired = tokio::time::timeout(
            Duration::from_millis(100),
            fire_on_ok("SIGINT", async { Ok(()) }),
        )
        .await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn failed_registration_never_fires() {
        let fired = tokio::time::timeout(
            Duration::from_millis(100),
            fire_on_ok("SIGINT", async {
                Err(std::io::Error::other("no signal support"))
            }),
        )
        .await;
        assert!(fired.is_err());
    }
}
