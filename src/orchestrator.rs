use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::time::sleep;

use crate::config::AppConfig;
use crate::edge::LightState;
use crate::error::AppError;
use crate::gpio::{GpioBackend, Lines};
use crate::notify::NotificationChannel;

/// Pause between two samples of the input line.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    AwaitingClient,
    Polling,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Initializing => "initializing",
            Phase::AwaitingClient => "awaiting client",
            Phase::Polling => "polling",
        })
    }
}

/// Owns both GPIO lines and the single client slot for the life of the service.
///
/// Constructing one through [`Orchestrator::start`] completes the
/// initializing phase, so an `Orchestrator` is always either awaiting its
/// client or polling.
pub struct Orchestrator<B: GpioBackend> {
    lines: Lines<B>,
    channel: NotificationChannel,
    state: LightState,
}

impl<B: GpioBackend> Orchestrator<B> {
    pub async fn start(backend: Arc<B>, config: &AppConfig) -> Result<Self, AppError> {
        info!("Phase: {}", Phase::Initializing);
        let lines = Lines::initialize(backend, &config.gpio).await?;
        let channel = NotificationChannel::bind(config.listen.socket_addr(), config.listen.backlog)?;

        let orchestrator = Self {
            lines,
            channel,
            state: LightState::default(),
        };
        info!(
            "Phase: {}, listening on {}",
            orchestrator.phase(),
            orchestrator.local_addr()?
        );
        Ok(orchestrator)
    }

    pub fn phase(&self) -> Phase {
        if self.channel.is_connected() {
            Phase::Polling
        } else {
            Phase::AwaitingClient
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        self.channel.local_addr()
    }

    pub fn light(&self) -> u8 {
        self.state.light()
    }

    /// Waits for the one client this service will ever accept.
    pub async fn accept_client(&mut self) -> Result<SocketAddr, AppError> {
        let peer = self.channel.accept().await?;
        info!("Phase: {}", self.phase());
        Ok(peer)
    }

    /// One sample-detect-notify cycle. Returns the new light value if an edge was seen.
    ///
    /// A failed read skips the cycle and leaves the previous sample untouched.
    /// A failed send ends the service since the client cannot come back.
    pub async fn poll_once(&mut self) -> Result<Option<u8>, AppError> {
        let current = match self.lines.input.read() {
            Ok(value) => value,
            Err(e) => {
                warn!("{e}, skipping poll");
                return Ok(None);
            }
        };

        let Some(light) = self.state.sample(current) else {
            return Ok(None);
        };
        self.channel.send_toggle(light).await?;
        info!("msg = {light}");
        Ok(Some(light))
    }

    /// Accepts the client, then polls until `shutdown` resolves or the client
    /// is lost. GPIO lines are released on every way out.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let outcome = self.serve(shutdown.as_mut()).await;
        let released = self.lines.release();
        match (&outcome, &released) {
            (Err(_), Err(e)) => warn!("{e}"),
            (_, Ok(())) => info!("GPIO lines released"),
            _ => {}
        }
        outcome.and(released)
    }

    /// Releases the GPIO lines without serving.
    pub fn shutdown(self) -> Result<(), AppError> {
        self.lines.release()
    }

    async fn serve<F>(&mut self, mut shutdown: Pin<&mut F>) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            accepted = self.accept_client() => { accepted?; }
            _ = shutdown.as_mut() => {
                info!("Shutdown requested while awaiting client");
                return Ok(());
            }
        }

        loop {
            self.poll_once().await?;
            tokio::select! {
                _ = sleep(POLL_INTERVAL) => {}
                _ = shutdown.as_mut() => {
                    info!("Shutdown requested, light was {}", self.state.light());
                    return Ok(());
                }
            }
        }
    }
}
