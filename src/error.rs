use std::fmt;
use std::io;

use thiserror::Error;

use crate::gpio::GpioOp;

/// Exit status used for command line and config file problems.
pub const EXIT_USAGE: u8 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStage {
    Socket,
    Bind,
    Listen,
    Accept,
    Send,
}

impl fmt::Display for SocketStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SocketStage::Socket => "socket",
            SocketStage::Bind => "bind",
            SocketStage::Listen => "listen",
            SocketStage::Accept => "accept",
            SocketStage::Send => "send",
        })
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to {op} gpio{pin}: {source}")]
    Access {
        op: GpioOp,
        pin: u32,
        #[source]
        source: io::Error,
    },
    #[error("{stage}() error: {source}")]
    Transport {
        stage: SocketStage,
        #[source]
        source: io::Error,
    },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn access(op: GpioOp, pin: u32, source: io::Error) -> Self {
        AppError::Access { op, pin, source }
    }

    pub fn transport(stage: SocketStage, source: io::Error) -> Self {
        AppError::Transport { stage, source }
    }

    /// Process exit status for this error when it ends the service.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Access { op, .. } => match op {
                GpioOp::Export => 1,
                GpioOp::Direction => 2,
                GpioOp::Write => 3,
                GpioOp::Unexport => 4,
                GpioOp::Read => 1,
            },
            AppError::Transport { .. } => 1,
            AppError::Config(_) => EXIT_USAGE,
        }
    }
}
