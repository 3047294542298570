use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::GpioConfig;
use crate::error::AppError;

/// Time the platform needs after an export before the line's control files appear.
pub const GPIO_SETTLE_DELAY: Duration = Duration::from_millis(40);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "in",
            Direction::Output => "out",
        }
    }
}

/// Control-file operations, used to tag access failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpioOp {
    Export,
    Unexport,
    Direction,
    Read,
    Write,
}

impl fmt::Display for GpioOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GpioOp::Export => "export",
            GpioOp::Unexport => "unexport",
            GpioOp::Direction => "set direction of",
            GpioOp::Read => "read value of",
            GpioOp::Write => "write value of",
        })
    }
}

pub trait GpioBackend: Send + Sync {
    fn acquire(&self, pin: u32) -> Result<(), AppError>;
    fn release(&self, pin: u32) -> Result<(), AppError>;
    fn set_direction(&self, pin: u32, direction: Direction) -> Result<(), AppError>;
    fn read(&self, pin: u32) -> Result<u8, AppError>;
    fn write(&self, pin: u32, value: u8) -> Result<(), AppError>;
}

/// An exported line. Unexported on drop unless released explicitly; an
/// output line is driven low first.
pub struct ExportedLine<B: GpioBackend> {
    backend: Arc<B>,
    pin: u32,
    armed: bool,
    output: bool,
}

impl<B: GpioBackend> ExportedLine<B> {
    pub fn acquire(backend: Arc<B>, pin: u32) -> Result<Self, AppError> {
        backend.acquire(pin)?;
        debug!("exported gpio{pin}");
        Ok(Self {
            backend,
            pin,
            armed: true,
            output: false,
        })
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Configures the line as an input. The line is released if this fails.
    pub fn into_input(self) -> Result<InputLine<B>, AppError> {
        self.backend.set_direction(self.pin, Direction::Input)?;
        Ok(InputLine(self))
    }

    /// Configures the line as an output. The line is released if this fails.
    pub fn into_output(mut self) -> Result<OutputLine<B>, AppError> {
        self.backend.set_direction(self.pin, Direction::Output)?;
        self.output = true;
        Ok(OutputLine(self))
    }

    pub fn release(mut self) -> Result<(), AppError> {
        self.armed = false;
        self.backend.release(self.pin)?;
        debug!("unexported gpio{}", self.pin);
        Ok(())
    }
}

impl<B: GpioBackend> Drop for ExportedLine<B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.output
            && let Err(e) = self.backend.write(self.pin, 0)
        {
            warn!("{e}");
        }
        if let Err(e) = self.backend.release(self.pin) {
            warn!("{e}");
        }
    }
}

pub struct InputLine<B: GpioBackend>(ExportedLine<B>);

impl<B: GpioBackend> InputLine<B> {
    pub fn pin(&self) -> u32 {
        self.0.pin
    }

    pub fn read(&self) -> Result<u8, AppError> {
        self.0.backend.read(self.0.pin)
    }

    pub fn release(self) -> Result<(), AppError> {
        self.0.release()
    }
}

pub struct OutputLine<B: GpioBackend>(ExportedLine<B>);

impl<B: GpioBackend> OutputLine<B> {
    pub fn pin(&self) -> u32 {
        self.0.pin
    }

    pub fn write(&self, value: u8) -> Result<(), AppError> {
        self.0.backend.write(self.0.pin, value)
    }

    pub fn release(self) -> Result<(), AppError> {
        self.0.release()
    }
}

/// The two lines the service owns: the monitored input and the "running" indicator.
pub struct Lines<B: GpioBackend> {
    pub input: InputLine<B>,
    pub output: OutputLine<B>,
}

impl<B: GpioBackend> Lines<B> {
    /// Exports both lines, waits for the platform to settle, configures
    /// directions and drives the output high. Lines exported before a
    /// failure are released again.
    pub async fn initialize(backend: Arc<B>, config: &GpioConfig) -> Result<Self, AppError> {
        let input = ExportedLine::acquire(backend.clone(), config.input_pin)?;
        let output = ExportedLine::acquire(backend, config.output_pin)?;

        tokio::time::sleep(GPIO_SETTLE_DELAY).await;

        let input = input.into_input()?;
        let output = output.into_output()?;
        output.write(1)?;

        info!(
            "gpio{} configured as input, gpio{} driven high",
            input.pin(),
            output.pin()
        );
        Ok(Self { input, output })
    }

    /// Drives the output low and unexports both lines, reporting the first failure.
    pub fn release(self) -> Result<(), AppError> {
        if let Err(e) = self.output.write(0) {
            warn!("{e}");
        }
        let input = self.input.release();
        let output = self.output.release();
        input.and(output)
    }
}
