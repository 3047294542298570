use std::collections::VecDeque;
use std::io;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::AppError;
use crate::gpio::{Direction, GpioBackend, GpioOp};

/// In-memory GPIO lines with scripted input samples and injectable failures.
#[derive(Default)]
pub struct MockGpioBackend {
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    lines: FxHashMap<u32, MockLine>, // keyed by pin
    failures: FxHashSet<(GpioOp, u32)>,
    calls: Vec<(GpioOp, u32)>,
}

#[derive(Default)]
struct MockLine {
    exported: bool,
    direction: Option<Direction>,
    value: u8,
    samples: VecDeque<u8>,
}

impl MockGpioBackend {
    /// Queues values returned by successive reads of `pin`. Once drained,
    /// reads keep returning the last value.
    pub fn push_samples<I: IntoIterator<Item = u8>>(&self, pin: u32, samples: I) {
        let mut state = self.state.lock();
        state.lines.entry(pin).or_default().samples.extend(samples);
    }

    /// Makes every later `op` on `pin` fail with a permission error.
    pub fn fail(&self, op: GpioOp, pin: u32) {
        self.state.lock().failures.insert((op, pin));
    }

    /// Clears a failure injected with [`fail`](Self::fail).
    pub fn recover(&self, op: GpioOp, pin: u32) {
        self.state.lock().failures.remove(&(op, pin));
    }

    pub fn value(&self, pin: u32) -> Option<u8> {
        self.state.lock().lines.get(&pin).map(|line| line.value)
    }

    pub fn is_exported(&self, pin: u32) -> bool {
        self.state
            .lock()
            .lines
            .get(&pin)
            .is_some_and(|line| line.exported)
    }

    pub fn direction(&self, pin: u32) -> Option<Direction> {
        self.state.lock().lines.get(&pin).and_then(|line| line.direction)
    }

    /// Every attempted operation in call order, failed ones included.
    pub fn calls(&self) -> Vec<(GpioOp, u32)> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, op: GpioOp, pin: u32) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| **call == (op, pin))
            .count()
    }

    fn with_line<T>(
        &self,
        op: GpioOp,
        pin: u32,
        f: impl FnOnce(&mut MockLine) -> io::Result<T>,
    ) -> Result<T, AppError> {
        let mut state = self.state.lock();
        state.calls.push((op, pin));
        if state.failures.contains(&(op, pin)) {
            return Err(AppError::access(
                op,
                pin,
                io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
            ));
        }
        let line = state.lines.entry(pin).or_default();
        f(line).map_err(|e| AppError::access(op, pin, e))
    }
}

fn not_found(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, msg)
}

impl GpioBackend for MockGpioBackend {
    fn acquire(&self, pin: u32) -> Result<(), AppError> {
        self.with_line(GpioOp::Export, pin, |line| {
            if line.exported {
                return Err(io::Error::new(io::ErrorKind::ResourceBusy, "already exported"));
            }
            line.exported = true;
            Ok(())
        })
    }

    fn release(&self, pin: u32) -> Result<(), AppError> {
        self.with_line(GpioOp::Unexport, pin, |line| {
            if !line.exported {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "not exported"));
            }
            line.exported = false;
            line.direction = None;
            Ok(())
        })
    }

    fn set_direction(&self, pin: u32, direction: Direction) -> Result<(), AppError> {
        self.with_line(GpioOp::Direction, pin, |line| {
            if !line.exported {
                return Err(not_found("line not exported"));
            }
            line.direction = Some(direction);
            Ok(())
        })
    }

    fn read(&self, pin: u32) -> Result<u8, AppError> {
        self.with_line(GpioOp::Read, pin, |line| {
            if line.direction != Some(Direction::Input) {
                return Err(not_found("line not configured as input"));
            }
            if let Some(sample) = line.samples.pop_front() {
                line.value = sample;
            }
            Ok(line.value)
        })
    }

    fn write(&self, pin: u32, value: u8) -> Result<(), AppError> {
        self.with_line(GpioOp::Write, pin, |line| {
            if line.direction != Some(Direction::Output) {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "line not configured as output",
                ));
            }
            if value > 1 {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "value must be 0 or 1"));
            }
            line.value = value;
            Ok(())
        })
    }
}
