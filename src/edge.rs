//! Software rising-edge detection over sampled line values.

pub const INACTIVE: u8 = 0;
pub const ACTIVE: u8 = 1;

/// True exactly when the line went from inactive to active between two samples.
pub fn detect(previous: u8, current: u8) -> bool {
    previous == INACTIVE && current == ACTIVE
}

/// The toggled "light" bit plus the last sample it was derived from.
///
/// `previous` starts out active, so a line that already reads active on the
/// first sample does not count as an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    previous: u8,
    light: u8,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            previous: ACTIVE,
            light: 0,
        }
    }
}

impl LightState {
    pub fn light(&self) -> u8 {
        self.light
    }

    pub fn previous(&self) -> u8 {
        self.previous
    }

    /// Feeds one sample. Returns the new light value when the sample completes a rising edge.
    pub fn sample(&mut self, current: u8) -> Option<u8> {
        let edge = detect(self.previous, current);
        self.previous = current;
        if edge {
            self.light = 1 - self.light;
            Some(self.light)
        } else {
            None
        }
    }
}
