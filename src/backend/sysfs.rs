use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::AppError;
use crate::gpio::{Direction, GpioBackend, GpioOp};

/// Longest value read back from a `value` file: a digit plus trailing newline.
const VALUE_READ_MAX: usize = 3;

/// GPIO access through the kernel's sysfs control files under `root`
/// (normally `/sys/class/gpio`).
pub struct SysfsBackend {
    root: PathBuf,
}

impl SysfsBackend {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn line_file(&self, pin: u32, attr: &str) -> PathBuf {
        self.root.join(format!("gpio{pin}")).join(attr)
    }

    fn write_control(path: &Path, payload: &[u8]) -> io::Result<()> {
        debug!("write {:?} <- {:?}", path, String::from_utf8_lossy(payload));
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.write_all(payload)
    }
}

impl GpioBackend for SysfsBackend {
    fn acquire(&self, pin: u32) -> Result<(), AppError> {
        Self::write_control(&self.root.join("export"), pin.to_string().as_bytes())
            .map_err(|e| AppError::access(GpioOp::Export, pin, e))
    }

    fn release(&self, pin: u32) -> Result<(), AppError> {
        Self::write_control(&self.root.join("unexport"), pin.to_string().as_bytes())
            .map_err(|e| AppError::access(GpioOp::Unexport, pin, e))
    }

    fn set_direction(&self, pin: u32, direction: Direction) -> Result<(), AppError> {
        Self::write_control(
            &self.line_file(pin, "direction"),
            direction.as_str().as_bytes(),
        )
        .map_err(|e| AppError::access(GpioOp::Direction, pin, e))
    }

    fn read(&self, pin: u32) -> Result<u8, AppError> {
        let read = || -> io::Result<u8> {
            let mut file = File::open(self.line_file(pin, "value"))?;
            let mut buf = [0u8; VALUE_READ_MAX];
            let n = file.read(&mut buf)?;
            parse_value(&buf[..n])
        };
        read().map_err(|e| AppError::access(GpioOp::Read, pin, e))
    }

    fn write(&self, pin: u32, value: u8) -> Result<(), AppError> {
        let write = || -> io::Result<()> {
            let payload: &[u8] = match value {
                0 => b"0",
                1 => b"1",
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("value must be 0 or 1, got {value}"),
                    ));
                }
            };
            let mut file = OpenOptions::new()
                .write(true)
                .open(self.line_file(pin, "value"))?;
            // a short write leaves the line in an unknown state
            if file.write(payload)? != payload.len() {
                return Err(io::ErrorKind::WriteZero.into());
            }
            Ok(())
        };
        write().map_err(|e| AppError::access(GpioOp::Write, pin, e))
    }
}

/// Parses the leading digit of a `value` file's contents, which must be 0 or 1.
fn parse_value(raw: &[u8]) -> io::Result<u8> {
    let text = raw.trim_ascii_start();
    let digits = text.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("no value in {:?}", String::from_utf8_lossy(raw)),
        ));
    }
    match &text[..digits] {
        b"0" => Ok(0),
        b"1" => Ok(1),
        other => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("value {:?} is not 0 or 1", String::from_utf8_lossy(other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn fake_sysfs(pins: &[u32]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("export"), "").expect("export file");
        fs::write(dir.path().join("unexport"), "").expect("unexport file");
        for pin in pins {
            let line = dir.path().join(format!("gpio{pin}"));
            fs::create_dir(&line).expect("line dir");
            fs::write(line.join("direction"), "").expect("direction file");
            fs::write(line.join("value"), "0\n").expect("value file");
        }
        dir
    }

    #[test]
    fn parse_value_accepts_trailing_newline() {
        assert_eq!(parse_value(b"1\n").unwrap(), 1);
        assert_eq!(parse_value(b"0").unwrap(), 0);
        assert_eq!(parse_value(b" 1\n").unwrap(), 1);
    }

    #[test]
    fn parse_value_rejects_garbage() {
        assert!(parse_value(b"").is_err());
        assert!(parse_value(b"\n").is_err());
        assert!(parse_value(b"x1").is_err());
        assert!(parse_value(b"999").is_err());
    }

    #[test]
    fn parse_value_rejects_non_binary_digits() {
        assert!(parse_value(b"5\n").is_err());
        assert!(parse_value(b"2").is_err());
        assert!(parse_value(b"10").is_err());
        assert!(parse_value(b"01").is_err());
    }

    #[test]
    fn garbled_value_file_is_a_read_error() {
        let dir = fake_sysfs(&[20]);
        let backend = SysfsBackend::new(dir.path());
        fs::write(dir.path().join("gpio20/value"), "5\n").unwrap();
        let err = backend.read(20).unwrap_err();
        assert!(matches!(err, AppError::Access { op: GpioOp::Read, pin: 20, .. }));
    }

    #[test]
    fn export_writes_bare_pin_number() {
        let dir = fake_sysfs(&[]);
        let backend = SysfsBackend::new(dir.path());
        backend.acquire(20).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "20");
        backend.release(20).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "20");
    }

    #[test]
    fn missing_export_file_is_an_access_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = SysfsBackend::new(dir.path());
        let err = backend.acquire(20).unwrap_err();
        assert!(matches!(
            err,
            AppError::Access {
                op: GpioOp::Export,
                pin: 20,
                ..
            }
        ));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn direction_and_value_files() {
        let dir = fake_sysfs(&[20, 21]);
        let backend = SysfsBackend::new(dir.path());

        backend.set_direction(20, Direction::Input).unwrap();
        backend.set_direction(21, Direction::Output).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio20/direction")).unwrap(), "in");
        assert_eq!(fs::read_to_string(dir.path().join("gpio21/direction")).unwrap(), "out");

        backend.write(21, 1).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("gpio21/value")).unwrap(), "1\n");

        assert_eq!(backend.read(20).unwrap(), 0);
        fs::write(dir.path().join("gpio20/value"), "1\n").unwrap();
        assert_eq!(backend.read(20).unwrap(), 1);
    }

    #[test]
    fn direction_before_export_settles_fails() {
        let dir = fake_sysfs(&[]);
        let backend = SysfsBackend::new(dir.path());
        let err = backend.set_direction(20, Direction::Input).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn write_rejects_non_binary_values() {
        let dir = fake_sysfs(&[21]);
        let backend = SysfsBackend::new(dir.path());
        let err = backend.write(21, 2).unwrap_err();
        assert!(matches!(err, AppError::Access { op: GpioOp::Write, .. }));
    }
}
