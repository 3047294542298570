pub mod mock;
pub mod sysfs;

pub use mock::MockGpioBackend;
pub use sysfs::SysfsBackend;
