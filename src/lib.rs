pub mod backend;
pub mod config;
pub mod edge;
pub mod error;
pub mod gpio;
pub mod notify;
pub mod orchestrator;

pub use backend::{MockGpioBackend, SysfsBackend};
pub use config::{AppConfig, GpioConfig, ListenConfig};
pub use edge::{LightState, detect};
pub use error::{AppError, SocketStage};
pub use gpio::{Direction, GpioBackend, GpioOp, InputLine, Lines, OutputLine};
pub use notify::{NotificationChannel, encode_toggle, parse_toggle, send_toggle};
pub use orchestrator::{Orchestrator, Phase};
