pub mod actuator;
pub mod clock;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod sensor;
pub mod tasks;

pub use clock::{ControlClock, ControlClockMock};
pub use command::RemoteCommand;
pub use config::{load_config, ConfigBuffer, RuntimeConfig};
pub use control::{AltitudeController, ControllerSettings};
pub use error::{ConfigError, ControlError, HubError};
pub use hub::{HubSettings, MotorCommand, MotorLimits, SensorSnapshot, SharedStateHub};
pub use tasks::{TaskContext, TaskStats};
