//! Control module - altitude PID controller, tuning settings and diagnostic output
//!
//! - [`altitude`] - the calibrated altitude-hold PID controller.
//! - [`settings`] - validated gain/limit bundle applied to the controller.
//! - [`diagnostics`] - per-cycle diagnostic records and their sinks.

pub mod altitude;
pub mod diagnostics;
pub mod settings;

pub use altitude::AltitudeController;
pub use diagnostics::{ControlDiagnostic, DiagnosticLog, DiagnosticSink, LogSink, NullSink};
pub use settings::ControllerSettings;

/// Symmetric bound of the command the controller emits.
pub const OUTPUT_LIMIT: f32 = 100.0;
