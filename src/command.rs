//! Remote commands coming in from the network collaborator.
//!
//! Payloads are typed. They deserialize from a `kind`-tagged map (the shape the
//! transport layer hands over) or parse from a plain text line such as
//! `TARGET 5.0` or `FORWARD`, the verbs the mobile controller sends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lateral speed used by the FORWARD / BACKWARD drive verbs.
pub const MANUAL_DRIVE_SPEED: i32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RemoteCommand {
    SetTarget { value: f32 },
    SetGains { kp: f32, ki: f32, kd: f32 },
    Enable,
    Disable,
    /// Re-capture the reference altitude from the latest sample.
    Calibrate,
    /// Hand the motors to the operator.
    Manual { lift: i32, lateral1: i32, lateral2: i32 },
    /// Give the motors back to the altitude controller.
    Auto,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{verb}' expects {expected} argument(s)")]
    Arity { verb: String, expected: usize },
    #[error("invalid number '{0}'")]
    Number(String),
}

impl RemoteCommand {
    pub fn forward() -> Self {
        RemoteCommand::Manual {
            lift: 0,
            lateral1: MANUAL_DRIVE_SPEED,
            lateral2: MANUAL_DRIVE_SPEED,
        }
    }

    pub fn backward() -> Self {
        RemoteCommand::Manual {
            lift: 0,
            lateral1: -MANUAL_DRIVE_SPEED,
            lateral2: -MANUAL_DRIVE_SPEED,
        }
    }

    pub fn stop() -> Self {
        RemoteCommand::Manual {
            lift: 0,
            lateral1: 0,
            lateral2: 0,
        }
    }
}

impl FromStr for RemoteCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or(ParseCommandError::Empty)?.to_ascii_uppercase();
        let args: Vec<&str> = parts.collect();

        let expect = |n: usize| -> Result<(), ParseCommandError> {
            if args.len() == n {
                Ok(())
            } else {
                Err(ParseCommandError::Arity {
                    verb: verb.clone(),
                    expected: n,
                })
            }
        };

        let cmd = match verb.as_str() {
            "TARGET" | "SET_TARGET" => {
                expect(1)?;
                RemoteCommand::SetTarget {
                    value: number(args[0])?,
                }
            }
            "GAINS" | "SET_GAINS" => {
                expect(3)?;
                RemoteCommand::SetGains {
                    kp: number(args[0])?,
                    ki: number(args[1])?,
                    kd: number(args[2])?,
                }
            }
            "MANUAL" => {
                expect(3)?;
                RemoteCommand::Manual {
                    lift: number::<i32>(args[0])?,
                    lateral1: number::<i32>(args[1])?,
                    lateral2: number::<i32>(args[2])?,
                }
            }
            "ENABLE" => {
                expect(0)?;
                RemoteCommand::Enable
            }
            "DISABLE" => {
                expect(0)?;
                RemoteCommand::Disable
            }
            "CALIBRATE" => {
                expect(0)?;
                RemoteCommand::Calibrate
            }
            "AUTO" => {
                expect(0)?;
                RemoteCommand::Auto
            }
            "FORWARD" => {
                expect(0)?;
                RemoteCommand::forward()
            }
            "BACKWARD" => {
                expect(0)?;
                RemoteCommand::backward()
            }
            "STOP" => {
                expect(0)?;
                RemoteCommand::stop()
            }
            _ => return Err(ParseCommandError::Unknown(verb.clone())),
        };
        Ok(cmd)
    }
}

fn number<N: FromStr>(s: &str) -> Result<N, ParseCommandError> {
    s.parse().map_err(|_| ParseCommandError::Number(s.to_string()))
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::SetTarget { value } => write!(f, "TARGET {value}"),
            RemoteCommand::SetGains { kp, ki, kd } => write!(f, "GAINS {kp} {ki} {kd}"),
            RemoteCommand::Enable => write!(f, "ENABLE"),
            RemoteCommand::Disable => write!(f, "DISABLE"),
            RemoteCommand::Calibrate => write!(f, "CALIBRATE"),
            RemoteCommand::Manual {
                lift,
                lateral1,
                lateral2,
            } => write!(f, "MANUAL {lift} {lateral1} {lateral2}"),
            RemoteCommand::Auto => write!(f, "AUTO"),
        }
    }
}
