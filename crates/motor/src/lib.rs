//! Motor control for a two-wheeled robot.
//!
//! Commands arrive as `Command` values and are executed by a `CommandSink`.
//! `HardwareSink` is the sink the robot runs with: either the Adafruit Motor
//! HAT over I2C, or a simulated sink that accepts everything.

pub mod command;
pub mod error;
pub mod hat;
pub mod i2c;
pub mod sink;

pub use command::Command;
pub use error::MotorError;
pub use hat::{Direction, HatConfig, MotorHat, Pca9685};
pub use i2c::{I2cBus, LinuxI2c};
pub use sink::{CommandSink, HardwareMode, HardwareSink};
