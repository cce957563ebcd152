//! Drive a two-wheeled robot from a web page while watching its camera.
//!
//! `Lifecycle` wires the pieces together: a `HardwareSink` for the motors, a
//! `VideoIn` feeding an MPEG-1 `Transcoder`, a `Relay` broadcasting the
//! encoded stream on a viewer WebSocket, and an HTTP server with the control
//! page, the form API and a JSON command socket.

use tokio::sync::watch;

mod error;
pub use error::LifecycleError;

pub mod config;
pub use config::{Args, Camera, Config};

pub mod control;
pub use control::{Controller, FaultSender};

pub mod lifecycle;
pub use lifecycle::{Lifecycle, ShutdownHandle, ShutdownReason, ShutdownReport, Stage};

pub mod page;
pub mod signal;
pub mod web;

/// Resolve once `stop` is true, or once its sender is gone.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}
