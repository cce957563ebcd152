#![allow(dead_code)]

use {
    motor::{CommandSink, MotorError},
    std::sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

/// A sink that records every call and fails on demand.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub calls: Arc<Mutex<Vec<(&'static str, Option<u8>)>>>,
    pub failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    pub fn calls(&self) -> Vec<(&'static str, Option<u8>)> {
        self.calls.lock().expect("poisoned").clone()
    }

    fn record(&self, name: &'static str, speed: Option<u8>) -> Result<(), MotorError> {
        self.calls.lock().expect("poisoned").push((name, speed));
        if self.failing.load(Ordering::SeqCst) {
            return Err(MotorError::I2c(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "hat unplugged",
            )));
        }
        Ok(())
    }
}

impl CommandSink for RecordingSink {
    fn forward(&mut self, speed: u8) -> Result<(), MotorError> {
        self.record("forward", Some(speed))
    }

    fn backward(&mut self, speed: u8) -> Result<(), MotorError> {
        self.record("backward", Some(speed))
    }

    fn left(&mut self, speed: u8) -> Result<(), MotorError> {
        self.record("left", Some(speed))
    }

    fn right(&mut self, speed: u8) -> Result<(), MotorError> {
        self.record("right", Some(speed))
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        self.record("stop", None)
    }
}
