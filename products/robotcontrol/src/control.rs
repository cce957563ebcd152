use {
    base::log,
    motor::{Command, CommandSink, MotorError},
    std::sync::{Arc, Mutex},
    tokio::sync::mpsc,
};

/// Where failed hardware commands are reported.
pub type FaultSender = mpsc::UnboundedSender<MotorError>;

/// Turns command values from the page into sink calls.
///
/// Unrecognized values are ignored. A sink failure is logged and sent to the
/// fault channel; callers are acknowledged either way.
pub struct Controller<S> {
    sink: Arc<Mutex<S>>,
    speed: u8,
    faults: FaultSender,
}

impl<S> Clone for Controller<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            speed: self.speed,
            faults: self.faults.clone(),
        }
    }
}

impl<S: CommandSink> Controller<S> {
    pub fn new(sink: Arc<Mutex<S>>, speed: u8, faults: FaultSender) -> Self {
        Self { sink, speed, faults }
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Handle a form token (`f`, `b`, `l`, `r`, `s`).
    pub fn handle_token(&self, token: &str) -> Option<Command> {
        let command = Command::from_token(token);
        if command.is_none() {
            log::debug!("ignoring control token {:?}", token);
        }
        self.dispatch(command)
    }

    /// Handle a socket command name (`Forward`, `Backward`, ...).
    pub fn handle_name(&self, name: &str) -> Option<Command> {
        let command = Command::from_name(name);
        if command.is_none() {
            log::debug!("ignoring control name {:?}", name);
        }
        self.dispatch(command)
    }

    fn dispatch(&self, command: Option<Command>) -> Option<Command> {
        let command = command?;
        let result = {
            let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
            sink.execute(command, self.speed)
        };
        match result {
            Ok(()) => log::info!("robot {}", command.name().to_lowercase()),
            Err(error) => {
                log::error!("robot {} failed: {}", command.name().to_lowercase(), error);
                if self.faults.send(error).is_err() {
                    log::warn!("fault channel closed, dropping hardware fault");
                }
            }
        }
        Some(command)
    }
}
