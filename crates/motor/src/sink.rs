use {
    crate::{Command, Direction, HatConfig, I2cBus, LinuxI2c, MotorError, MotorHat},
    base::log,
    std::{fmt, str::FromStr},
};

/// Anything that can move the robot.
pub trait CommandSink: Send {
    fn forward(&mut self, speed: u8) -> Result<(), MotorError>;
    fn backward(&mut self, speed: u8) -> Result<(), MotorError>;
    fn left(&mut self, speed: u8) -> Result<(), MotorError>;
    fn right(&mut self, speed: u8) -> Result<(), MotorError>;
    fn stop(&mut self) -> Result<(), MotorError>;

    /// Run the one sink operation matching `command`.
    fn execute(&mut self, command: Command, speed: u8) -> Result<(), MotorError> {
        match command {
            Command::Forward => self.forward(speed),
            Command::Backward => self.backward(speed),
            Command::Left => self.left(speed),
            Command::Right => self.right(speed),
            Command::Stop => self.stop(),
        }
    }
}

/// How the hardware sink is chosen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    /// Use the Motor HAT when it opens, otherwise simulate.
    Auto,
    Real,
    Simulated,
}

impl fmt::Display for HardwareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareMode::Auto => write!(f, "auto"),
            HardwareMode::Real => write!(f, "real"),
            HardwareMode::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for HardwareMode {
    type Err = MotorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(HardwareMode::Auto),
            "real" => Ok(HardwareMode::Real),
            "simulated" | "sim" => Ok(HardwareMode::Simulated),
            _ => Err(MotorError::Config(format!("unknown hardware mode: {}", s))),
        }
    }
}

/// The robot's motors: a real Motor HAT, or a simulation that accepts every command.
///
/// `Real` reports every hardware failure as a `MotorError`; `Simulated` never fails.
pub enum HardwareSink<B = LinuxI2c> {
    Real(MotorHat<B>),
    Simulated,
}

impl HardwareSink<LinuxI2c> {
    pub fn open(mode: HardwareMode, config: &HatConfig) -> Result<Self, MotorError> {
        match mode {
            HardwareMode::Simulated => {
                log::info!("using simulated motors");
                Ok(HardwareSink::Simulated)
            }
            HardwareMode::Real => Ok(HardwareSink::Real(MotorHat::open(config)?)),
            HardwareMode::Auto => match MotorHat::open(config) {
                Ok(hat) => Ok(HardwareSink::Real(hat)),
                Err(error) => {
                    log::warn!("no robot available ({}), using simulated motors", error);
                    Ok(HardwareSink::Simulated)
                }
            },
        }
    }
}

impl<B> HardwareSink<B> {
    pub fn is_real(&self) -> bool {
        matches!(self, HardwareSink::Real(_))
    }
}

impl<B: I2cBus> CommandSink for HardwareSink<B> {
    fn forward(&mut self, speed: u8) -> Result<(), MotorError> {
        match self {
            HardwareSink::Real(hat) => hat.drive(speed, Direction::Forward, Direction::Forward),
            HardwareSink::Simulated => Ok(()),
        }
    }

    fn backward(&mut self, speed: u8) -> Result<(), MotorError> {
        match self {
            HardwareSink::Real(hat) => hat.drive(speed, Direction::Backward, Direction::Backward),
            HardwareSink::Simulated => Ok(()),
        }
    }

    fn left(&mut self, speed: u8) -> Result<(), MotorError> {
        match self {
            HardwareSink::Real(hat) => hat.drive(speed, Direction::Backward, Direction::Forward),
            HardwareSink::Simulated => Ok(()),
        }
    }

    fn right(&mut self, speed: u8) -> Result<(), MotorError> {
        match self {
            HardwareSink::Real(hat) => hat.drive(speed, Direction::Forward, Direction::Backward),
            HardwareSink::Simulated => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        match self {
            HardwareSink::Real(hat) => hat.release(),
            HardwareSink::Simulated => Ok(()),
        }
    }
}
