use std::fmt;

#[derive(Debug)]
pub enum MotorError {
    I2c(std::io::Error),
    Config(String),
}

impl fmt::Display for MotorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorError::I2c(err) => write!(f, "i2c error: {err}"),
            MotorError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for MotorError {}

impl From<std::io::Error> for MotorError {
    fn from(err: std::io::Error) -> Self {
        MotorError::I2c(err)
    }
}
