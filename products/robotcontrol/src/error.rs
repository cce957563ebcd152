use {com::ComError, motor::MotorError, std::fmt, video::VideoError};

#[derive(Debug)]
pub enum LifecycleError {
    Config(String),
    Motor(MotorError),
    Video(VideoError),
    Com(ComError),
    Http(std::io::Error),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Config(msg) => write!(f, "config error: {msg}"),
            LifecycleError::Motor(err) => write!(f, "motor error: {err}"),
            LifecycleError::Video(err) => write!(f, "video error: {err}"),
            LifecycleError::Com(err) => write!(f, "viewer server error: {err}"),
            LifecycleError::Http(err) => write!(f, "http server error: {err}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

impl From<MotorError> for LifecycleError {
    fn from(err: MotorError) -> Self {
        LifecycleError::Motor(err)
    }
}

impl From<VideoError> for LifecycleError {
    fn from(err: VideoError) -> Self {
        LifecycleError::Video(err)
    }
}

impl From<ComError> for LifecycleError {
    fn from(err: ComError) -> Self {
        LifecycleError::Com(err)
    }
}
