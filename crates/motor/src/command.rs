use std::fmt;

/// A movement command from the control page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::Stop,
    ];

    /// Parse the single-letter form token (`f`, `b`, `l`, `r`, `s`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "f" => Some(Command::Forward),
            "b" => Some(Command::Backward),
            "l" => Some(Command::Left),
            "r" => Some(Command::Right),
            "s" => Some(Command::Stop),
            _ => None,
        }
    }

    /// Parse the socket message name (`Forward`, `Backward`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }

    pub fn token(&self) -> &'static str {
        match self {
            Command::Forward => "f",
            Command::Backward => "b",
            Command::Left => "l",
            Command::Right => "r",
            Command::Stop => "s",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Forward => "Forward",
            Command::Backward => "Backward",
            Command::Left => "Left",
            Command::Right => "Right",
            Command::Stop => "Stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
