use base::Vec2;

/// Magic bytes the jsmpeg player expects at the start of a stream.
pub const MAGIC: [u8; 4] = *b"jsmp";

/// First message every viewer receives: magic, then width and height as big-endian u16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    pub width: u16,
    pub height: u16,
}

impl StreamHeader {
    pub const LEN: usize = 8;

    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Header for a frame size; `None` if a dimension does not fit in 16 bits.
    pub fn for_size(size: Vec2<usize>) -> Option<Self> {
        Some(Self {
            width: u16::try_from(size.x).ok()?,
            height: u16::try_from(size.y).ok()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut bytes = [0u8; Self::LEN];
        bytes[..4].copy_from_slice(&MAGIC);
        bytes[4..6].copy_from_slice(&self.width.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.height.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN || bytes[..4] != MAGIC {
            return None;
        }
        Some(Self {
            width: u16::from_be_bytes([bytes[4], bytes[5]]),
            height: u16::from_be_bytes([bytes[6], bytes[7]]),
        })
    }
}
