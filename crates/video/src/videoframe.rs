use {base::Vec2, std::fmt};

/// Raw pixel layouts a capture backend can hand to the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar 4:2:0, Y plane then U then V (`yuv420p`).
    Yu12,
    /// Packed 4:2:2, Y0 U Y1 V (`yuyv422`).
    Yuyv,
}

impl PixelFormat {
    /// Name of the format on an ffmpeg/avconv command line.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Yu12 => "yuv420p",
            PixelFormat::Yuyv => "yuyv422",
        }
    }

    /// Bytes in one frame of `size`.
    pub fn frame_len(&self, size: Vec2<usize>) -> usize {
        match self {
            PixelFormat::Yu12 => size.area() + 2 * ((size.x / 2) * (size.y / 2)),
            PixelFormat::Yuyv => size.area() * 2,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

impl std::str::FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yuv420p" | "yu12" => Ok(PixelFormat::Yu12),
            "yuyv422" | "yuyv" => Ok(PixelFormat::Yuyv),
            _ => Err(format!("unsupported pixel format: {}", s)),
        }
    }
}

/// One raw frame. Ownership moves into the transcoder on write.
#[derive(Clone)]
pub struct VideoFrame {
    pub size: Vec2<usize>,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("size", &self.size)
            .field("format", &self.format)
            .field("len", &self.data.len())
            .finish()
    }
}

impl VideoFrame {
    /// True when `data` holds exactly one frame of `size` in `format`.
    pub fn is_complete(&self) -> bool {
        self.data.len() == self.format.frame_len(self.size)
    }
}
