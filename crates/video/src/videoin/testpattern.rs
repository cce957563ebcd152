use {
    crate::{videoin::VideoInDevice, *},
    base::Vec2,
    std::time::{Duration, Instant},
};

/// Synthetic camera: a scrolling luma gradient at a fixed frame rate.
///
/// Used when no camera is attached and in tests.
#[derive(Debug, Clone)]
pub struct TestPatternConfig {
    pub size: Vec2<usize>,
    pub format: PixelFormat,
    pub frame_rate: f32,
}

impl Default for TestPatternConfig {
    fn default() -> Self {
        Self {
            size: Vec2::new(640, 480),
            format: PixelFormat::Yu12,
            frame_rate: 24.0,
        }
    }
}

pub(crate) struct TestPattern {
    config: Option<TestPatternConfig>,
    interval: Duration,
    next_deadline: Instant,
    frame_index: usize,
}

impl TestPattern {
    pub fn new() -> Self {
        Self {
            config: None,
            interval: Duration::ZERO,
            next_deadline: Instant::now(),
            frame_index: 0,
        }
    }
}

impl VideoInDevice for TestPattern {
    fn open(&mut self, config: &VideoInConfig) -> Result<VideoInConfig, VideoError> {
        #[allow(irrefutable_let_patterns)]
        let VideoInConfig::TestPattern(config) = config else {
            return Err(VideoError::Device(
                "TestPattern::open should be called with VideoInConfig::TestPattern".to_string(),
            ));
        };

        if config.size.x == 0 || config.size.y == 0 || config.size.x % 2 != 0 || config.size.y % 2 != 0 {
            return Err(VideoError::Device(format!(
                "test pattern size must be even and non-zero, got {}",
                config.size
            )));
        }
        if !(config.frame_rate > 0.0) {
            return Err(VideoError::Device(format!(
                "invalid frame rate: {}",
                config.frame_rate
            )));
        }

        self.interval = Duration::from_secs_f32(1.0 / config.frame_rate);
        self.next_deadline = Instant::now();
        self.config = Some(config.clone());
        Ok(VideoInConfig::TestPattern(config.clone()))
    }

    fn close(&mut self) {
        self.config = None;
    }

    fn blocking_capture(&mut self) -> Result<VideoFrame, VideoError> {
        let Some(config) = &self.config else {
            return Err(VideoError::Stream("No stream".to_string()));
        };

        let now = Instant::now();
        if self.next_deadline > now {
            std::thread::sleep(self.next_deadline - now);
        }
        self.next_deadline += self.interval;

        let data = render(config.size, config.format, self.frame_index);
        self.frame_index = self.frame_index.wrapping_add(1);
        Ok(VideoFrame {
            size: config.size,
            format: config.format,
            data,
        })
    }
}

fn render(size: Vec2<usize>, format: PixelFormat, frame_index: usize) -> Vec<u8> {
    let luma = |x: usize, y: usize| ((x + y + frame_index * 4) & 0xFF) as u8;
    let mut data = Vec::with_capacity(format.frame_len(size));
    match format {
        PixelFormat::Yu12 => {
            for y in 0..size.y {
                for x in 0..size.x {
                    data.push(luma(x, y));
                }
            }
            // neutral chroma
            data.resize(format.frame_len(size), 128);
        }
        PixelFormat::Yuyv => {
            for y in 0..size.y {
                for x in (0..size.x).step_by(2) {
                    data.extend_from_slice(&[luma(x, y), 128, luma(x + 1, y), 128]);
                }
            }
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_yu12_layout() {
        let data = render(Vec2::new(4, 2), PixelFormat::Yu12, 0);
        assert_eq!(data.len(), 12);
        assert_eq!(&data[..4], &[0, 1, 2, 3]);
        assert_eq!(&data[4..8], &[1, 2, 3, 4]);
        assert!(data[8..].iter().all(|&c| c == 128));
    }

    #[test]
    fn test_render_yuyv_layout() {
        let data = render(Vec2::new(2, 1), PixelFormat::Yuyv, 1);
        assert_eq!(data, vec![4, 128, 5, 128]);
    }
}
