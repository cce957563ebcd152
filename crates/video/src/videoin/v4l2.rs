use {
    crate::{videoin::VideoInDevice, *},
    base::{Vec2, log},
    std::path::PathBuf,
    v4l::{
        Device, Format, FourCC, buffer::Type, io::mmap::Stream as MmapStream,
        io::traits::CaptureStream, video::Capture,
    },
};

// number of mmap buffers queued with the driver
const BUFFER_COUNT: u32 = 4;

#[derive(Debug, Clone, Default)]
pub struct V4l2Config {
    pub path: Option<PathBuf>,
    pub size: Option<Vec2<usize>>,
    pub format: Option<PixelFormat>,
    pub frame_rate: Option<f32>,
}

pub(crate) struct V4l2 {
    stream: Option<MmapStream<'static>>,
    size: Vec2<usize>,
    format: PixelFormat,
}

impl V4l2 {
    pub fn new() -> Self {
        Self {
            stream: None,
            size: Vec2::new(0, 0),
            format: PixelFormat::Yuyv,
        }
    }
}

fn fourcc_for(format: PixelFormat) -> FourCC {
    match format {
        PixelFormat::Yuyv => FourCC::new(b"YUYV"),
        PixelFormat::Yu12 => FourCC::new(b"YU12"),
    }
}

impl VideoInDevice for V4l2 {
    fn open(&mut self, config: &VideoInConfig) -> Result<VideoInConfig, VideoError> {
        self.stream.take();

        let VideoInConfig::V4l2(config) = config else {
            return Err(VideoError::Device(
                "V4l2::open should be called with VideoInConfig::V4l2".to_string(),
            ));
        };

        let device = match &config.path {
            Some(path) => Device::with_path(path)?,
            None => Device::new(0)?,
        };
        let device_format = Capture::format(&device)?;

        let desired_size = config
            .size
            .unwrap_or(Vec2::new(device_format.width as usize, device_format.height as usize));
        let desired_fourcc = fourcc_for(config.format.unwrap_or(PixelFormat::Yuyv));

        let actual_format = Capture::set_format(
            &device,
            &Format::new(desired_size.x as u32, desired_size.y as u32, desired_fourcc),
        )?;

        self.size = Vec2::new(actual_format.width as usize, actual_format.height as usize);
        self.format = match &actual_format.fourcc.repr {
            b"YUYV" => PixelFormat::Yuyv,
            b"YU12" => PixelFormat::Yu12,
            _ => {
                // the transcoder is fed raw frames, so compressed formats are out
                return Err(VideoError::Device(format!(
                    "Unsupported pixel format: {}",
                    actual_format.fourcc
                )));
            }
        };
        if self.size != desired_size {
            log::warn!("v4l2: asked for {}, device gave {}", desired_size, self.size);
        }

        let desired_frame_rate = match config.frame_rate {
            Some(frame_rate) => frame_rate,
            None => {
                let params = Capture::params(&device)?;
                params.interval.denominator as f32 / params.interval.numerator as f32
            }
        };
        let actual_params = Capture::set_params(
            &device,
            &v4l::video::capture::Parameters::with_fps(desired_frame_rate as u32),
        )?;
        let frame_rate =
            actual_params.interval.denominator as f32 / actual_params.interval.numerator as f32;

        self.stream = match MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT) {
            Ok(stream) => Some(stream),
            Err(error) => {
                return Err(VideoError::Stream(error.to_string()));
            }
        };

        Ok(VideoInConfig::V4l2(V4l2Config {
            path: config.path.clone(),
            size: Some(self.size),
            format: Some(self.format),
            frame_rate: Some(frame_rate),
        }))
    }

    fn close(&mut self) {
        self.stream.take();
    }

    fn blocking_capture(&mut self) -> Result<VideoFrame, VideoError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(VideoError::Stream("No stream".to_string()));
        };
        let (frame_data, _metadata) =
            CaptureStream::next(stream).map_err(|error| VideoError::Stream(error.to_string()))?;

        let frame = VideoFrame {
            size: self.size,
            format: self.format,
            data: frame_data.to_vec(),
        };
        if !frame.is_complete() {
            return Err(VideoError::Stream(format!(
                "short frame: {} bytes, expected {}",
                frame.data.len(),
                self.format.frame_len(self.size)
            )));
        }
        Ok(frame)
    }
}
