use {
    crate::{
        LifecycleError,
        page::{self, PageConfig},
    },
    base::{Vec2, log::LevelFilter},
    clap::{Parser, ValueEnum},
    motor::{HardwareMode, HatConfig},
    std::{
        net::{IpAddr, SocketAddr},
        path::PathBuf,
        time::Duration,
    },
    video::{PixelFormat, TranscoderConfig, VideoInConfig, videoin::TestPatternConfig},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Camera {
    /// Synthetic moving gradient, no hardware needed
    TestPattern,
    /// Video4Linux capture device
    V4l2,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Drive a robot and watch its camera from a browser")]
pub struct Args {
    /// Port for the control page and command API
    #[arg(long, default_value_t = 5000)]
    pub http_port: u16,

    /// Port for the video viewer WebSocket
    #[arg(long, default_value_t = 8084)]
    pub ws_port: u16,

    /// Address both listeners bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Video width in pixels
    #[arg(long, default_value_t = 640)]
    pub width: usize,

    /// Video height in pixels
    #[arg(long, default_value_t = 480)]
    pub height: usize,

    /// Capture and encode frame rate
    #[arg(long, default_value_t = 24)]
    pub framerate: u32,

    /// Frame source
    #[arg(long, value_enum, default_value_t = Camera::TestPattern)]
    pub camera: Camera,

    /// Capture device for the v4l2 camera
    #[arg(long, default_value = "/dev/video0")]
    pub device: PathBuf,

    /// Mirror the video horizontally
    #[arg(long)]
    pub hflip: bool,

    /// Mirror the video vertically
    #[arg(long)]
    pub vflip: bool,

    /// Encoder executable (ffmpeg or avconv)
    #[arg(long, default_value = "ffmpeg")]
    pub transcoder: String,

    /// Encoder output bitrate
    #[arg(long, default_value = "800k")]
    pub bitrate: String,

    /// Motor speed for every command (0-255)
    #[arg(long, default_value_t = 75)]
    pub speed: u8,

    /// Left motor speed offset
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub left_trim: i16,

    /// Right motor speed offset
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub right_trim: i16,

    /// Motor hardware: auto, real or simulated
    #[arg(long, default_value = "auto")]
    pub hardware: HardwareMode,

    /// I2C bus of the Motor HAT
    #[arg(long, default_value_t = 1)]
    pub i2c_bus: u8,

    /// I2C address of the Motor HAT
    #[arg(long, default_value = "0x60", value_parser = parse_address)]
    pub hat_address: u16,

    /// Canvas foreground colour on the control page
    #[arg(long, default_value = page::DEFAULT_COLOR, value_parser = parse_color)]
    pub color: String,

    /// Page background colour
    #[arg(long, default_value = page::DEFAULT_BGCOLOR, value_parser = parse_color)]
    pub bgcolor: String,

    /// Directory served under /static
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Write logs to daily files in this directory instead of stdout
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<LevelFilter>,

    /// Bound on each shutdown stage, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub shutdown_timeout_ms: u64,
}

fn parse_address(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid i2c address {}: {}", s, e))
}

fn parse_color(s: &str) -> Result<String, String> {
    if page::is_css_color(s) {
        Ok(s.to_string())
    } else {
        Err(format!("invalid colour {}: expected #rgb, #rrggbb or a colour name", s))
    }
}

/// Everything `Lifecycle::start` needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub video: VideoInConfig,
    pub transcoder: TranscoderConfig,
    pub hardware: HardwareMode,
    pub hat: HatConfig,
    pub speed: u8,
    pub page: PageConfig,
    pub static_dir: PathBuf,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, LifecycleError> {
        let size = Vec2::new(args.width, args.height);
        if args.framerate == 0 {
            return Err(LifecycleError::Config("framerate must be at least 1".to_string()));
        }
        let frame_rate = args.framerate as f32;

        let video = match args.camera {
            Camera::TestPattern => VideoInConfig::TestPattern(TestPatternConfig {
                size,
                format: PixelFormat::Yu12,
                frame_rate,
            }),
            #[cfg(feature = "v4l2")]
            Camera::V4l2 => VideoInConfig::V4l2(video::videoin::V4l2Config {
                path: Some(args.device.clone()),
                size: Some(size),
                format: Some(PixelFormat::Yu12),
                frame_rate: Some(frame_rate),
            }),
            #[cfg(not(feature = "v4l2"))]
            Camera::V4l2 => {
                return Err(LifecycleError::Config(
                    "built without v4l2 support, rebuild with --features v4l2".to_string(),
                ));
            }
        };

        let transcoder = TranscoderConfig::default()
            .with_program(&args.transcoder)
            .with_bitrate(&args.bitrate)
            .with_hflip(args.hflip)
            .with_vflip(args.vflip);

        let hat = HatConfig::default()
            .with_bus(args.i2c_bus)
            .with_address(args.hat_address)
            .with_left_trim(args.left_trim)
            .with_right_trim(args.right_trim);

        Ok(Self {
            http_addr: SocketAddr::new(args.bind, args.http_port),
            ws_addr: SocketAddr::new(args.bind, args.ws_port),
            video,
            transcoder,
            hardware: args.hardware,
            hat,
            speed: args.speed,
            page: PageConfig {
                size,
                color: args.color.clone(),
                bgcolor: args.bgcolor.clone(),
                ws_port: args.ws_port,
            },
            static_dir: args.static_dir.clone(),
            shutdown_timeout: Duration::from_millis(args.shutdown_timeout_ms),
        })
    }
}
