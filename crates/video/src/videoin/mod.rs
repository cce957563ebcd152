use {
    crate::*,
    base::{Vec2, log},
    std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    tokio::{
        sync::{mpsc, oneshot},
        task::{JoinHandle, spawn_blocking},
    },
};

// capacity of the video input channel
const CHANNEL_CAPACITY: usize = 4;

// delay before reconnecting after failure
const WAIT_BEFORE_RECONNECT_MS: u64 = 100;

pub mod testpattern;
pub use testpattern::TestPatternConfig;

#[cfg(feature = "v4l2")]
pub mod v4l2;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Config;

#[derive(Debug, Clone)]
pub enum VideoInConfig {
    TestPattern(TestPatternConfig),
    #[cfg(feature = "v4l2")]
    V4l2(V4l2Config),
}

pub(crate) trait VideoInDevice: Send {
    fn open(&mut self, config: &VideoInConfig) -> Result<VideoInConfig, VideoError>; // open the device, return config that was actually set
    fn close(&mut self); // close the device, if open
    fn blocking_capture(&mut self) -> Result<VideoFrame, VideoError>; // capture a frame
}

/// A running frame source.
///
/// The device is opened and read on a blocking worker thread; frames come out
/// of `capture()` in order. `close()` stops the worker and waits for it.
pub struct VideoIn {
    receiver: mpsc::Receiver<VideoFrame>,
    cancel: Arc<AtomicBool>,
    size: Vec2<usize>,
    format: PixelFormat,
    frame_rate: f32,
    join_handle: Option<JoinHandle<()>>,
}

impl VideoIn {
    fn create_device(config: &VideoInConfig) -> Box<dyn VideoInDevice> {
        match config {
            VideoInConfig::TestPattern(_) => Box::new(testpattern::TestPattern::new()),
            #[cfg(feature = "v4l2")]
            VideoInConfig::V4l2(_) => Box::new(v4l2::V4l2::new()),
        }
    }

    async fn spawn_worker(
        sender: mpsc::Sender<VideoFrame>,
        config: VideoInConfig,
        cancel: Arc<AtomicBool>,
    ) -> Result<(JoinHandle<()>, VideoInConfig), VideoError> {
        let mut device = Self::create_device(&config);

        // device.open() runs on the worker thread, the resolved config comes back here
        let (init_tx, init_rx) = oneshot::channel::<Result<VideoInConfig, VideoError>>();

        let join_handle = spawn_blocking(move || {
            let mut config = match device.open(&config) {
                Ok(config) => {
                    let _ = init_tx.send(Ok(config.clone()));
                    config
                }
                Err(e) => {
                    let _ = init_tx.send(Err(e));
                    return;
                }
            };

            while !cancel.load(Ordering::Relaxed) {
                log::info!("video worker: starting capture loop");
                while !cancel.load(Ordering::Relaxed) {
                    match device.blocking_capture() {
                        Ok(frame) => {
                            if sender.blocking_send(frame).is_err() {
                                log::debug!("video worker: receiver closed");
                                device.close();
                                return;
                            }
                        }
                        Err(e) => {
                            log::error!("video worker: capture failed: {}", e);
                            break;
                        }
                    }
                }

                // close, wait, and reopen the device
                while !cancel.load(Ordering::Relaxed) {
                    log::info!("video worker: reconnecting...");
                    device.close();
                    std::thread::sleep(std::time::Duration::from_millis(WAIT_BEFORE_RECONNECT_MS));
                    if let Ok(new_config) = device.open(&config) {
                        config = new_config;
                        break;
                    }
                }
            }
            device.close();
            log::info!("video worker: stopped");
        });

        let config = init_rx
            .await
            .map_err(|_| VideoError::Device("Worker thread died during init".to_string()))??;

        Ok((join_handle, config))
    }

    fn decode_config(config: &VideoInConfig) -> Result<(Vec2<usize>, PixelFormat, f32), VideoError> {
        match config {
            VideoInConfig::TestPattern(config) => Ok((config.size, config.format, config.frame_rate)),
            #[cfg(feature = "v4l2")]
            VideoInConfig::V4l2(config) => match (config.size, config.format, config.frame_rate) {
                (Some(size), Some(format), Some(frame_rate)) => Ok((size, format, frame_rate)),
                _ => Err(VideoError::Device("device did not report its format".to_string())),
            },
        }
    }

    /// Open the device described by `config` and start capturing.
    pub async fn open(config: VideoInConfig) -> Result<Self, VideoError> {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));
        let (join_handle, config) = Self::spawn_worker(sender, config, Arc::clone(&cancel)).await?;
        let (size, format, frame_rate) = Self::decode_config(&config)?;
        log::info!("video input open: {} {} @ {} fps", size, format, frame_rate);
        Ok(Self {
            receiver,
            cancel,
            size,
            format,
            frame_rate,
            join_handle: Some(join_handle),
        })
    }

    pub fn size(&self) -> Vec2<usize> {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Wait for the next frame.
    pub async fn capture(&mut self) -> Result<VideoFrame, VideoError> {
        match self.receiver.recv().await {
            Some(frame) => Ok(frame),
            None => Err(VideoError::Channel("Video input channel closed".to_string())),
        }
    }

    /// Stop capturing, close the device and wait for the worker to exit.
    pub async fn close(mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        // wakes a worker blocked on a full channel
        self.receiver.close();
        if let Some(join_handle) = self.join_handle.take() {
            if let Err(error) = join_handle.await {
                log::error!("video worker panicked: {}", error);
            }
        }
    }
}

impl Drop for VideoIn {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.receiver.close();
    }
}
