use {
    crate::{
        Config, Controller, LifecycleError,
        page::{self, PageConfig},
        signal, stopped,
        web::{self, AppState},
    },
    base::log,
    bytes::Bytes,
    com::{Relay, RelayStats, StreamHeader, WsServer},
    motor::{CommandSink, HardwareSink, MotorError},
    std::{
        fmt,
        future::Future,
        net::SocketAddr,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::{
        net::TcpListener,
        sync::{Notify, mpsc, watch},
        task::JoinHandle,
    },
    video::{Transcoder, VideoIn},
};

/// Why the robot shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(&'static str),
    Requested,
    /// A motor command failed on real hardware.
    Fault(String),
    /// Capture, relay or HTTP server ended on its own.
    StreamEnded(String),
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::Requested => write!(f, "shutdown requested"),
            ShutdownReason::Fault(msg) => write!(f, "hardware fault: {}", msg),
            ShutdownReason::StreamEnded(msg) => write!(f, "{}", msg),
        }
    }
}

/// Shutdown steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Capture,
    Transcoder,
    Listeners,
    Hardware,
}

#[derive(Debug)]
pub struct ShutdownReport {
    pub reason: ShutdownReason,
    pub stages: Vec<Stage>,
    pub frames: u64,
    pub relay: RelayStats,
}

impl ShutdownReport {
    pub fn is_fault(&self) -> bool {
        matches!(self.reason, ShutdownReason::Fault(_))
    }

    /// Process exit status: 1 after a hardware fault, 0 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_fault() { 1 } else { 0 }
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stopped ({}): {} frames encoded, {} chunks ({} bytes) relayed, stages {:?}",
            self.reason, self.frames, self.relay.chunks, self.relay.bytes, self.stages
        )
    }
}

/// Asks a running `Lifecycle` to shut down.
#[derive(Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

struct CaptureOutput {
    video_in: VideoIn,
    transcoder: Transcoder,
}

/// The running robot.
///
/// `start` brings every component up; `run` waits for a shutdown trigger and
/// then stops capture, the transcoder and relay, both listeners, and finally
/// the motors, in that order.
pub struct Lifecycle<S = HardwareSink> {
    sink: Arc<Mutex<S>>,
    server: Arc<WsServer>,
    capture_stop: watch::Sender<bool>,
    capture_task: JoinHandle<CaptureOutput>,
    relay_task: JoinHandle<RelayStats>,
    http_stop: watch::Sender<bool>,
    http_task: JoinHandle<std::io::Result<()>>,
    http_addr: SocketAddr,
    faults: mpsc::UnboundedReceiver<MotorError>,
    ended: mpsc::UnboundedReceiver<String>,
    requested: Arc<Notify>,
    stage_timeout: Duration,
}

impl Lifecycle<HardwareSink> {
    /// Open the motors as configured and start everything else.
    pub async fn start(config: &Config) -> Result<Self, LifecycleError> {
        log::info!("initializing motors ({})", config.hardware);
        let sink = HardwareSink::open(config.hardware, &config.hat)?;
        Self::start_with_sink(config, sink).await
    }
}

impl<S: CommandSink + 'static> Lifecycle<S> {
    pub async fn start_with_sink(config: &Config, sink: S) -> Result<Self, LifecycleError> {
        let sink = Arc::new(Mutex::new(sink));

        log::info!("initializing camera");
        let video_in = VideoIn::open(config.video.clone()).await?;
        let size = video_in.size();
        let header = StreamHeader::for_size(size).ok_or_else(|| {
            LifecycleError::Config(format!("frame size {} does not fit the stream header", size))
        })?;

        log::info!("spawning background conversion process");
        let (transcoder, reader) = Transcoder::spawn(
            &config.transcoder,
            size,
            video_in.format(),
            video_in.frame_rate(),
        )?;

        log::info!("initializing viewer socket on {}", config.ws_addr);
        let greeting = Bytes::copy_from_slice(&header.to_bytes());
        let server = Arc::new(WsServer::bind(config.ws_addr, greeting).await?);

        log::info!("initializing http server on {}", config.http_addr);
        let listener = TcpListener::bind(config.http_addr)
            .await
            .map_err(LifecycleError::Http)?;
        let http_addr = listener.local_addr().map_err(LifecycleError::Http)?;

        let (fault_tx, faults) = mpsc::unbounded_channel();
        let (ended_tx, ended) = mpsc::unbounded_channel();
        let (capture_stop, capture_stop_rx) = watch::channel(false);
        let (http_stop, http_stop_rx) = watch::channel(false);

        let page = PageConfig {
            ws_port: server.local_addr().port(),
            ..config.page.clone()
        };
        let state = AppState {
            controller: Controller::new(Arc::clone(&sink), config.speed, fault_tx),
            page: page::render(&page).into(),
            shutdown: http_stop_rx.clone(),
        };
        let app = web::router(state, &config.static_dir);

        log::info!("starting broadcast");
        let relay = Relay::new(reader, Arc::clone(&server));
        let relay_ended = ended_tx.clone();
        let relay_task = tokio::spawn(async move {
            let stats = relay.run().await;
            let _ = relay_ended.send("transcoder output ended".to_string());
            stats
        });

        log::info!("starting recording");
        let capture_task = tokio::spawn(pump(video_in, transcoder, capture_stop_rx, ended_tx.clone()));

        let http_task = tokio::spawn(async move {
            let result = web::serve(listener, app, http_stop_rx).await;
            if let Err(error) = &result {
                let _ = ended_tx.send(format!("http server failed: {}", error));
            }
            result
        });

        log::info!("video stream available at http://{}", http_addr);
        Ok(Self {
            sink,
            server,
            capture_stop,
            capture_task,
            relay_task,
            http_stop,
            http_task,
            http_addr,
            faults,
            ended,
            requested: Arc::new(Notify::new()),
            stage_timeout: config.shutdown_timeout,
        })
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn ws_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: Arc::clone(&self.requested),
        }
    }

    /// Run until a termination signal, fault, stream end or handle request.
    pub async fn run(self) -> ShutdownReport {
        let signal = async {
            match signal::terminated().await {
                Ok(name) => name,
                Err(error) => {
                    log::error!("cannot install signal handlers: {}", error);
                    std::future::pending().await
                }
            }
        };
        self.run_until(signal).await
    }

    /// Like `run`, with `signal` standing in for the termination signals.
    pub async fn run_until(mut self, signal: impl Future<Output = &'static str>) -> ShutdownReport {
        let reason = tokio::select! {
            name = signal => {
                log::info!("signal {} received by process {}", name, std::process::id());
                ShutdownReason::Signal(name)
            }
            _ = self.requested.notified() => ShutdownReason::Requested,
            Some(error) = self.faults.recv() => ShutdownReason::Fault(error.to_string()),
            Some(why) = self.ended.recv() => ShutdownReason::StreamEnded(why),
        };
        self.shutdown(reason).await
    }

    async fn shutdown(self, reason: ShutdownReason) -> ShutdownReport {
        log::info!("terminating: {}", reason);
        let Self {
            sink,
            server,
            capture_stop,
            mut capture_task,
            mut relay_task,
            http_stop,
            mut http_task,
            stage_timeout,
            ..
        } = self;
        let mut stages = Vec::with_capacity(4);

        log::info!("stopping recording");
        let _ = capture_stop.send(true);
        let transcoder = match tokio::time::timeout(stage_timeout, &mut capture_task).await {
            Ok(Ok(CaptureOutput { video_in, transcoder })) => {
                video_in.close().await;
                Some(transcoder)
            }
            Ok(Err(error)) => {
                log::error!("capture task failed: {}", error);
                None
            }
            Err(_) => {
                // aborting drops the transcoder, which kills it
                log::warn!("capture did not stop within {:?}", stage_timeout);
                capture_task.abort();
                None
            }
        };
        stages.push(Stage::Capture);

        log::info!("waiting for background conversion process to exit");
        let frames = transcoder.as_ref().map_or(0, Transcoder::frames_written);
        if let Some(transcoder) = transcoder {
            if let Err(error) = transcoder.finish(stage_timeout).await {
                log::warn!("transcoder did not exit cleanly: {}", error);
            }
        }
        log::info!("waiting for broadcast to finish");
        let relay = match tokio::time::timeout(stage_timeout, &mut relay_task).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(error)) => {
                log::error!("relay task failed: {}", error);
                RelayStats::default()
            }
            Err(_) => {
                log::warn!("relay did not finish within {:?}", stage_timeout);
                relay_task.abort();
                RelayStats::default()
            }
        };
        stages.push(Stage::Transcoder);

        log::info!("shutting down http server");
        let _ = http_stop.send(true);
        match tokio::time::timeout(stage_timeout, &mut http_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(error))) => log::error!("http server failed: {}", error),
            Ok(Err(error)) => log::error!("http task failed: {}", error),
            Err(_) => {
                log::warn!("http server did not stop within {:?}", stage_timeout);
                http_task.abort();
            }
        }
        log::info!("shutting down viewer socket");
        if tokio::time::timeout(stage_timeout, server.shutdown()).await.is_err() {
            log::warn!("viewer socket did not stop within {:?}", stage_timeout);
        }
        stages.push(Stage::Listeners);

        log::info!("stopping motors");
        let stopped_motors = sink.lock().unwrap_or_else(|e| e.into_inner()).stop();
        if let Err(error) = stopped_motors {
            log::error!("stopping motors failed: {}", error);
        }
        stages.push(Stage::Hardware);

        let report = ShutdownReport {
            reason,
            stages,
            frames,
            relay,
        };
        log::info!("{}", report);
        report
    }
}

async fn pump(
    mut video_in: VideoIn,
    mut transcoder: Transcoder,
    mut stop: watch::Receiver<bool>,
    ended: mpsc::UnboundedSender<String>,
) -> CaptureOutput {
    loop {
        let frame = tokio::select! {
            _ = stopped(&mut stop) => break,
            frame = video_in.capture() => frame,
        };
        let written = match frame {
            Ok(frame) => transcoder.write(frame).await,
            Err(error) => Err(error),
        };
        if let Err(error) = written {
            log::error!("recording stopped: {}", error);
            let _ = ended.send(format!("recording stopped: {}", error));
            break;
        }
    }
    log::info!("recording stopped after {} frames", transcoder.frames_written());
    CaptureOutput { video_in, transcoder }
}
