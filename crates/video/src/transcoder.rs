//! External encoder process.
//!
//! Raw frames go in on the encoder's stdin, MPEG-1 comes out on its stdout.
//! The two ends are split: `Transcoder` owns the process and its input,
//! `ChunkReader` owns the output so a separate task can drain it.

use {
    crate::*,
    base::{Vec2, log},
    bytes::{Bytes, BytesMut},
    std::{process::{ExitStatus, Stdio}, time::Duration},
    tokio::{
        io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
        process::{Child, ChildStdin, ChildStdout, Command},
    },
};

/// Bytes per chunk read from the encoder output.
pub const CHUNK_SIZE: usize = 512;

/// How to launch the encoder.
#[derive(Clone, Debug)]
pub struct TranscoderConfig {
    program: String,
    bitrate: String,
    hflip: bool,
    vflip: bool,
    custom_args: Option<Vec<String>>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            bitrate: "800k".to_string(),
            hflip: false,
            vflip: false,
            custom_args: None,
        }
    }
}

impl TranscoderConfig {
    /// Run `program` with exactly `args` instead of the MPEG-1 encoder command line.
    pub fn custom(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            custom_args: Some(args),
            ..Default::default()
        }
    }

    /// Encoder executable, `ffmpeg` or `avconv`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Output bitrate, in the encoder's notation (e.g. "800k").
    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = bitrate.into();
        self
    }

    /// Mirror the picture horizontally.
    pub fn with_hflip(mut self, hflip: bool) -> Self {
        self.hflip = hflip;
        self
    }

    /// Mirror the picture vertically.
    pub fn with_vflip(mut self, vflip: bool) -> Self {
        self.vflip = vflip;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command line arguments for a raw input of `size`, `format` and `frame_rate`.
    pub fn args(&self, size: Vec2<usize>, format: PixelFormat, frame_rate: f32) -> Vec<String> {
        if let Some(args) = &self.custom_args {
            return args.clone();
        }

        let rate = format!("{:.1}", frame_rate);
        let mut args: Vec<String> = [
            "-f",
            "rawvideo",
            "-pix_fmt",
            format.ffmpeg_name(),
            "-s",
            &size.to_string(),
            "-r",
            &rate,
            "-i",
            "-",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let filters: Vec<&str> = [(self.hflip, "hflip"), (self.vflip, "vflip")]
            .into_iter()
            .filter_map(|(on, filter)| on.then_some(filter))
            .collect();
        if !filters.is_empty() {
            args.push("-vf".to_string());
            args.push(filters.join(","));
        }

        args.extend(
            ["-f", "mpeg1video", "-b:v", &self.bitrate, "-r", &rate, "-"]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }
}

/// The encoder process and its input pipe.
///
/// Dropping a `Transcoder` without calling `finish()` kills the process.
pub struct Transcoder {
    child: Child,
    stdin: Option<ChildStdin>,
    frame_len: usize,
    frames_written: u64,
}

impl Transcoder {
    /// Start the encoder for frames of `size`/`format` at `frame_rate`.
    ///
    /// Returns the process handle and the reader for its output.
    pub fn spawn(
        config: &TranscoderConfig,
        size: Vec2<usize>,
        format: PixelFormat,
        frame_rate: f32,
    ) -> Result<(Self, ChunkReader), VideoError> {
        let args = config.args(size, format, frame_rate);
        log::info!("spawning transcoder: {} {}", config.program(), args.join(" "));

        let mut child = Command::new(config.program())
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| VideoError::Spawn(format!("{}: {}", config.program(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VideoError::Spawn("transcoder stdin not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VideoError::Spawn("transcoder stdout not piped".to_string()))?;

        log::info!("transcoder running (pid {:?})", child.id());
        Ok((
            Self {
                child,
                stdin: Some(stdin),
                frame_len: format.frame_len(size),
                frames_written: 0,
            },
            ChunkReader::new(stdout),
        ))
    }

    /// Hand one raw frame to the encoder.
    pub async fn write(&mut self, frame: VideoFrame) -> Result<(), VideoError> {
        if frame.data.len() != self.frame_len {
            return Err(VideoError::Stream(format!(
                "frame is {} bytes, transcoder expects {}",
                frame.data.len(),
                self.frame_len
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VideoError::Stream("transcoder input closed".to_string()))?;
        stdin.write_all(&frame.data).await?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Close the input and wait up to `timeout` for the encoder to exit.
    ///
    /// The output must still be drained while this waits. On timeout the
    /// process is killed and `VideoError::Timeout` returned.
    pub async fn finish(mut self, timeout: Duration) -> Result<ExitStatus, VideoError> {
        if let Some(mut stdin) = self.stdin.take() {
            // a dead encoder may already have closed its end
            if let Err(error) = stdin.shutdown().await {
                log::debug!("transcoder stdin shutdown: {}", error);
            }
        }

        log::info!("waiting for transcoder to exit");
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                log::info!("transcoder exited: {}", status);
                Ok(status)
            }
            Err(_) => {
                log::warn!("transcoder still running after {:?}, killing it", timeout);
                self.child.kill().await?;
                Err(VideoError::Timeout)
            }
        }
    }
}

/// The encoder output, read in chunks of `CHUNK_SIZE` bytes.
pub struct ChunkReader<R = ChildStdout> {
    reader: R,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read the next chunk.
    ///
    /// Every chunk is full except possibly the last one; `None` means the
    /// output ended.
    pub async fn read_chunk(&mut self) -> Result<Option<Bytes>, VideoError> {
        let mut buffer = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.reader.read(&mut buffer[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buffer.truncate(filled);
        Ok(Some(buffer.freeze()))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
