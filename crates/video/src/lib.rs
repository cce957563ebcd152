//! Video capture and transcoding.
//!
//! `VideoIn` pumps raw frames from a capture backend on a blocking worker.
//! `Transcoder` feeds those frames to an external encoder process, whose
//! output is read back in fixed-size chunks through `ChunkReader`.

mod error;
pub use error::*;

mod videoframe;
pub use videoframe::*;

pub mod videoin;
pub use videoin::{VideoIn, VideoInConfig};

pub mod transcoder;
pub use transcoder::{CHUNK_SIZE, ChunkReader, Transcoder, TranscoderConfig};
