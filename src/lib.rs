#![warn(missing_docs)]
//! GenReel - short narrated videos from a single Gemini API key.
//!
//! This crate wraps the Gemini Developer API for text, image, speech and
//! Veo video generation, waits on long-running video jobs with a bounded
//! poller, and muxes narration into the finished clip with ffmpeg.
//!
//! # Quick Start
//!
//! ```no_run
//! use genreel::{AgentConfig, VideoAgent, VideoRequest};
//!
//! #[tokio::main]
//! async fn main() -> genreel::Result<()> {
//!     let agent = VideoAgent::new(AgentConfig::from_env()?);
//!     let clip = agent
//!         .generate_video(&VideoRequest::new("A lighthouse in a storm"), "storm.mp4")
//!         .await?;
//!     println!("{:?}", clip.path());
//!     Ok(())
//! }
//! ```
//!
//! # Extending a clip
//!
//! ```no_run
//! use genreel::{VideoAgent, VideoSource};
//!
//! # async fn run(agent: VideoAgent) -> genreel::Result<()> {
//! let first = agent
//!     .generate_video(&genreel::VideoRequest::new("A fox crosses a meadow"), "part1.mp4")
//!     .await?;
//! let source = VideoSource::from_artifact(&first)?;
//! agent
//!     .extend_video(source, "The fox disappears into the forest", "part2.mp4")
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `genreel` command-line tool

pub mod agent;
pub mod artifact;
mod client;
pub mod config;
pub mod error;
pub mod image;
pub mod merge;
pub mod poll;
pub mod speech;
pub mod text;
pub mod video;

// Re-export error types at crate root
pub use error::{GenReelError, Result};

pub use agent::VideoAgent;
pub use artifact::{ArtifactLocation, MediaArtifact, MediaKind};
pub use config::{AgentConfig, AgentConfigBuilder};
pub use image::{AspectRatio, GeneratedImage, ImageFormat, ImageGenerator, ImageRequest};
pub use merge::{MediaMerger, MergeFailure, MergeOutcome};
pub use poll::{Clock, JobPoller, PendingJob, PollPolicy, TokioClock};
pub use speech::{GeneratedAudio, SpeechSynthesizer};
pub use text::TextGenerator;
pub use video::{GeneratedVideo, ImageInput, VeoClient, VideoRequest, VideoSource};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::agent::VideoAgent;
    pub use crate::config::AgentConfig;
    pub use crate::error::{GenReelError, Result};
    pub use crate::image::{AspectRatio, ImageRequest};
    pub use crate::merge::MergeOutcome;
    pub use crate::video::{VideoRequest, VideoSource};
}
