//! Combines a silent video and a narration track with ffmpeg.
//!
//! Merging is best-effort: every failure comes back as
//! [`MergeOutcome::MergeFailed`] carrying the reason and the unmerged video,
//! so callers choose between accepting the fallback and
//! [`MergeOutcome::into_result`].

use crate::error::{GenReelError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const STDERR_TAIL_CHARS: usize = 2000;

/// Why a merge did not produce an output file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeFailure {
    /// The merge program is not on PATH or not executable.
    #[error("merge tool {0} not found")]
    ToolNotFound(String),

    /// An input file does not exist.
    #[error("input file {} does not exist", .0.display())]
    MissingInput(PathBuf),

    /// The process could not be started.
    #[error("failed to start merge tool: {0}")]
    Spawn(String),

    /// The process exited unsuccessfully.
    #[error("merge tool exited with {}: {stderr}", describe_exit(.code))]
    Exit {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Tail of the tool's stderr.
        stderr: String,
    },
}

/// Result of a merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a merge may have fallen back to the unmerged video"]
pub enum MergeOutcome {
    /// The combined file was written to this path.
    Merged(PathBuf),
    /// Merging failed; `fallback` is the original video.
    MergeFailed {
        /// What went wrong.
        reason: MergeFailure,
        /// The unmerged video path.
        fallback: PathBuf,
    },
}

impl MergeOutcome {
    /// The merged output, or the fallback video.
    pub fn path(&self) -> &Path {
        match self {
            Self::Merged(path) => path,
            Self::MergeFailed { fallback, .. } => fallback,
        }
    }

    /// Whether the merge succeeded.
    pub fn is_merged(&self) -> bool {
        matches!(self, Self::Merged(_))
    }

    /// Converts a fallback into [`GenReelError::Merge`].
    pub fn into_result(self) -> Result<PathBuf> {
        match self {
            Self::Merged(path) => Ok(path),
            Self::MergeFailed { reason, .. } => Err(GenReelError::Merge(reason.to_string())),
        }
    }
}

/// Runs the external merge tool.
#[derive(Debug, Clone)]
pub struct MediaMerger {
    program: PathBuf,
}

impl Default for MediaMerger {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaMerger {
    /// Uses `program` (a name looked up on PATH, or a path).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The configured program.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Muxes `video`'s picture with `audio`'s sound into `output`.
    ///
    /// The video stream is copied, audio is transcoded to AAC, and the result
    /// is cut to the shorter input. `output` is overwritten.
    pub async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> MergeOutcome {
        match self.run(video, audio, output).await {
            Ok(()) => {
                tracing::debug!(output = %output.display(), "merged audio into video");
                MergeOutcome::Merged(output.to_path_buf())
            }
            Err(reason) => {
                tracing::warn!(
                    video = %video.display(),
                    audio = %audio.display(),
                    %reason,
                    "merge failed, falling back to unmerged video"
                );
                MergeOutcome::MergeFailed {
                    reason,
                    fallback: video.to_path_buf(),
                }
            }
        }
    }

    async fn run(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> std::result::Result<(), MergeFailure> {
        for input in [video, audio] {
            if !input.exists() {
                return Err(MergeFailure::MissingInput(input.to_path_buf()));
            }
        }

        let program = which::which(&self.program)
            .map_err(|_| MergeFailure::ToolNotFound(self.program.display().to_string()))?;

        let args = merge_args(video, audio, output);
        tracing::debug!("Running merge: {} {}", program.display(), args.join(" "));

        let result = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MergeFailure::Spawn(e.to_string()))?;

        if result.status.success() {
            Ok(())
        } else {
            Err(MergeFailure::Exit {
                code: result.status.code(),
                stderr: stderr_tail(&result.stderr),
            })
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "signal".to_string(),
    }
}

fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    args.push("-i".to_string());
    args.push(video.to_string_lossy().to_string());
    args.push("-i".to_string());
    args.push(audio.to_string_lossy().to_string());
    args.extend(
        ["-c:v", "copy", "-c:a", "aac", "-map", "0:v:0", "-map", "1:a:0", "-shortest"]
            .map(String::from),
    );
    args.push(output.to_string_lossy().to_string());
    args
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return text.to_string();
    }
    let tail: String = text.chars().skip(count - STDERR_TAIL_CHARS).collect();
    format!("...{tail}")
}
