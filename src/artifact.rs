//! Media artifacts: generated content held in memory or on disk.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a [`MediaArtifact`] contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A still image.
    Image,
    /// Narration or other sound.
    Audio,
    /// A video clip.
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Where the artifact's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
    /// Bytes held by the process.
    Memory(Vec<u8>),
    /// A file on local storage.
    Disk(PathBuf),
}

/// Binary media produced by a generation call or a download step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaArtifact {
    /// Image, audio or video.
    pub kind: MediaKind,
    /// MIME type of the content (e.g. "video/mp4").
    pub mime_type: String,
    location: ArtifactLocation,
    remote_uri: Option<String>,
}

impl MediaArtifact {
    /// Wraps bytes held in memory.
    pub fn in_memory(kind: MediaKind, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind,
            mime_type: mime_type.into(),
            location: ArtifactLocation::Memory(data),
            remote_uri: None,
        }
    }

    /// Refers to a file already written to disk.
    pub fn on_disk(
        kind: MediaKind,
        mime_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            mime_type: mime_type.into(),
            location: ArtifactLocation::Disk(path.into()),
            remote_uri: None,
        }
    }

    /// Records the URI the service knows this artifact by.
    pub fn with_remote_uri(mut self, uri: impl Into<String>) -> Self {
        self.remote_uri = Some(uri.into());
        self
    }

    /// Storage location.
    pub fn location(&self) -> &ArtifactLocation {
        &self.location
    }

    /// Path on disk, if the artifact has been persisted.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            ArtifactLocation::Disk(path) => Some(path),
            ArtifactLocation::Memory(_) => None,
        }
    }

    /// Remote URI, for artifacts the service can reference again (video extension).
    pub fn remote_uri(&self) -> Option<&str> {
        self.remote_uri.as_deref()
    }

    /// Returns the content, reading it from disk when necessary.
    pub fn bytes(&self) -> Result<Vec<u8>> {
        match &self.location {
            ArtifactLocation::Memory(data) => Ok(data.clone()),
            ArtifactLocation::Disk(path) => Ok(std::fs::read(path)?),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> Result<u64> {
        match &self.location {
            ArtifactLocation::Memory(data) => Ok(data.len() as u64),
            ArtifactLocation::Disk(path) => Ok(std::fs::metadata(path)?.len()),
        }
    }

    /// Writes the content to `path` and returns the on-disk artifact.
    pub fn persist(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match &self.location {
            ArtifactLocation::Memory(data) => std::fs::write(path, data)?,
            ArtifactLocation::Disk(existing) if existing != path => {
                std::fs::copy(existing, path)?;
            }
            ArtifactLocation::Disk(_) => {}
        }
        Ok(Self {
            location: ArtifactLocation::Disk(path.to_path_buf()),
            ..self
        })
    }
}
