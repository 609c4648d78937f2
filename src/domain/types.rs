//! Shared domain enumerations aligned with the wire protocol.

use serde::{Deserialize, Serialize};

/// Publication workflow state of a content item. Serialized in PascalCase
/// to stay compatible with existing clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Draft,
    Pending,
    Rejected,
    Approved,
    Published,
    Archived,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Draft => "Draft",
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Rejected => "Rejected",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Published => "Published",
            ApprovalStatus::Archived => "Archived",
        }
    }
}

impl TryFrom<&str> for ApprovalStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Draft" => Ok(ApprovalStatus::Draft),
            "Pending" => Ok(ApprovalStatus::Pending),
            "Rejected" => Ok(ApprovalStatus::Rejected),
            "Approved" => Ok(ApprovalStatus::Approved),
            "Published" => Ok(ApprovalStatus::Published),
            "Archived" => Ok(ApprovalStatus::Archived),
            _ => Err(()),
        }
    }
}

/// Presentation category of a content item, derived from its media URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Audio,
    Video,
    Text,
}

impl MediaKind {
    /// `.mp3` is audio, `.mp4` is video, anything else renders as text.
    /// The suffix check ignores case.
    pub fn from_uri(uri: &str) -> Self {
        let lowered = uri.to_ascii_lowercase();
        if lowered.ends_with(".mp3") {
            MediaKind::Audio
        } else if lowered.ends_with(".mp4") {
            MediaKind::Video
        } else {
            MediaKind::Text
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Audio => "Audio",
            MediaKind::Video => "Video",
            MediaKind::Text => "Text",
        }
    }
}
