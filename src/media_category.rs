/// Media classification by file extension.
///
/// Every file the scanner sees lands in exactly one [`MediaCategory`]. The
/// lookup is a fixed, case-insensitive table keyed by the dotted extension
/// (`".mp4"`); anything not in the table is [`MediaCategory::Other`].
///
/// # Examples
///
/// ```
/// use dataflux::media_category::{classify, MediaCategory};
///
/// assert_eq!(classify(".mp4"), MediaCategory::Video);
/// assert_eq!(classify(".WAV"), MediaCategory::Audio);
/// assert_eq!(classify(".xyz"), MediaCategory::Other);
/// ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A coarse media category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    /// Video files (MP4, MOV, MKV, etc.)
    Video,
    /// Audio files (WAV, MP3, FLAC, etc.)
    Audio,
    /// Image files, including camera RAW formats
    Image,
    /// Documents, spreadsheets and presentations
    Document,
    /// 3D models and scenes (GLB, FBX, OBJ, etc.)
    #[serde(alias = "3d")]
    ThreeD,
    /// Unknown or uncategorized files
    Other,
}

const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".mov", ".m4v", ".avi", ".mkv", ".webm", ".mts", ".flv", ".wmv", ".mxf",
];
const AUDIO_EXTENSIONS: &[&str] = &[
    ".wav", ".aiff", ".aif", ".mp3", ".flac", ".m4a", ".aac", ".ogg", ".wma", ".opus",
];
const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".tif", ".tiff", ".bmp", ".heic", ".webp", ".svg", ".raw",
    ".dng", ".cr2", ".nef",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx", ".txt", ".md", ".rtf", ".csv",
    ".odt",
];
const THREE_D_EXTENSIONS: &[&str] = &[
    ".glb", ".gltf", ".fbx", ".obj", ".stl", ".ply", ".usdz", ".dae", ".3ds", ".blend",
];

impl MediaCategory {
    /// All categories in table order, `Other` last.
    pub const ALL: [MediaCategory; 6] = [
        MediaCategory::Video,
        MediaCategory::Audio,
        MediaCategory::Image,
        MediaCategory::Document,
        MediaCategory::ThreeD,
        MediaCategory::Other,
    ];

    /// Returns the name used in rule documents, templates and directory names.
    ///
    /// ```
    /// use dataflux::media_category::MediaCategory;
    ///
    /// assert_eq!(MediaCategory::Video.as_str(), "video");
    /// assert_eq!(MediaCategory::ThreeD.as_str(), "three_d");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Image => "image",
            MediaCategory::Document => "document",
            MediaCategory::ThreeD => "three_d",
            MediaCategory::Other => "other",
        }
    }

    /// Returns a human-readable description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            MediaCategory::Video => "Video files",
            MediaCategory::Audio => "Audio files",
            MediaCategory::Image => "Image files",
            MediaCategory::Document => "Document files",
            MediaCategory::ThreeD => "3D model files",
            MediaCategory::Other => "Other files",
        }
    }

    /// The dotted extensions mapped to this category. Empty for `Other`.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaCategory::Video => VIDEO_EXTENSIONS,
            MediaCategory::Audio => AUDIO_EXTENSIONS,
            MediaCategory::Image => IMAGE_EXTENSIONS,
            MediaCategory::Document => DOCUMENT_EXTENSIONS,
            MediaCategory::ThreeD => THREE_D_EXTENSIONS,
            MediaCategory::Other => &[],
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a dotted extension (`".mp4"`) to its category.
///
/// The comparison is case-insensitive. Unmapped or empty extensions yield
/// [`MediaCategory::Other`].
pub fn classify(extension: &str) -> MediaCategory {
    let ext = extension.to_lowercase();
    MediaCategory::ALL
        .into_iter()
        .find(|category| category.extensions().contains(&ext.as_str()))
        .unwrap_or(MediaCategory::Other)
}

/// Returns the lower-cased extension of `path` including its leading dot,
/// or an empty string when the file name has none.
///
/// ```
/// use dataflux::media_category::dotted_extension;
/// use std::path::Path;
///
/// assert_eq!(dotted_extension(Path::new("clip.MP4")), ".mp4");
/// assert_eq!(dotted_extension(Path::new("archive.tar.gz")), ".gz");
/// assert_eq!(dotted_extension(Path::new("README")), "");
/// ```
pub fn dotted_extension(path: &Path) -> String {
    match path.extension().map(|e| e.to_string_lossy()) {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => String::new(),
    }
}

/// Classifies a path by its extension.
pub fn classify_path(path: &Path) -> MediaCategory {
    classify(&dotted_extension(path))
}
