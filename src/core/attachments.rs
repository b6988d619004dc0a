//! Attachments for explanation requests
//!
//! Turns user-supplied files into base64 payloads tagged with a media kind
//! and MIME type. Batch and per-file limits are enforced here, before
//! anything reaches the session client.

use super::errors::{format_size, AttachmentError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// MIME type of recorded voice notes
pub const VOICE_NOTE_MIME: &str = "audio/webm";
pub const VOICE_NOTE_FILENAME: &str = "voice_note.webm";

/// Limits applied when files are attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentConfig {
    /// Maximum file size in bytes (default: 10MB)
    pub max_attachment_size: u64,
    /// Maximum number of attachments per message (default: 5)
    pub max_attachments: usize,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_attachment_size: 10 * 1024 * 1024,
            max_attachments: 5,
        }
    }
}

impl From<&crate::config::AttachmentsConfig> for AttachmentConfig {
    fn from(config: &crate::config::AttachmentsConfig) -> Self {
        Self {
            max_attachment_size: config.max_file_size_bytes,
            max_attachments: config.max_files,
        }
    }
}

impl AttachmentConfig {
    /// Reject a file whose size is over the per-file limit
    pub fn check_size(&self, name: &str, size: u64) -> Result<(), AttachmentError> {
        if size > self.max_attachment_size {
            return Err(AttachmentError::FileTooLarge {
                name: name.to_string(),
                size,
                max: self.max_attachment_size,
            });
        }
        Ok(())
    }
}

/// What kind of artifact an attachment is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Document,
    Audio,
}

impl MediaKind {
    /// `image/*` is an image, the voice-note format is audio, anything else
    /// is treated as a document.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime == VOICE_NOTE_MIME {
            MediaKind::Audio
        } else {
            MediaKind::Document
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            MediaKind::Image => "📷",
            MediaKind::Document => "📄",
            MediaKind::Audio => "🎤",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
        }
    }
}

/// Display-only information about an image attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePreview {
    pub width: u32,
    pub height: u32,
}

/// An encoded artifact attached to a user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub id: Uuid,
    pub filename: String,
    pub media_kind: MediaKind,
    /// Source-reported content type, sent alongside the payload
    pub mime_type: String,
    /// Base64 payload
    pub encoded_data: String,
    /// Size of the original bytes
    pub size: u64,
    pub preview: Option<ImagePreview>,
}

impl Attachment {
    /// Encode raw bytes as an attachment of the given MIME type
    pub fn from_bytes(filename: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        let mime_type = mime_type.into();
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            media_kind: MediaKind::from_mime(&mime_type),
            mime_type,
            encoded_data: STANDARD.encode(bytes),
            size: bytes.len() as u64,
            preview: None,
        }
    }

    /// Read and encode a file, deriving its MIME type from the extension
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let mime_type = mime_type_for_path(path)?;
        let bytes = read_existing(path)?;
        let mut attachment = Self::from_bytes(display_name(path), mime_type, &bytes);

        if attachment.media_kind == MediaKind::Image {
            use image::GenericImageView;

            attachment.preview = image::load_from_memory(&bytes).ok().map(|img| {
                let (width, height) = img.dimensions();
                ImagePreview { width, height }
            });
        }

        Ok(attachment)
    }

    /// Wrap recorded audio as a voice note
    pub fn voice_note(bytes: &[u8]) -> Self {
        Self::from_bytes(VOICE_NOTE_FILENAME, VOICE_NOTE_MIME, bytes)
    }

    /// Load a recording from disk as a voice note, whatever its extension
    pub fn voice_note_from_path(path: &Path) -> Result<Self, AttachmentError> {
        let bytes = read_existing(path)?;
        if bytes.is_empty() {
            return Err(AttachmentError::MissingData(display_name(path)));
        }
        Ok(Self::voice_note(&bytes))
    }

    /// Whether there is a payload to send
    pub fn has_data(&self) -> bool {
        !self.encoded_data.is_empty()
    }

    /// Short line for display, e.g. `📄 lease.pdf (1.2MB)`
    pub fn label(&self) -> String {
        let mut label = format!(
            "{} {} ({})",
            self.media_kind.icon(),
            self.filename,
            format_size(self.size)
        );
        if let Some(preview) = self.preview {
            label.push_str(&format!(" {}x{}", preview.width, preview.height));
        }
        label
    }
}

/// MIME type for a file, from its extension
pub fn mime_type_for_path(path: &Path) -> Result<&'static str, AttachmentError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "webm" => VOICE_NOTE_MIME,
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" | "aac" => "audio/aac",
        "flac" => "audio/flac",
        "" => {
            return Err(AttachmentError::UnsupportedFileType(display_name(path)));
        }
        other => return Err(AttachmentError::UnsupportedFileType(format!(".{}", other))),
    };
    Ok(mime)
}

fn read_existing(path: &Path) -> Result<Vec<u8>, AttachmentError> {
    if !path.is_file() {
        return Err(AttachmentError::FileNotFound(path.display().to_string()));
    }
    Ok(fs::read(path)?)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Outcome of attaching a batch of files
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Labels of the attachments that were added
    pub attached: Vec<String>,
    /// Files that were skipped, with the reason
    pub rejected: Vec<(PathBuf, AttachmentError)>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Attachments waiting to go out with the next turn
#[derive(Debug, Default)]
pub struct AttachmentTray {
    pending: Vec<Attachment>,
    config: AttachmentConfig,
}

impl AttachmentTray {
    pub fn new(config: AttachmentConfig) -> Self {
        Self {
            pending: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &AttachmentConfig {
        &self.config
    }

    pub fn count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[Attachment] {
        &self.pending
    }

    pub fn total_size(&self) -> u64 {
        self.pending.iter().map(|a| a.size).sum()
    }

    /// Add one attachment, enforcing both limits
    pub fn add(&mut self, attachment: Attachment) -> Result<(), AttachmentError> {
        if !attachment.has_data() {
            return Err(AttachmentError::MissingData(attachment.filename));
        }
        self.can_add(&attachment.filename, attachment.size)?;
        self.pending.push(attachment);
        Ok(())
    }

    /// Check whether a file of the given size would fit
    pub fn can_add(&self, name: &str, size: u64) -> Result<(), AttachmentError> {
        if self.pending.len() >= self.config.max_attachments {
            return Err(AttachmentError::TooManyAttachments {
                count: self.pending.len() + 1,
                max: self.config.max_attachments,
            });
        }
        self.config.check_size(name, size)
    }

    /// Attach a batch of files
    ///
    /// A batch that would push the tray over the count limit is refused
    /// outright. Otherwise files are checked one by one: missing, oversized
    /// or unsupported files are reported and skipped, the rest are added.
    pub fn add_paths(&mut self, paths: &[PathBuf]) -> Result<IngestReport, AttachmentError> {
        let requested = self.pending.len() + paths.len();
        if requested > self.config.max_attachments {
            return Err(AttachmentError::TooManyAttachments {
                count: requested,
                max: self.config.max_attachments,
            });
        }

        let mut report = IngestReport::default();
        for path in paths {
            match self.ingest(path) {
                Ok(attachment) => {
                    tracing::debug!(file = %attachment.filename, mime = %attachment.mime_type, "Attached file");
                    report.attached.push(attachment.label());
                    self.pending.push(attachment);
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Rejected attachment");
                    report.rejected.push((path.clone(), e));
                }
            }
        }
        Ok(report)
    }

    fn ingest(&self, path: &Path) -> Result<Attachment, AttachmentError> {
        if !path.is_file() {
            return Err(AttachmentError::FileNotFound(path.display().to_string()));
        }
        mime_type_for_path(path)?;
        let size = fs::metadata(path)?.len();
        self.config.check_size(&display_name(path), size)?;
        if size == 0 {
            return Err(AttachmentError::MissingData(display_name(path)));
        }
        Attachment::from_path(path)
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Attachment> {
        if index < self.pending.len() {
            Some(self.pending.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Take all pending attachments, leaving the tray empty
    pub fn take_all(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.pending)
    }
}

/// Resolve a path typed by the user (absolute, `~/...`, or relative to cwd)
pub fn resolve_file_path(path_str: &str) -> Result<PathBuf, AttachmentError> {
    let path_str = path_str.trim();
    if path_str.is_empty() {
        return Err(AttachmentError::FileNotFound("Empty path".to_string()));
    }

    let path = match path_str.strip_prefix('~') {
        Some(rest) => {
            let home = directories::BaseDirs::new()
                .map(|dirs| dirs.home_dir().to_path_buf())
                .ok_or_else(|| AttachmentError::FileNotFound(path_str.to_string()))?;
            home.join(rest.trim_start_matches('/'))
        }
        None => {
            let path = PathBuf::from(path_str);
            if path.is_absolute() {
                path
            } else {
                std::env::current_dir()?.join(path)
            }
        }
    };

    path.canonicalize()
        .map_err(|_| AttachmentError::FileNotFound(path_str.to_string()))
}

/// A `@path` reference found in typed text, with its byte span
struct FileReference {
    start: usize,
    end: usize,
    path: String,
}

/// Scan for `@path`, `@"quoted path"` and `@'quoted path'` tokens.
/// `@` only opens a reference at the start of input or after whitespace.
fn scan_file_references(input: &str) -> Vec<FileReference> {
    let mut refs = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut prev_is_space = true;

    while let Some((start, c)) = chars.next() {
        if c != '@' || !prev_is_space {
            prev_is_space = c.is_whitespace();
            continue;
        }

        let quote = match chars.peek() {
            Some(&(_, q)) if q == '"' || q == '\'' => {
                chars.next();
                Some(q)
            }
            _ => None,
        };

        let mut path = String::new();
        let mut end = input.len();
        let mut closed = quote.is_none();
        while let Some(&(i, ch)) = chars.peek() {
            match quote {
                Some(q) if ch == q => {
                    chars.next();
                    end = i + ch.len_utf8();
                    closed = true;
                    break;
                }
                None if ch.is_whitespace() => {
                    end = i;
                    break;
                }
                _ => {
                    path.push(ch);
                    chars.next();
                }
            }
        }

        if closed && !path.is_empty() {
            refs.push(FileReference { start, end, path });
        }
        prev_is_space = false;
    }

    refs
}

/// Paths referenced with `@` in the input, in order of appearance
pub fn parse_file_references(input: &str) -> Vec<String> {
    scan_file_references(input)
        .into_iter()
        .map(|r| r.path)
        .collect()
}

/// The input with every `@path` reference removed and whitespace collapsed
pub fn remove_file_references(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut cursor = 0;
    for reference in scan_file_references(input) {
        result.push_str(&input[cursor..reference.start]);
        cursor = reference.end;
    }
    result.push_str(&input[cursor..]);
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
