//! Upload validation for scan photos
//!
//! Rules run in a fixed precedence so the reported failure is deterministic
//! when several apply: mime → size → type → required. A file that is both
//! oversized and of a disallowed type reports the type problem.

use serde::Serialize;

/// Default upload size cap (512 KiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024;

/// Leading bytes enough for `infer` to recognize the formats we care about
pub const SNIFF_LEN: usize = 512;

/// Raster formats accepted for scanning
pub const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// File received from a multipart form
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    /// Content type declared by the client
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Why an upload was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UploadRejection {
    /// Missing, unreadable, or not an image
    InvalidFile,
    UnsupportedMediaType,
    FileTooLarge { max_bytes: usize },
}

impl UploadRejection {
    pub fn code(&self) -> &'static str {
        match self {
            UploadRejection::InvalidFile => "INVALID_FILE",
            UploadRejection::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            UploadRejection::FileTooLarge { .. } => "FILE_TOO_LARGE",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            UploadRejection::InvalidFile => 400,
            UploadRejection::UnsupportedMediaType => 415,
            UploadRejection::FileTooLarge { .. } => 413,
        }
    }

    pub fn message(&self) -> String {
        match self {
            UploadRejection::InvalidFile => "Please upload a valid image file.".to_string(),
            UploadRejection::UnsupportedMediaType => "Only JPG and PNG images are supported.".to_string(),
            UploadRejection::FileTooLarge { max_bytes } => {
                format!("The image is too large. Maximum size is {}.", human_size(*max_bytes))
            }
        }
    }
}

fn human_size(bytes: usize) -> String {
    if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Upload limits
#[derive(Debug, Clone)]
pub struct UploadRules {
    pub max_bytes: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadRules {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_mime_types: ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UploadRules {
    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            ..Self::default()
        }
    }

    pub fn too_large(&self) -> UploadRejection {
        UploadRejection::FileTooLarge {
            max_bytes: self.max_bytes,
        }
    }
}

/// Content type from magic bytes, else the declared one
pub fn detect_mime(bytes: &[u8], declared: Option<&str>) -> Option<String> {
    if let Some(kind) = infer::get(bytes) {
        return Some(kind.mime_type().to_string());
    }
    declared.and_then(normalize_mime)
}

/// Mime rule alone
///
/// Works on a prefix of the file, so a stream can be refused before the
/// body limit trips. `None` means nothing could be detected yet.
pub fn screen_mime(
    head: &[u8],
    declared: Option<&str>,
    rules: &UploadRules,
) -> Result<Option<String>, UploadRejection> {
    match detect_mime(head, declared) {
        Some(mime) if !rules.allowed_mime_types.iter().any(|m| *m == mime) => {
            Err(UploadRejection::UnsupportedMediaType)
        }
        mime => Ok(mime),
    }
}

fn normalize_mime(raw: &str) -> Option<String> {
    let essence = raw.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "" => None,
        "image/jpg" | "image/pjpeg" => Some("image/jpeg".to_string()),
        _ => Some(essence),
    }
}

/// Validate an upload, returning its detected mime type
pub fn validate_upload(file: Option<&UploadedFile>, rules: &UploadRules) -> Result<String, UploadRejection> {
    let Some(file) = file else {
        return Err(UploadRejection::InvalidFile);
    };

    // mime
    let mime = screen_mime(&file.bytes, file.content_type.as_deref(), rules)?;

    // size
    if file.bytes.len() > rules.max_bytes {
        return Err(rules.too_large());
    }

    // type
    if !infer::is_image(&file.bytes) {
        return Err(UploadRejection::InvalidFile);
    }

    // required
    match mime {
        Some(mime) if !file.bytes.is_empty() => Ok(mime),
        _ => Err(UploadRejection::InvalidFile),
    }
}
