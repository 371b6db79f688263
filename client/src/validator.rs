//! Client-side admissibility checks run on a selected file before it is
//! submitted. Everything here is a pure function over its inputs; the
//! session decides where and when it runs.

use image::{ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];
pub const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// The file currently staged for analysis.
#[derive(Clone)]
pub struct UploadCandidate {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl UploadCandidate {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, declaring its MIME type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(mime_for_extension)
            .unwrap_or("application/octet-stream");
        Ok(Self::new(file_name, mime_type, bytes))
    }

    pub fn byte_size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Accepted when either the declared MIME type or the file extension is
    /// in the PNG/JPEG set.
    pub fn has_accepted_type(&self) -> bool {
        let mime = self.mime_type.to_ascii_lowercase();
        ACCEPTED_MIME_TYPES.contains(&mime.as_str())
            || self
                .extension()
                .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
    }

    /// MIME type to put on the wire. Only meaningful for accepted candidates.
    pub fn upload_mime_type(&self) -> &'static str {
        let mime = self.mime_type.to_ascii_lowercase();
        if mime == "image/png" {
            return "image/png";
        }
        if mime == "image/jpeg" || mime == "image/jpg" {
            return "image/jpeg";
        }
        self.extension()
            .map(|ext| mime_for_extension(&ext))
            .unwrap_or("application/octet-stream")
    }
}

impl fmt::Debug for UploadCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCandidate")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("byte_size", &self.bytes.len())
            .finish()
    }
}

pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub max_bytes: u64,
    pub min_bytes: u64,
    pub min_dimension: u32,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_bytes: 16 * 1024 * 1024,
            min_bytes: 10 * 1024,
            min_dimension: 100,
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationRejection {
    #[error("only one image can be analyzed at a time ({count} selected)")]
    TooManyFiles { count: usize },
    #[error("{file_name} has unsupported type {mime_type:?}")]
    InvalidType { file_name: String, mime_type: String },
    #[error("file is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("file could not be decoded as an image: {reason}")]
    DecodeFailed { reason: String },
    #[error("file is {size} bytes, below the {limit} byte minimum")]
    TooSmallFileSize { size: u64, limit: u64 },
    #[error("image is {width}x{height} px, below the {min} px minimum")]
    TooSmallDimensions { width: u32, height: u32, min: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    UnusualAspectRatio { ratio: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accepted,
    AcceptedWithWarning(ValidationWarning),
    Rejected(ValidationRejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Verdict::Rejected(_))
    }

    pub fn warning(&self) -> Option<&ValidationWarning> {
        match self {
            Verdict::AcceptedWithWarning(warning) => Some(warning),
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&ValidationRejection> {
        match self {
            Verdict::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

impl ImageMetadata {
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Verdict plus whatever was learned about the file on the way to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub verdict: Verdict,
    pub byte_size: u64,
    pub image: Option<ImageMetadata>,
}

impl ValidationReport {
    pub fn rejected(rejection: ValidationRejection, byte_size: u64) -> Self {
        Self {
            verdict: Verdict::Rejected(rejection),
            byte_size,
            image: None,
        }
    }
}

/// Enforces the single-file rule on a raw selection.
pub fn check_selection(files: &[UploadCandidate]) -> Result<Option<&UploadCandidate>, ValidationRejection> {
    match files {
        [] => Ok(None),
        [single] => Ok(Some(single)),
        many => Err(ValidationRejection::TooManyFiles { count: many.len() }),
    }
}

/// Runs the full check chain on one candidate, short-circuiting on the
/// first hard failure. The size ceiling is checked before decoding so an
/// oversized upload is never decoded.
pub fn inspect(candidate: &UploadCandidate, limits: &Limits) -> ValidationReport {
    let byte_size = candidate.byte_size();

    if !candidate.has_accepted_type() {
        return ValidationReport::rejected(
            ValidationRejection::InvalidType {
                file_name: candidate.file_name.clone(),
                mime_type: candidate.mime_type.clone(),
            },
            byte_size,
        );
    }

    if byte_size > limits.max_bytes {
        return ValidationReport::rejected(
            ValidationRejection::TooLarge {
                size: byte_size,
                limit: limits.max_bytes,
            },
            byte_size,
        );
    }

    let image = match decode(&candidate.bytes) {
        Ok(image) => image,
        Err(reason) => {
            log::debug!("decode failed for {}: {}", candidate.file_name, reason);
            return ValidationReport::rejected(ValidationRejection::DecodeFailed { reason }, byte_size);
        }
    };

    let verdict = judge(byte_size, &image, limits);
    log::debug!(
        "{}: {}x{} px, {} bytes -> {:?}",
        candidate.file_name,
        image.width,
        image.height,
        byte_size,
        verdict
    );

    ValidationReport {
        verdict,
        byte_size,
        image: Some(image),
    }
}

/// The post-decode rules: size floor, pixel floor, then the soft aspect
/// ratio signal.
pub fn judge(byte_size: u64, image: &ImageMetadata, limits: &Limits) -> Verdict {
    if byte_size < limits.min_bytes {
        return Verdict::Rejected(ValidationRejection::TooSmallFileSize {
            size: byte_size,
            limit: limits.min_bytes,
        });
    }

    if image.width < limits.min_dimension || image.height < limits.min_dimension {
        return Verdict::Rejected(ValidationRejection::TooSmallDimensions {
            width: image.width,
            height: image.height,
            min: limits.min_dimension,
        });
    }

    let ratio = image.aspect_ratio();
    if ratio > limits.max_aspect_ratio || ratio < limits.min_aspect_ratio {
        return Verdict::AcceptedWithWarning(ValidationWarning::UnusualAspectRatio { ratio });
    }

    Verdict::Accepted
}

fn decode(bytes: &[u8]) -> Result<ImageMetadata, String> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?;

    let format = reader.format();
    match format {
        Some(ImageFormat::Png) | Some(ImageFormat::Jpeg) => {}
        Some(other) => return Err(format!("content is {:?}, not PNG or JPEG", other)),
        None => return Err("unrecognized image format".to_string()),
    }

    let image = reader.decode().map_err(|e| e.to_string())?;
    Ok(ImageMetadata {
        width: image.width(),
        height: image.height(),
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_fn(width, height, |_, _| Luma([rand::random::<u8>()]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn png_metadata(width: u32, height: u32) -> ImageMetadata {
        ImageMetadata {
            width,
            height,
            format: Some(ImageFormat::Png),
        }
    }

    #[test]
    fn square_mid_sized_image_is_accepted_without_warning() {
        let verdict = judge(50 * 1024, &png_metadata(500, 500), &Limits::default());
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[test]
    fn wide_image_is_accepted_with_warning() {
        let verdict = judge(50 * 1024, &png_metadata(4000, 800), &Limits::default());
        assert_eq!(
            verdict,
            Verdict::AcceptedWithWarning(ValidationWarning::UnusualAspectRatio { ratio: 5.0 })
        );
        assert!(verdict.is_accepted());
    }

    #[test]
    fn tall_image_is_accepted_with_warning() {
        let verdict = judge(50 * 1024, &png_metadata(300, 900), &Limits::default());
        assert!(matches!(verdict.warning(), Some(ValidationWarning::UnusualAspectRatio { .. })));
    }

    #[test]
    fn ratio_exactly_on_the_band_edge_is_plain_accept() {
        let limits = Limits::default();
        assert_eq!(judge(50 * 1024, &png_metadata(400, 200), &limits), Verdict::Accepted);
        assert_eq!(judge(50 * 1024, &png_metadata(200, 400), &limits), Verdict::Accepted);
    }

    #[test]
    fn file_size_floor_comes_before_dimension_floor() {
        let verdict = judge(2 * 1024, &png_metadata(50, 50), &Limits::default());
        assert!(matches!(
            verdict,
            Verdict::Rejected(ValidationRejection::TooSmallFileSize { .. })
        ));
    }

    #[test]
    fn narrow_side_below_floor_is_rejected() {
        let verdict = judge(50 * 1024, &png_metadata(99, 400), &Limits::default());
        assert_eq!(
            verdict,
            Verdict::Rejected(ValidationRejection::TooSmallDimensions {
                width: 99,
                height: 400,
                min: 100
            })
        );
    }

    #[test]
    fn oversized_file_is_rejected_before_decoding() {
        let candidate = UploadCandidate::new("huge.png", "image/png", vec![0u8; 20 * 1024 * 1024]);
        let report = inspect(&candidate, &Limits::default());
        assert!(matches!(
            report.verdict,
            Verdict::Rejected(ValidationRejection::TooLarge { .. })
        ));
        assert_eq!(report.image, None);
    }

    #[test]
    fn wrong_type_is_rejected_first() {
        let candidate = UploadCandidate::new("notes.txt", "text/plain", vec![0u8; 20 * 1024 * 1024]);
        let report = inspect(&candidate, &Limits::default());
        assert!(matches!(
            report.verdict,
            Verdict::Rejected(ValidationRejection::InvalidType { .. })
        ));
    }

    #[test]
    fn extension_alone_is_enough_for_type_acceptance() {
        let candidate = UploadCandidate::new("scan.JPEG", "", vec![1, 2, 3]);
        assert!(candidate.has_accepted_type());
        assert_eq!(candidate.upload_mime_type(), "image/jpeg");
    }

    #[test]
    fn garbage_bytes_fail_decoding() {
        let candidate = UploadCandidate::new("scan.png", "image/png", vec![7u8; 64 * 1024]);
        let report = inspect(&candidate, &Limits::default());
        assert!(matches!(
            report.verdict,
            Verdict::Rejected(ValidationRejection::DecodeFailed { .. })
        ));
    }

    #[test]
    fn real_png_reports_its_metadata() {
        let bytes = noise_png(300, 300);
        let size = bytes.len() as u64;
        let candidate = UploadCandidate::new("chest.png", "image/png", bytes);
        let report = inspect(&candidate, &Limits::default());
        assert_eq!(report.verdict, Verdict::Accepted);
        assert_eq!(report.byte_size, size);
        assert_eq!(report.image, Some(png_metadata(300, 300)));
    }

    #[test]
    fn real_wide_png_carries_the_warning_and_metadata() {
        let candidate = UploadCandidate::new("wide.png", "image/png", noise_png(600, 120));
        let report = inspect(&candidate, &Limits::default());
        assert_eq!(
            report.verdict,
            Verdict::AcceptedWithWarning(ValidationWarning::UnusualAspectRatio { ratio: 5.0 })
        );
        assert_eq!(report.image.map(|i| (i.width, i.height)), Some((600, 120)));
    }

    #[test]
    fn selection_must_hold_exactly_one_file() {
        let one = UploadCandidate::new("a.png", "image/png", vec![0u8; 4]);
        let two = vec![one.clone(), one.clone()];
        assert!(check_selection(&[]).unwrap().is_none());
        assert!(check_selection(std::slice::from_ref(&one)).unwrap().is_some());
        assert_eq!(
            check_selection(&two).unwrap_err(),
            ValidationRejection::TooManyFiles { count: 2 }
        );
    }
}
