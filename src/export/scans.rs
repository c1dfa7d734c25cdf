//! Scan folder → one PDF.
//!
//! Phone photos of paper reports are large. Each image is scaled so its long
//! side fits `max_dimension`, re-encoded as JPEG and placed on its own page,
//! in natural file-name order (`page2` before `page10`).

use std::cmp::Ordering;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use printpdf::{
    ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject, Mm, PdfDocument, Px,
};
use serde::{Deserialize, Serialize};

use super::ExportError;

pub const DEFAULT_JPEG_QUALITY: u8 = 50;
pub const DEFAULT_MAX_DIMENSION: u32 = 2560;

/// Lower-case extensions picked up from a scan folder.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tiff", "tif", "webp"];

/// One image pixel per dot at this density.
const PAGE_DPI: f32 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// JPEG quality, 1-100.
    pub quality: u8,
    /// Longest allowed side in pixels.
    pub max_dimension: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageFailure {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PdfReport {
    pub output_path: PathBuf,
    /// Images found.
    pub total: usize,
    /// Pages written.
    pub merged: usize,
    pub failed: Vec<ImageFailure>,
    pub output_size: u64,
}

/// Target size keeping the aspect ratio, long side at most `max_dimension`.
/// Images already small enough keep their size.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let max = max_dimension.max(1);
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = |side: u32, long: u32| ((u64::from(side) * u64::from(max)) / u64::from(long)).max(1) as u32;
    if width > height {
        (max, scale(height, width))
    } else {
        (scale(width, height), max)
    }
}

/// File-name order where digit runs compare as numbers and letters ignore case.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalChunk {
    Number(u64),
    Text(String),
}

fn natural_key(name: &str) -> Vec<NaturalChunk> {
    let mut chunks = Vec::new();
    let mut rest = name;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits > 0 {
            chunks.push(NaturalChunk::Number(rest[..digits].parse().unwrap_or(u64::MAX)));
            rest = &rest[digits..];
            continue;
        }
        let text = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        chunks.push(NaturalChunk::Text(rest[..text].to_lowercase()));
        rest = &rest[text..];
    }
    chunks
}

/// Supported images directly inside `folder`, in natural name order.
pub fn list_images(folder: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let entries = fs::read_dir(folder).map_err(|e| ExportError::io(folder, e))?;
    let mut images = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ExportError::io(folder, e))?.path();
        let supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if supported && path.is_file() {
            images.push(path);
        }
    }
    images.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));
    Ok(images)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Shrink one image and write it to `dest` as JPEG. Returns the new size.
pub fn compress_image(
    source: &Path,
    dest: &Path,
    options: ScanOptions,
) -> Result<(u32, u32), ExportError> {
    check_quality(options.quality)?;
    let page = load_page(source, options.quality, Some(options.max_dimension))?;
    fs::write(dest, &page.jpeg).map_err(|e| ExportError::io(dest, e))?;
    Ok((page.width, page.height))
}

/// Put `images` into one PDF, a page each, in the given order and at their
/// own size. Unreadable images are reported and skipped.
pub fn merge_images_to_pdf(
    images: &[PathBuf],
    output: &Path,
    quality: u8,
) -> Result<PdfReport, ExportError> {
    check_quality(quality)?;
    build_pdf(images, output, quality, None)
}

/// Shrink every image in `folder` and merge them into `<parent>/<folder>.pdf`.
pub fn compress_folder_to_pdf(
    folder: &Path,
    options: ScanOptions,
) -> Result<PdfReport, ExportError> {
    check_quality(options.quality)?;
    if !folder.exists() {
        return Err(ExportError::FolderNotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(ExportError::NotAFolder(folder.to_path_buf()));
    }
    let name = folder
        .file_name()
        .ok_or_else(|| ExportError::InvalidTarget(folder.to_path_buf()))?;
    let output = folder
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{}.pdf", name.to_string_lossy()));

    let images = list_images(folder)?;
    tracing::info!(folder = %folder.display(), images = images.len(), "Compressing scans");
    build_pdf(&images, &output, options.quality, Some(options.max_dimension))
}

fn check_quality(quality: u8) -> Result<(), ExportError> {
    if (1..=100).contains(&quality) {
        Ok(())
    } else {
        Err(ExportError::InvalidQuality(quality))
    }
}

struct JpegPage {
    width: u32,
    height: u32,
    jpeg: Vec<u8>,
}

fn load_page(
    path: &Path,
    quality: u8,
    max_dimension: Option<u32>,
) -> Result<JpegPage, ExportError> {
    let image_err = |source| ExportError::Image {
        path: path.to_path_buf(),
        source,
    };
    let mut img = image::open(path).map_err(image_err)?;
    if let Some(max) = max_dimension {
        img = shrink(img, max);
    }
    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&rgb)
        .map_err(image_err)?;
    Ok(JpegPage {
        width: rgb.width(),
        height: rgb.height(),
        jpeg,
    })
}

fn shrink(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = fit_within(width, height, max_dimension);
    if (new_width, new_height) == (width, height) {
        return img;
    }
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

fn build_pdf(
    images: &[PathBuf],
    output: &Path,
    quality: u8,
    max_dimension: Option<u32>,
) -> Result<PdfReport, ExportError> {
    if images.is_empty() {
        let dir = output.parent().unwrap_or(output);
        return Err(ExportError::NoImages(dir.to_path_buf()));
    }

    let mut pages = Vec::with_capacity(images.len());
    let mut failed = Vec::new();
    for path in images {
        match load_page(path, quality, max_dimension) {
            Ok(page) => pages.push(page),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable image");
                failed.push(ImageFailure {
                    path: path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    if pages.is_empty() {
        return Err(ExportError::NothingMerged {
            total: images.len(),
        });
    }

    let merged = pages.len();
    let title = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = render_pdf(&title, pages)?;
    fs::write(output, &bytes).map_err(|e| ExportError::io(output, e))?;

    tracing::info!(
        output = %output.display(),
        merged,
        failed = failed.len(),
        "Scan PDF written"
    );
    Ok(PdfReport {
        output_path: output.to_path_buf(),
        total: images.len(),
        merged,
        failed,
        output_size: bytes.len() as u64,
    })
}

fn px_to_mm(px: u32) -> Mm {
    Mm(px as f32 * 25.4 / PAGE_DPI)
}

fn render_pdf(title: &str, pages: Vec<JpegPage>) -> Result<Vec<u8>, ExportError> {
    let mut pages = pages.into_iter();
    let first = pages
        .next()
        .ok_or_else(|| ExportError::Pdf("no pages to write".into()))?;

    let (doc, page1, layer1) =
        PdfDocument::new(title, px_to_mm(first.width), px_to_mm(first.height), "Layer 1");
    place_image(doc.get_page(page1).get_layer(layer1), first);
    for page in pages {
        let (index, layer) = doc.add_page(px_to_mm(page.width), px_to_mm(page.height), "Layer 1");
        place_image(doc.get_page(index).get_layer(layer), page);
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Pdf(format!("PDF save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| ExportError::Pdf(format!("PDF buffer error: {e}")))
}

fn place_image(layer: printpdf::PdfLayerReference, page: JpegPage) {
    let xobject = ImageXObject {
        width: Px(page.width as usize),
        height: Px(page.height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: page.jpeg,
        image_filter: Some(ImageFilter::DCT),
        smask: None,
        clipping_bbox: None,
    };
    Image::from(xobject).add_to_layer(
        layer,
        ImageTransform {
            dpi: Some(PAGE_DPI),
            ..Default::default()
        },
    );
}
