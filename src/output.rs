//! Atlas image conversion and PNG output

use image::{Rgba, RgbaImage};
use std::io;
use std::path::{Path, PathBuf};

/// Error type for output operations
#[derive(Debug)]
pub enum OutputError {
    /// IO error during file operations
    Io(io::Error),
    /// Image encoding or decoding error
    Image(image::ImageError),
    /// Pixel buffer does not match the stated dimensions
    BufferSize { expected: usize, actual: usize },
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::Io(e) => write!(f, "IO error: {}", e),
            OutputError::Image(e) => write!(f, "Image error: {}", e),
            OutputError::BufferSize { expected, actual } => {
                write!(f, "Atlas buffer has {} bytes, expected {}", actual, expected)
            }
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::Io(e) => Some(e),
            OutputError::Image(e) => Some(e),
            OutputError::BufferSize { .. } => None,
        }
    }
}

impl From<io::Error> for OutputError {
    fn from(e: io::Error) -> Self {
        OutputError::Io(e)
    }
}

impl From<image::ImageError> for OutputError {
    fn from(e: image::ImageError) -> Self {
        OutputError::Image(e)
    }
}

/// Expand a single-channel atlas into RGBA.
///
/// Each coverage value `c` becomes the pixel `(c, c, c, c)`. Rows keep the
/// buffer's top-down order.
pub fn alpha_to_rgba(buffer: &[u8], width: u32, height: u32) -> Result<RgbaImage, OutputError> {
    let expected = width as usize * height as usize;
    if buffer.len() != expected {
        return Err(OutputError::BufferSize { expected, actual: buffer.len() });
    }

    let mut image = RgbaImage::new(width, height);
    for (pixel, &c) in image.pixels_mut().zip(buffer) {
        *pixel = Rgba([c, c, c, c]);
    }
    Ok(image)
}

/// Save an RGBA image to a PNG file, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    image.save(path)?;
    Ok(())
}

/// Load a PNG back into RGBA.
pub fn load_png(path: &Path) -> Result<RgbaImage, OutputError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Path of the atlas texture stored next to a font asset.
///
/// `Fonts/Roboto SDF.asset` maps to `Fonts/Roboto SDF Atlas.png`.
pub fn atlas_texture_path(asset_path: &Path) -> PathBuf {
    let stem = asset_path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let file_name = format!("{} Atlas.png", stem);
    match asset_path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
