//! Image uploads: dimensions and color mode for the prompt

use image::ColorType;
use std::path::Path;

/// Basic facts about a decoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub mode: String,
}

impl ImageInfo {
    pub fn render(&self, file_name: &str) -> String {
        format!(
            "Uploaded file: {}\nType: image\nImage size: {}x{}, mode: {}\nUse this image as additional evidence for analysis.",
            file_name, self.width, self.height, self.mode
        )
    }
}

/// Decode the image header and pixel layout
pub fn describe(bytes: &[u8]) -> Result<ImageInfo, String> {
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    Ok(ImageInfo {
        width: img.width(),
        height: img.height(),
        mode: color_mode(img.color()),
    })
}

/// Conventional short names for pixel layouts
fn color_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::La8 | ColorType::La16 => "LA".to_string(),
        ColorType::L16 => "I;16".to_string(),
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB".to_string(),
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA".to_string(),
        other => format!("{:?}", other),
    }
}

/// MIME type sent with the inline attachment
pub fn mime_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}
