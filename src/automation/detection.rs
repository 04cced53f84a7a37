//! Pixel colour measurements on captured regions.

use image::RgbaImage;

/// Counts pixels whose RGB channels are each within `tolerance` of `color`.
///
/// Alpha is ignored.
pub fn count_pixels_of_color(img: &RgbaImage, color: [u8; 3], tolerance: u8) -> u64 {
    img.pixels()
        .filter(|p| {
            p.0[..3]
                .iter()
                .zip(color.iter())
                .all(|(&a, &b)| a.abs_diff(b) <= tolerance)
        })
        .count() as u64
}

/// Decodes a PNG capture and counts matching pixels.
pub fn count_in_png(png: &[u8], color: [u8; 3], tolerance: u8) -> Result<u64, image::ImageError> {
    let img = image::load_from_memory(png)?.to_rgba8();
    Ok(count_pixels_of_color(&img, color, tolerance))
}
