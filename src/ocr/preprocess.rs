use image::{imageops::FilterType, RgbaImage};

use super::{OcrError, Quad};

/// Decodes PNG/JPEG bytes into an RGBA buffer.
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, OcrError> {
    if bytes.is_empty() {
        return Err(OcrError::EmptyImage);
    }
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Shrinks `img` by `factor` when it lies in (0, 1).
///
/// Returns the image to scan and the factor actually applied, which is 1.0
/// when the image was left alone.
pub fn downscale(img: RgbaImage, factor: f32) -> (RgbaImage, f32) {
    if !(factor > 0.0 && factor < 1.0) {
        return (img, 1.0);
    }
    let width = ((img.width() as f32 * factor).round() as u32).max(1);
    let height = ((img.height() as f32 * factor).round() as u32).max(1);
    let resized = image::imageops::resize(&img, width, height, FilterType::Triangle);
    // Ratio after rounding, not the requested factor
    let applied = width as f32 / img.width().max(1) as f32;
    (resized, applied)
}

/// Maps a region found on a downscaled image back to the original pixels.
pub fn map_back(region: Quad, applied: f32) -> Quad {
    if applied == 1.0 || applied <= 0.0 {
        return region;
    }
    region.map(|(x, y)| {
        (
            (x as f32 / applied).round() as i32,
            (y as f32 / applied).round() as i32,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    #[test]
    fn test_decode_rejects_empty() {
        assert!(matches!(decode(&[]), Err(OcrError::EmptyImage)));
        assert!(matches!(decode(b"not an image"), Err(OcrError::Image(_))));
    }

    #[test]
    fn test_decode_png() {
        let img: RgbaImage = ImageBuffer::from_pixel(4, 3, Rgba([1, 2, 3, 255]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode(&png).unwrap();
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_downscale_halves() {
        let img: RgbaImage = ImageBuffer::new(460, 850);
        let (small, applied) = downscale(img, 0.5);
        assert_eq!(small.dimensions(), (230, 425));
        assert_eq!(applied, 0.5);
    }

    #[test]
    fn test_downscale_ignores_out_of_range_factors() {
        for factor in [0.0, 1.0, 1.5, -0.5, f32::NAN] {
            let img: RgbaImage = ImageBuffer::new(10, 10);
            let (same, applied) = downscale(img, factor);
            assert_eq!(same.dimensions(), (10, 10));
            assert_eq!(applied, 1.0);
        }
    }

    #[test]
    fn test_map_back() {
        let region = [(10, 20), (30, 20), (30, 40), (10, 40)];
        assert_eq!(
            map_back(region, 0.5),
            [(20, 40), (60, 40), (60, 80), (20, 80)]
        );
        assert_eq!(map_back(region, 1.0), region);
    }
}
