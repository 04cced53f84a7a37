//! Debug decorator that saves every scanned image with its detections.

use chrono::Local;
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::preprocess::decode;
use super::{OcrError, OcrProvider, ScanMode, ScanOutput};

const BOX_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

pub struct RecordingOcr {
    inner: Arc<dyn OcrProvider>,
    dir: PathBuf,
    count: AtomicUsize,
}

impl RecordingOcr {
    /// Wraps `inner`, clearing recordings left by a previous run in `dir`.
    pub fn new(inner: Arc<dyn OcrProvider>, dir: PathBuf) -> Self {
        if let Ok(entries) = fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let _ = fs::remove_file(entry.path());
            }
        }
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Cannot create {}: {}", dir.display(), e);
        }
        Self {
            inner,
            dir,
            count: AtomicUsize::new(0),
        }
    }

    fn record(&self, image: &[u8], output: &ScanOutput) -> Result<PathBuf, OcrError> {
        let mut img = decode(image)?;
        if let ScanOutput::Detailed(items) = output {
            for item in items {
                let (left, top) = item.region[0];
                let (right, bottom) = item.region[2];
                draw_box(&mut img, left, top, right, bottom);
            }
        }

        let n = self.count.fetch_add(1, Ordering::SeqCst);
        let path = self
            .dir
            .join(format!("{}-{:03}_ocr.png", Local::now().format("%H%M%S"), n));
        img.save(&path)?;
        Ok(path)
    }
}

impl OcrProvider for RecordingOcr {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn needs_credentials(&self) -> bool {
        self.inner.needs_credentials()
    }

    fn scan(&self, image: &[u8], mode: ScanMode, downscale: f32) -> Result<ScanOutput, OcrError> {
        let output = self.inner.scan(image, mode, downscale)?;
        match self.record(image, &output) {
            Ok(path) => tracing::debug!(
                "图像[{}]识别结果({}): {:?}",
                path.display(),
                output.len(),
                output
            ),
            Err(e) => tracing::warn!("Failed to record OCR image: {}", e),
        }
        Ok(output)
    }
}

/// One-pixel outline, clipped to the image.
fn draw_box(img: &mut RgbaImage, left: i32, top: i32, right: i32, bottom: i32) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    if w == 0 || h == 0 {
        return;
    }
    let x0 = left.clamp(0, w - 1);
    let x1 = right.clamp(0, w - 1);
    let y0 = top.clamp(0, h - 1);
    let y1 = bottom.clamp(0, h - 1);
    for x in x0..=x1 {
        img.put_pixel(x as u32, y0 as u32, BOX_COLOR);
        img.put_pixel(x as u32, y1 as u32, BOX_COLOR);
    }
    for y in y0..=y1 {
        img.put_pixel(x0 as u32, y as u32, BOX_COLOR);
        img.put_pixel(x1 as u32, y as u32, BOX_COLOR);
    }
}
