//! Screen region capture using GDI.

use anyhow::{anyhow, bail, Result};
use image::{ImageBuffer, Rgba, RgbaImage};

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, SRCCOPY,
};

/// Copies a rectangle of the desktop, in physical screen pixels.
///
/// This function:
/// 1. Blits the desktop DC into a compatible bitmap
/// 2. Reads the bitmap back as top-down 32-bit BGRA rows
/// 3. Converts from BGRA to RGBA with opaque alpha
pub fn capture_screen_rect(left: i32, top: i32, width: i32, height: i32) -> Result<RgbaImage> {
    if width <= 0 || height <= 0 {
        bail!("Empty capture rectangle {}x{}", width, height);
    }

    let mut buffer = vec![0u8; width as usize * height as usize * 4];

    let lines = unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            bail!("GetDC failed for the desktop");
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        let previous = SelectObject(mem_dc, bitmap);

        let blit = BitBlt(mem_dc, 0, 0, width, height, screen_dc, left, top, SRCCOPY);

        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // Negative height = top-down rows
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let lines = GetDIBits(
            mem_dc,
            bitmap,
            0,
            height as u32,
            Some(buffer.as_mut_ptr() as *mut _),
            &mut info,
            DIB_RGB_COLORS,
        );

        SelectObject(mem_dc, previous);
        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        ReleaseDC(HWND::default(), screen_dc);

        blit.map_err(|e| anyhow!("BitBlt failed: {}", e))?;
        lines
    };

    if lines == 0 {
        bail!("GetDIBits returned no rows");
    }

    bgra_to_rgba(&mut buffer);
    ImageBuffer::<Rgba<u8>, _>::from_raw(width as u32, height as u32, buffer)
        .ok_or_else(|| anyhow!("Capture buffer size mismatch"))
}

/// In-place BGRA -> RGBA; GDI leaves alpha undefined, so force it opaque.
fn bgra_to_rgba(buffer: &mut [u8]) {
    for px in buffer.chunks_exact_mut(4) {
        px.swap(0, 2);
        px[3] = 255;
    }
}
