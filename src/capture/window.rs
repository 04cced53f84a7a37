//! Window discovery and the Windows screen driver.

use anyhow::{anyhow, Result};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::time::Duration;

use windows::core::HSTRING;
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Shell::IsUserAnAdmin;
use windows::Win32::UI::WindowsAndMessaging::{
    FindWindowW, GetForegroundWindow, SetForegroundWindow, ShowWindow, SW_RESTORE,
};

use super::screenshot::capture_screen_rect;
use super::{Point, Rect, ScreenDriver, REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::automation::config::AppConfig;
use crate::automation::input;

/// Finds the top-level window by class name and title.
pub fn find_window(class_name: &str, title: &str) -> Option<HWND> {
    let hwnd = unsafe { FindWindowW(&HSTRING::from(class_name), &HSTRING::from(title)) }.ok()?;
    if hwnd.is_invalid() {
        None
    } else {
        Some(hwnd)
    }
}

/// Returns true when the process runs elevated.
pub fn is_elevated() -> bool {
    unsafe { IsUserAnAdmin().as_bool() }
}

/// Screen driver backed by Win32 window APIs, SendInput and GDI capture.
///
/// The window handle is cached as a raw value so the driver stays `Send +
/// Sync`; it is refreshed on every activation.
pub struct WindowsDriver {
    title: String,
    class_name: String,
    action_delay: Duration,
    screen_width: i32,
    screen_height: i32,
    hwnd: AtomicIsize,
}

impl WindowsDriver {
    pub fn new(config: &AppConfig) -> Result<Self> {
        if !is_elevated() {
            tracing::warn!("程序未获得管理员权限: the game may ignore simulated input");
        }

        let (screen_width, screen_height) = input::screen_size();
        if screen_width <= 0 || screen_height <= 0 {
            return Err(anyhow!(
                "Invalid screen size {}x{}",
                screen_width,
                screen_height
            ));
        }

        let driver = Self {
            title: config.window.title.clone(),
            class_name: config.window.class_name.clone(),
            action_delay: Duration::from_millis(config.action_delay_ms),
            screen_width,
            screen_height,
            hwnd: AtomicIsize::new(0),
        };
        tracing::info!(
            "目标窗口标题={}, 类名={}, screen {}x{}",
            driver.title,
            driver.class_name,
            screen_width,
            screen_height
        );
        driver.refresh_window_handle();
        Ok(driver)
    }

    fn refresh_window_handle(&self) -> Option<HWND> {
        let hwnd = find_window(&self.class_name, &self.title);
        self.hwnd
            .store(hwnd.map_or(0, |h| h.0 as isize), Ordering::SeqCst);
        tracing::debug!("句柄={:?}", hwnd);
        hwnd
    }

    fn to_screen_x(&self, x: i32) -> i32 {
        (x as i64 * self.screen_width as i64 / REFERENCE_WIDTH as i64) as i32
    }

    fn to_screen_y(&self, y: i32) -> i32 {
        (y as i64 * self.screen_height as i64 / REFERENCE_HEIGHT as i64) as i32
    }

    fn to_screen(&self, at: Point) -> (i32, i32) {
        (self.to_screen_x(at.x), self.to_screen_y(at.y))
    }
}

impl ScreenDriver for WindowsDriver {
    fn window_title(&self) -> &str {
        &self.title
    }

    fn activate_window(&self) -> bool {
        let Some(hwnd) = self.refresh_window_handle() else {
            return false;
        };
        unsafe {
            let _ = ShowWindow(hwnd, SW_RESTORE);
            let _ = SetForegroundWindow(hwnd);
        }
        self.wait(1.0);
        true
    }

    fn is_foreground(&self) -> bool {
        let current = self.hwnd.load(Ordering::SeqCst);
        current != 0 && unsafe { GetForegroundWindow() }.0 as isize == current
    }

    fn click(&self, at: Point) -> Result<()> {
        let (x, y) = self.to_screen(at);
        input::left_click(x, y)?;
        self.wait(1.0);
        Ok(())
    }

    fn move_to(&self, at: Point) -> Result<()> {
        let (x, y) = self.to_screen(at);
        input::move_cursor(x, y)
    }

    fn scroll(&self, count: i32, duration: Option<Duration>) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let duration = duration.unwrap_or(self.action_delay);
        input::wheel(count, duration / count.unsigned_abs())?;
        self.wait(1.0);
        Ok(())
    }

    fn capture_region(&self, rect: Rect) -> Result<Vec<u8>> {
        if rect.is_empty() {
            return Err(anyhow!("Empty capture region {:?}", rect));
        }
        let (left, top) = self.to_screen(rect.origin());
        let (right, bottom) = self.to_screen(Point::new(rect.right, rect.bottom));
        let captured = capture_screen_rect(left, top, right - left, bottom - top)?;

        // Callers reason in reference pixels
        let (ref_width, ref_height) = (rect.width() as u32, rect.height() as u32);
        let image = if captured.dimensions() == (ref_width, ref_height) {
            DynamicImage::ImageRgba8(captured)
        } else {
            DynamicImage::ImageRgba8(captured).resize_exact(
                ref_width,
                ref_height,
                FilterType::Triangle,
            )
        };

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }

    fn wait(&self, multiple: f32) {
        if multiple > 0.0 {
            std::thread::sleep(self.action_delay.mul_f32(multiple));
        }
    }
}
