//! Mouse input simulation for UI automation.
//!
//! Uses SendInput, which simulates hardware-level input that the game's input
//! layer accepts. The window must be in the foreground and the process
//! usually needs to be elevated for the game to honour it.

use anyhow::{anyhow, Result};
use std::time::Duration;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

/// Wheel delta per event: raw units, not 120-unit notches.
const WHEEL_UNIT: i32 = 1;

/// Delay between button down and button up.
const PRESS_DURATION: Duration = Duration::from_millis(30);

/// Physical screen size in pixels.
pub fn screen_size() -> (i32, i32) {
    unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
}

/// Normalizes screen pixels to the 0-65535 range required by
/// MOUSEEVENTF_ABSOLUTE.
fn normalize(x: i32, y: i32) -> (i32, i32) {
    let (screen_width, screen_height) = screen_size();
    let norm_x = ((x as i64 * 65535) / screen_width.max(1) as i64) as i32;
    let norm_y = ((y as i64 * 65535) / screen_height.max(1) as i64) as i32;
    (norm_x, norm_y)
}

fn send_mouse(flags: MOUSE_EVENT_FLAGS, dx: i32, dy: i32, data: i32) -> Result<()> {
    let input = INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx,
                dy,
                mouseData: data as _,
                dwFlags: flags,
                ..Default::default()
            },
        },
    };
    let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
    if sent != 1 {
        return Err(anyhow!(
            "SendInput rejected the event: {}",
            windows::core::Error::from_win32()
        ));
    }
    Ok(())
}

/// Moves the cursor to screen pixel (x, y).
pub fn move_cursor(x: i32, y: i32) -> Result<()> {
    let (norm_x, norm_y) = normalize(x, y);
    send_mouse(MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE, norm_x, norm_y, 0)
}

/// Left click at screen pixel (x, y). Every event carries the absolute
/// position so the click lands even if the cursor was moved in between.
pub fn left_click(x: i32, y: i32) -> Result<()> {
    let (norm_x, norm_y) = normalize(x, y);
    send_mouse(MOUSEEVENTF_MOVE | MOUSEEVENTF_ABSOLUTE, norm_x, norm_y, 0)?;
    send_mouse(
        MOUSEEVENTF_LEFTDOWN | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
        norm_x,
        norm_y,
        0,
    )?;
    std::thread::sleep(PRESS_DURATION);
    send_mouse(
        MOUSEEVENTF_LEFTUP | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
        norm_x,
        norm_y,
        0,
    )
}

/// Sends `count` wheel units (negative = down), pausing `spacing` after each.
pub fn wheel(count: i32, spacing: Duration) -> Result<()> {
    let direction = if count > 0 { WHEEL_UNIT } else { -WHEEL_UNIT };
    for _ in 0..count.unsigned_abs() {
        send_mouse(MOUSEEVENTF_WHEEL, 0, 0, direction)?;
        std::thread::sleep(spacing);
    }
    Ok(())
}
