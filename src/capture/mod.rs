//! Screen driver for the game window.
//!
//! This module provides:
//! - Reference-space geometry (`Point`, `Rect`)
//! - The `ScreenDriver` contract used by every automation loop
//! - The Windows implementation (`window`, `screenshot`)
//!
//! All coordinates handed to a driver are in the 1920x1080 reference
//! resolution. Scaling to the real display happens inside the driver.

#[cfg(windows)]
pub mod screenshot;
#[cfg(windows)]
pub mod window;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::automation::config::AppConfig;

pub const REFERENCE_WIDTH: i32 = 1920;
pub const REFERENCE_HEIGHT: i32 = 1080;

/// A point in reference coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// An axis-aligned rectangle in reference coordinates (right/bottom exclusive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

/// Window focus, input and capture for one target window.
///
/// Implementations must be shareable across the worker threads that run the
/// automation loops.
pub trait ScreenDriver: Send + Sync {
    /// Title of the target window, used in user-facing messages.
    fn window_title(&self) -> &str;

    /// Restores and focuses the target window. Returns false when the window
    /// does not exist.
    fn activate_window(&self) -> bool;

    fn is_foreground(&self) -> bool;

    /// Left click, followed by one action delay.
    fn click(&self, at: Point) -> Result<()>;

    fn move_to(&self, at: Point) -> Result<()>;

    /// Raw wheel units; negative scrolls down. The units are spread over
    /// `duration` (one action delay when `None`).
    fn scroll(&self, count: i32, duration: Option<Duration>) -> Result<()>;

    /// Captures `rect` and returns it PNG-encoded, in reference pixels.
    fn capture_region(&self, rect: Rect) -> Result<Vec<u8>>;

    /// Sleeps `multiple` action delays.
    fn wait(&self, multiple: f32);
}

/// Creates the platform screen driver.
#[cfg(windows)]
pub fn create_driver(config: &AppConfig) -> Result<Arc<dyn ScreenDriver>> {
    Ok(Arc::new(window::WindowsDriver::new(config)?))
}

/// Creates the platform screen driver.
#[cfg(not(windows))]
pub fn create_driver(_config: &AppConfig) -> Result<Arc<dyn ScreenDriver>> {
    anyhow::bail!("the screen driver is only available on Windows")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_geometry() {
        let rect = Rect::new(510, 100, 970, 950);
        assert_eq!(rect.width(), 460);
        assert_eq!(rect.height(), 850);
        assert_eq!(rect.origin(), Point::new(510, 100));
        assert!(!rect.is_empty());
        assert!(Rect::new(10, 10, 10, 20).is_empty());
    }

    #[test]
    fn test_point_offset() {
        assert_eq!(Point::new(10, 20).offset(510, 100), Point::new(520, 120));
    }

    #[test]
    fn test_geometry_serde_shape() {
        let rect: Rect =
            serde_json::from_str(r#"{"left":1,"top":2,"right":3,"bottom":4}"#).unwrap();
        assert_eq!(rect, Rect::new(1, 2, 3, 4));
        let point: Point = serde_json::from_str(r#"{"x":5,"y":6}"#).unwrap();
        assert_eq!(point, Point::new(5, 6));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_create_driver_rejects_other_platforms() {
        assert!(create_driver(&AppConfig::default()).is_err());
    }
}
