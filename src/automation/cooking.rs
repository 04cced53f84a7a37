//! Cooking minigame.
//!
//! Each round starts the dish, then watches the progress bar: the "best
//! area" is drawn in a fixed colour and the pointer covers part of it when
//! it passes over. A drop in the coloured pixel count against the first
//! measurement means the pointer is inside, and the dish is stopped there.

use crate::automation::config::CookingConfig;
use crate::automation::detection::count_in_png;
use crate::automation::state::{CancelToken, CancelWatch, Outcome, MSG_SUCCESS};
use crate::capture::ScreenDriver;
use crate::error::Result;
use crate::hotkey::HotkeyRegistry;

pub fn cook(
    driver: &dyn ScreenDriver,
    config: &CookingConfig,
    count: u32,
    hotkeys: &dyn HotkeyRegistry,
    stop: CancelToken,
) -> Result<Outcome> {
    let mut cancel = CancelWatch::register(hotkeys, stop)?;
    let mut baseline: Option<u64> = None;
    let mut cancelled = false;

    for round in 1..=count {
        if cancel.requested() {
            cancelled = true;
            break;
        }
        tracing::info!("Cooking {}/{}", round, count);

        driver.click(config.start_button)?;
        driver.wait(config.start_wait);

        let begin = match baseline {
            Some(area) => area,
            None => {
                let area = measure(driver, config)?;
                tracing::info!("初始最佳区域面积：{}", area);
                baseline = Some(area);
                area
            }
        };

        for _ in 0..config.max_polls {
            if cancel.requested() {
                cancelled = true;
                break;
            }
            let now = measure(driver, config)?;
            tracing::debug!("PIXELS NUM: {}", now);
            if begin.saturating_sub(now) > config.area_drop_threshold {
                tracing::info!("到达最佳区域，点击结束");
                driver.click(config.stop_button)?;
                break;
            }
        }
        if cancelled {
            break;
        }

        driver.wait(config.finish_wait);
        driver.click(config.finish_button)?;
    }

    if cancelled {
        Ok(Outcome::stopped())
    } else {
        Ok(Outcome::done(MSG_SUCCESS))
    }
}

fn measure(driver: &dyn ScreenDriver, config: &CookingConfig) -> Result<u64> {
    let png = driver.capture_region(config.scan_region)?;
    let area = count_in_png(&png, config.best_area_color, config.color_tolerance)
        .map_err(anyhow::Error::from)?;
    Ok(area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::state::OutcomeKind;
    use crate::hotkey::HotkeyAction;
    use crate::testing::{Action, FakeDriver, ScriptedHotkeys};
    use image::{ImageBuffer, Rgba, RgbaImage};
    use std::io::Cursor;

    /// 20x20 frame with `best` pixels in the best-area colour.
    fn frame(best: u32) -> Vec<u8> {
        let mut img: RgbaImage = ImageBuffer::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        for i in 0..best {
            img.put_pixel(i % 20, i / 20, Rgba([255, 192, 64, 255]));
        }
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        png
    }

    #[test]
    fn test_stops_when_best_area_shrinks() {
        let config = CookingConfig::default();
        let driver = FakeDriver::new().with_captures(
            vec![frame(300), frame(300), frame(250), frame(150)],
            frame(300),
        );
        let outcome = cook(&driver, &config, 1, &ScriptedHotkeys::default(), CancelToken::new())
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "操作成功");
        assert_eq!(
            driver.clicks(),
            vec![config.start_button, config.stop_button, config.finish_button]
        );
        assert_eq!(driver.count(&Action::Capture(config.scan_region)), 4);
    }

    #[test]
    fn test_baseline_is_measured_once() {
        let config = CookingConfig {
            max_polls: 2,
            ..CookingConfig::default()
        };
        let driver = FakeDriver::new().with_captures(vec![], frame(300));
        cook(&driver, &config, 2, &ScriptedHotkeys::default(), CancelToken::new()).unwrap();

        // Baseline plus two polls, then two polls
        assert_eq!(driver.count(&Action::Capture(config.scan_region)), 5);
        assert_eq!(driver.count(&Action::Click(config.stop_button)), 0);
        assert_eq!(driver.count(&Action::Click(config.finish_button)), 2);
    }

    #[test]
    fn test_escape_stops_cooking() {
        let config = CookingConfig::default();
        let driver = FakeDriver::new();
        let hotkeys = ScriptedHotkeys::new(vec![vec![HotkeyAction::Cancel]]);
        let outcome = cook(&driver, &config, 3, &hotkeys, CancelToken::new()).unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Stopped);
        assert_eq!(outcome.message, "操作停止");
        assert!(driver.actions().is_empty());
        assert!(hotkeys.bound().is_empty());
    }

    #[test]
    fn test_unreadable_capture_is_an_error() {
        let driver = FakeDriver::new();
        let result = cook(
            &driver,
            &CookingConfig::default(),
            1,
            &ScriptedHotkeys::default(),
            CancelToken::new(),
        );
        assert!(result.is_err());
    }
}
