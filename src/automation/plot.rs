//! Dialogue auto-advance.
//!
//! Clicks the dialogue area while the game has focus. CAPSLOCK pauses,
//! ALT+Q stops, LEFT and RIGHT change the click interval.

use std::thread;
use std::time::Duration;

use crate::automation::config::PlotConfig;
use crate::automation::state::{CancelToken, Outcome, PlotState, MSG_PLOT_FINISHED};
use crate::capture::ScreenDriver;
use crate::error::Result;
use crate::hotkey::{HotkeyRegistry, PLOT_BINDINGS};

pub fn play_plots(
    driver: &dyn ScreenDriver,
    config: &PlotConfig,
    hotkeys: &dyn HotkeyRegistry,
    stop: &CancelToken,
) -> Result<Outcome> {
    let mut subscription = hotkeys.register(&PLOT_BINDINGS)?;
    let mut state = PlotState::new(config);
    let idle = Duration::from_millis(config.poll_interval_ms);
    tracing::info!("[开始]播放剧情");

    loop {
        for action in subscription.poll() {
            state.apply(action);
        }
        if state.stopped || stop.is_cancelled() {
            break;
        }

        if !state.paused && driver.is_foreground() {
            driver.click(config.click)?;
            thread::sleep(state.delay);
        } else {
            thread::sleep(idle);
        }
    }

    Ok(Outcome::done(MSG_PLOT_FINISHED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::state::OutcomeKind;
    use crate::hotkey::HotkeyAction;
    use crate::testing::{FakeDriver, ScriptedHotkeys};

    fn fast() -> PlotConfig {
        PlotConfig {
            initial_delay_ms: 0,
            poll_interval_ms: 1,
            ..PlotConfig::default()
        }
    }

    #[test]
    fn test_clicks_until_stopped() {
        let driver = FakeDriver::new();
        let hotkeys = ScriptedHotkeys::new(vec![vec![], vec![], vec![], vec![HotkeyAction::Stop]]);
        let outcome = play_plots(&driver, &fast(), &hotkeys, &CancelToken::new()).unwrap();

        assert_eq!(outcome.kind, OutcomeKind::Done);
        assert_eq!(outcome.message, "结束自动播放");
        assert_eq!(driver.clicks(), vec![fast().click; 3]);
        assert!(hotkeys.bound().is_empty());
    }

    #[test]
    fn test_pause_suppresses_clicks() {
        let driver = FakeDriver::new();
        let hotkeys = ScriptedHotkeys::new(vec![
            vec![HotkeyAction::TogglePause],
            vec![],
            vec![HotkeyAction::TogglePause],
            vec![HotkeyAction::Stop],
        ]);
        play_plots(&driver, &fast(), &hotkeys, &CancelToken::new()).unwrap();
        assert_eq!(driver.clicks().len(), 1);
    }

    #[test]
    fn test_background_window_is_not_clicked() {
        let driver = FakeDriver::new();
        driver.set_foreground(false);
        let hotkeys = ScriptedHotkeys::new(vec![vec![], vec![], vec![HotkeyAction::Stop]]);
        play_plots(&driver, &fast(), &hotkeys, &CancelToken::new()).unwrap();
        assert!(driver.clicks().is_empty());
    }

    #[test]
    fn test_stop_token_ends_loop() {
        let driver = FakeDriver::new();
        let stop = CancelToken::new();
        stop.cancel();
        let outcome = play_plots(&driver, &fast(), &ScriptedHotkeys::default(), &stop).unwrap();
        assert!(outcome.success);
        assert!(driver.clicks().is_empty());
    }

    #[test]
    fn test_keys_already_bound_is_an_error() {
        let hotkeys = ScriptedHotkeys::default();
        let _held = hotkeys.register(&PLOT_BINDINGS).unwrap();
        let result = play_plots(&FakeDriver::new(), &fast(), &hotkeys, &CancelToken::new());
        assert!(result.is_err());
    }
}
