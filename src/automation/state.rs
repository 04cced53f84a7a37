//! Shared state types for the automation loops.
//!
//! Every loop reports an [`Outcome`]. The purchase engine walks through
//! [`BuyState`]; the plot loop mutates a [`PlotState`] from hotkey actions.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::automation::config::PlotConfig;
use crate::error::AutomationError;
use crate::hotkey::{
    HotkeyAction, HotkeyError, HotkeyRegistry, HotkeySubscription, CANCEL_BINDINGS,
};

pub const MSG_STOPPED: &str = "操作停止";
pub const MSG_COMPLETE: &str = "操作完成";
pub const MSG_SUCCESS: &str = "操作成功";
pub const MSG_PLOT_FINISHED: &str = "结束自动播放";

/// How a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Done,
    Stopped,
    Failed,
    /// Cloud OCR needs new keys before the operation can be retried.
    RefreshCredentials,
}

/// Result of one operation: a success flag and a message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
    pub kind: OutcomeKind,
}

impl Outcome {
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            kind: OutcomeKind::Done,
        }
    }

    pub fn stopped() -> Self {
        Self {
            success: false,
            message: MSG_STOPPED.to_string(),
            kind: OutcomeKind::Stopped,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            kind: OutcomeKind::Failed,
        }
    }

    pub fn refresh_credentials() -> Self {
        Self {
            success: false,
            message: "<refresh_access_token>".to_string(),
            kind: OutcomeKind::RefreshCredentials,
        }
    }
}

impl From<AutomationError> for Outcome {
    fn from(error: AutomationError) -> Self {
        match error {
            AutomationError::Ocr(crate::ocr::OcrError::NeedsCredentialRefresh) => {
                Outcome::refresh_credentials()
            }
            other => Outcome::failed(other.to_string()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.success, self.message)
    }
}

/// Stop flag shared by the operator and every loop it starts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// ESC subscription plus the operator's stop token.
pub struct CancelWatch {
    subscription: Box<dyn HotkeySubscription>,
    stop: CancelToken,
    escaped: bool,
}

impl CancelWatch {
    pub fn register(hotkeys: &dyn HotkeyRegistry, stop: CancelToken) -> Result<Self, HotkeyError> {
        Ok(Self {
            subscription: hotkeys.register(&CANCEL_BINDINGS)?,
            stop,
            escaped: false,
        })
    }

    /// Drains pending key presses and reports whether the run should stop.
    pub fn requested(&mut self) -> bool {
        if self.subscription.poll().contains(&HotkeyAction::Cancel) {
            tracing::info!("ESC pressed, stopping");
            self.escaped = true;
        }
        self.escaped || self.stop.is_cancelled()
    }
}

/// Shop category to buy from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shelf {
    /// Furnishings; repeatable, quantity capped per purchase
    Stuff,
    /// Blueprints; one unlock each
    Blueprint,
}

impl FromStr for Shelf {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stuff" => Ok(Shelf::Stuff),
            "blueprint" => Ok(Shelf::Blueprint),
            other => Err(AutomationError::InvalidShelf(other.to_string())),
        }
    }
}

impl fmt::Display for Shelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shelf::Stuff => write!(f, "stuff"),
            Shelf::Blueprint => write!(f, "blueprint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    /// The first row did not change after a scroll
    ListEnd,
    /// The status label reported that nothing more can be bought
    SoldOut,
}

/// Purchase engine states.
#[derive(Debug, Clone, PartialEq)]
pub enum BuyState {
    /// Capture the list and recognize its rows
    Scanning,
    /// Walk the recognized rows and buy what is still needed
    Matching(Vec<crate::ocr::DetectedItem>),
    CheckingCompletion,
    Scrolling,
    /// Read the status label after a scroll
    ProbingSoldOut,
    Complete,
    Exhausted(ExhaustReason),
    Cancelled,
    Failed(String),
}

impl BuyState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuyState::Complete | BuyState::Exhausted(_) | BuyState::Cancelled | BuyState::Failed(_)
        )
    }
}

impl fmt::Display for BuyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuyState::Scanning => write!(f, "Scanning"),
            BuyState::Matching(rows) => write!(f, "Matching {} rows", rows.len()),
            BuyState::CheckingCompletion => write!(f, "Checking completion"),
            BuyState::Scrolling => write!(f, "Scrolling"),
            BuyState::ProbingSoldOut => write!(f, "Probing sold out"),
            BuyState::Complete => write!(f, "Complete"),
            BuyState::Exhausted(ExhaustReason::ListEnd) => write!(f, "Exhausted: list end"),
            BuyState::Exhausted(ExhaustReason::SoldOut) => write!(f, "Exhausted: sold out"),
            BuyState::Cancelled => write!(f, "Cancelled"),
            BuyState::Failed(msg) => write!(f, "Failed: {}", msg),
        }
    }
}

/// Plot loop controls, changed only through hotkey actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotState {
    pub paused: bool,
    pub stopped: bool,
    pub delay: Duration,
    step: Duration,
    max: Duration,
}

impl PlotState {
    pub fn new(config: &PlotConfig) -> Self {
        let max = Duration::from_millis(config.max_delay_ms);
        Self {
            paused: false,
            stopped: false,
            delay: Duration::from_millis(config.initial_delay_ms).min(max),
            step: Duration::from_millis(config.delay_step_ms),
            max,
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        tracing::info!("{}播放剧情", if self.paused { "[暂停]" } else { "[继续]" });
    }

    pub fn stop(&mut self) {
        self.stopped = true;
        tracing::info!("[停止]播放剧情");
    }

    pub fn speed_up(&mut self) {
        self.delay = self.delay.saturating_sub(self.step);
        tracing::debug!("Plot delay: {:?}", self.delay);
    }

    pub fn slow_down(&mut self) {
        self.delay = (self.delay + self.step).min(self.max);
        tracing::debug!("Plot delay: {:?}", self.delay);
    }

    pub fn apply(&mut self, action: HotkeyAction) {
        match action {
            HotkeyAction::TogglePause => self.toggle_pause(),
            HotkeyAction::Stop | HotkeyAction::Cancel => self.stop(),
            HotkeyAction::SlowDown => self.slow_down(),
            HotkeyAction::SpeedUp => self.speed_up(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::Key;
    use crate::ocr::OcrError;
    use crate::testing::ScriptedHotkeys;

    #[test]
    fn test_shelf_from_str() {
        assert_eq!("stuff".parse::<Shelf>().unwrap(), Shelf::Stuff);
        assert_eq!("blueprint".parse::<Shelf>().unwrap(), Shelf::Blueprint);
        assert!(matches!(
            "furniture".parse::<Shelf>(),
            Err(AutomationError::InvalidShelf(s)) if s == "furniture"
        ));
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_cancel_watch_releases_escape_on_drop() {
        let hotkeys = ScriptedHotkeys::new(vec![vec![], vec![HotkeyAction::Cancel]]);
        let stop = CancelToken::new();
        {
            let mut watch = CancelWatch::register(&hotkeys, stop.clone()).unwrap();
            assert_eq!(hotkeys.bound(), vec![Key::Escape]);
            assert!(CancelWatch::register(&hotkeys, stop.clone()).is_err());
            assert!(!watch.requested());
            assert!(watch.requested());
            assert!(watch.requested());
        }
        assert!(hotkeys.bound().is_empty());
    }

    #[test]
    fn test_cancel_watch_follows_stop_token() {
        let hotkeys = ScriptedHotkeys::default();
        let stop = CancelToken::new();
        let mut watch = CancelWatch::register(&hotkeys, stop.clone()).unwrap();
        assert!(!watch.requested());
        stop.cancel();
        assert!(watch.requested());
    }

    #[test]
    fn test_outcome_from_credential_error() {
        let outcome: Outcome = AutomationError::Ocr(OcrError::NeedsCredentialRefresh).into();
        assert_eq!(outcome.kind, OutcomeKind::RefreshCredentials);
        assert!(!outcome.success);

        let outcome: Outcome = AutomationError::EmptyScan.into();
        assert_eq!(outcome.kind, OutcomeKind::Failed);
        assert_eq!(outcome.message, "(っ °Д °;)っ解析结果是空的");
    }

    #[test]
    fn test_buy_state_display() {
        assert_eq!(BuyState::Scanning.to_string(), "Scanning");
        assert_eq!(
            BuyState::Exhausted(ExhaustReason::SoldOut).to_string(),
            "Exhausted: sold out"
        );
        assert!(BuyState::Cancelled.is_terminal());
        assert!(!BuyState::Scrolling.is_terminal());
    }

    #[test]
    fn test_plot_delay_is_clamped() {
        let mut state = PlotState::new(&PlotConfig::default());
        assert_eq!(state.delay, Duration::from_millis(100));

        state.speed_up();
        assert_eq!(state.delay, Duration::ZERO);

        for _ in 0..10 {
            state.slow_down();
        }
        assert_eq!(state.delay, Duration::from_secs(2));
    }

    #[test]
    fn test_plot_state_applies_actions() {
        let mut state = PlotState::new(&PlotConfig::default());
        state.apply(HotkeyAction::TogglePause);
        assert!(state.paused);
        state.apply(HotkeyAction::TogglePause);
        assert!(!state.paused);
        state.apply(HotkeyAction::SlowDown);
        assert_eq!(state.delay, Duration::from_millis(500));
        state.apply(HotkeyAction::Stop);
        assert!(state.stopped);
    }
}
