//! Test doubles for the screen driver, OCR and hotkeys.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::capture::{Point, Rect, ScreenDriver};
use crate::hotkey::{
    HotkeyAction, HotkeyBinding, HotkeyError, HotkeyRegistry, HotkeySubscription, Key,
};
use crate::ocr::{DetectedItem, OcrError, OcrProvider, ScanMode, ScanOutput};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Click(Point),
    MoveTo(Point),
    Scroll(i32),
    Capture(Rect),
    Wait(f32),
}

/// Records every action instead of touching the screen.
pub struct FakeDriver {
    running: bool,
    foreground: AtomicBool,
    actions: Mutex<Vec<Action>>,
    captures: Mutex<VecDeque<Vec<u8>>>,
    default_capture: Vec<u8>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            running: true,
            foreground: AtomicBool::new(true),
            actions: Mutex::new(Vec::new()),
            captures: Mutex::new(VecDeque::new()),
            default_capture: b"png".to_vec(),
        }
    }

    pub fn not_running() -> Self {
        Self {
            running: false,
            ..Self::new()
        }
    }

    /// Captures are served in order, then `last` forever.
    pub fn with_captures(self, captures: Vec<Vec<u8>>, last: Vec<u8>) -> Self {
        Self {
            captures: Mutex::new(captures.into()),
            default_capture: last,
            ..self
        }
    }

    pub fn set_foreground(&self, value: bool) {
        self.foreground.store(value, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Click(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, action: &Action) -> usize {
        self.actions().iter().filter(|a| *a == action).count()
    }

    fn push(&self, action: Action) {
        self.actions.lock().unwrap().push(action);
    }
}

impl ScreenDriver for FakeDriver {
    fn window_title(&self) -> &str {
        "原神"
    }

    fn activate_window(&self) -> bool {
        self.running
    }

    fn is_foreground(&self) -> bool {
        self.running && self.foreground.load(Ordering::SeqCst)
    }

    fn click(&self, at: Point) -> anyhow::Result<()> {
        self.push(Action::Click(at));
        Ok(())
    }

    fn move_to(&self, at: Point) -> anyhow::Result<()> {
        self.push(Action::MoveTo(at));
        Ok(())
    }

    fn scroll(&self, count: i32, _duration: Option<Duration>) -> anyhow::Result<()> {
        self.push(Action::Scroll(count));
        Ok(())
    }

    fn capture_region(&self, rect: Rect) -> anyhow::Result<Vec<u8>> {
        self.push(Action::Capture(rect));
        let next = self.captures.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.default_capture.clone()))
    }

    fn wait(&self, multiple: f32) {
        self.push(Action::Wait(multiple));
    }
}

/// Serves queued results per scan mode. An exhausted queue yields nothing.
pub struct ScriptedOcr {
    detailed: Mutex<VecDeque<Result<Vec<DetectedItem>, OcrError>>>,
    text: Mutex<VecDeque<Vec<String>>>,
    needs_credentials: bool,
    scans: Mutex<Vec<ScanMode>>,
}

impl ScriptedOcr {
    pub fn new() -> Self {
        Self {
            detailed: Mutex::new(VecDeque::new()),
            text: Mutex::new(VecDeque::new()),
            needs_credentials: false,
            scans: Mutex::new(Vec::new()),
        }
    }

    pub fn detailed(mut self, rows: Vec<DetectedItem>) -> Self {
        self.detailed.get_mut().unwrap().push_back(Ok(rows));
        self
    }

    pub fn detailed_error(mut self, error: OcrError) -> Self {
        self.detailed.get_mut().unwrap().push_back(Err(error));
        self
    }

    pub fn text(mut self, lines: &[&str]) -> Self {
        self.text
            .get_mut()
            .unwrap()
            .push_back(lines.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn requiring_credentials(self) -> Self {
        Self {
            needs_credentials: true,
            ..self
        }
    }

    pub fn scans(&self) -> Vec<ScanMode> {
        self.scans.lock().unwrap().clone()
    }
}

impl OcrProvider for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    fn needs_credentials(&self) -> bool {
        self.needs_credentials
    }

    fn scan(&self, _image: &[u8], mode: ScanMode, _downscale: f32) -> Result<ScanOutput, OcrError> {
        self.scans.lock().unwrap().push(mode);
        match mode {
            ScanMode::Detailed => self
                .detailed
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Vec::new()))
                .map(ScanOutput::Detailed),
            ScanMode::Text => Ok(ScanOutput::Text(
                self.text.lock().unwrap().pop_front().unwrap_or_default(),
            )),
        }
    }
}

/// A list row at `top` inside the captured list region.
pub fn row(text: &str, top: i32) -> DetectedItem {
    DetectedItem::from_box(10, top, 100, 40, text, 0.9)
}

/// Hands out one scripted batch of actions per poll, shared by every
/// subscription. Tracks bound keys the way the OS registry does.
#[derive(Clone, Default)]
pub struct ScriptedHotkeys {
    script: Arc<Mutex<VecDeque<Vec<HotkeyAction>>>>,
    bound: Arc<Mutex<Vec<Key>>>,
}

impl ScriptedHotkeys {
    pub fn new(batches: Vec<Vec<HotkeyAction>>) -> Self {
        Self {
            script: Arc::new(Mutex::new(batches.into())),
            bound: Arc::default(),
        }
    }

    pub fn bound(&self) -> Vec<Key> {
        self.bound.lock().unwrap().clone()
    }
}

impl HotkeyRegistry for ScriptedHotkeys {
    fn register(
        &self,
        bindings: &[HotkeyBinding],
    ) -> Result<Box<dyn HotkeySubscription>, HotkeyError> {
        let mut bound = self.bound.lock().unwrap();
        if let Some(taken) = bindings.iter().find(|b| bound.contains(&b.key)) {
            return Err(HotkeyError::AlreadyBound(taken.key));
        }
        let keys: Vec<Key> = bindings.iter().map(|b| b.key).collect();
        bound.extend(keys.iter().copied());
        Ok(Box::new(ScriptedSubscription {
            script: self.script.clone(),
            bound: self.bound.clone(),
            keys,
        }))
    }
}

struct ScriptedSubscription {
    script: Arc<Mutex<VecDeque<Vec<HotkeyAction>>>>,
    bound: Arc<Mutex<Vec<Key>>>,
    keys: Vec<Key>,
}

impl HotkeySubscription for ScriptedSubscription {
    fn poll(&mut self) -> Vec<HotkeyAction> {
        self.script.lock().unwrap().pop_front().unwrap_or_default()
    }
}

impl Drop for ScriptedSubscription {
    fn drop(&mut self) {
        let mut bound = self.bound.lock().unwrap();
        bound.retain(|k| !self.keys.contains(k));
    }
}
