//! Global hotkeys with scoped registration.
//!
//! A loop registers the keys it listens to when it starts and gets back a
//! [`HotkeySubscription`]. Dropping the subscription unregisters every key,
//! so a loop that returns early or fails cannot leak a binding.

use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, Once, OnceLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("failed to create hotkey manager: {0}")]
    Manager(String),

    #[error("failed to register {key}: {reason}")]
    Registration { key: Key, reason: String },

    #[error("{0} is already bound by another loop")]
    AlreadyBound(Key),
}

/// Keys the loops listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    CapsLock,
    AltQ,
    ArrowLeft,
    ArrowRight,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Key::Escape => "ESC",
            Key::CapsLock => "CAPSLOCK",
            Key::AltQ => "ALT+Q",
            Key::ArrowLeft => "LEFT",
            Key::ArrowRight => "RIGHT",
        };
        f.write_str(name)
    }
}

impl Key {
    fn to_hotkey(self) -> HotKey {
        match self {
            Key::Escape => HotKey::new(None, Code::Escape),
            Key::CapsLock => HotKey::new(None, Code::CapsLock),
            Key::AltQ => HotKey::new(Some(Modifiers::ALT), Code::KeyQ),
            Key::ArrowLeft => HotKey::new(None, Code::ArrowLeft),
            Key::ArrowRight => HotKey::new(None, Code::ArrowRight),
        }
    }
}

/// What a key press means to the loop that bound it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Cancel,
    TogglePause,
    Stop,
    SlowDown,
    SpeedUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub key: Key,
    pub action: HotkeyAction,
}

impl HotkeyBinding {
    pub const fn new(key: Key, action: HotkeyAction) -> Self {
        Self { key, action }
    }
}

/// ESC cancels a purchase or cooking run.
pub const CANCEL_BINDINGS: [HotkeyBinding; 1] =
    [HotkeyBinding::new(Key::Escape, HotkeyAction::Cancel)];

/// Plot loop controls.
pub const PLOT_BINDINGS: [HotkeyBinding; 4] = [
    HotkeyBinding::new(Key::CapsLock, HotkeyAction::TogglePause),
    HotkeyBinding::new(Key::AltQ, HotkeyAction::Stop),
    HotkeyBinding::new(Key::ArrowLeft, HotkeyAction::SlowDown),
    HotkeyBinding::new(Key::ArrowRight, HotkeyAction::SpeedUp),
];

/// Live registration; keys are released when it is dropped.
pub trait HotkeySubscription {
    /// Actions triggered since the last poll, oldest first. Never blocks.
    fn poll(&mut self) -> Vec<HotkeyAction>;
}

pub trait HotkeyRegistry: Send + Sync {
    fn register(
        &self,
        bindings: &[HotkeyBinding],
    ) -> Result<Box<dyn HotkeySubscription>, HotkeyError>;
}

/// Routes from hotkey id to the subscription that owns it.
type RouteTable = Mutex<HashMap<u32, (Sender<HotkeyAction>, HotkeyAction)>>;

fn routes() -> &'static RouteTable {
    static ROUTES: OnceLock<RouteTable> = OnceLock::new();
    ROUTES.get_or_init(|| Mutex::new(HashMap::new()))
}

fn install_event_handler() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        GlobalHotKeyEvent::set_event_handler(Some(|event: GlobalHotKeyEvent| {
            if event.state != HotKeyState::Pressed {
                return;
            }
            let table = routes().lock().unwrap_or_else(|e| e.into_inner());
            if let Some((sender, action)) = table.get(&event.id) {
                let _ = sender.send(*action);
            }
        }));
    });
}

/// OS-level hotkeys through `global-hotkey`.
#[derive(Debug, Default)]
pub struct GlobalHotkeys;

impl HotkeyRegistry for GlobalHotkeys {
    fn register(
        &self,
        bindings: &[HotkeyBinding],
    ) -> Result<Box<dyn HotkeySubscription>, HotkeyError> {
        install_event_handler();
        let manager = GlobalHotKeyManager::new().map_err(|e| HotkeyError::Manager(e.to_string()))?;
        let (sender, receiver) = mpsc::channel();

        let mut table = routes().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(taken) = bindings
            .iter()
            .find(|b| table.contains_key(&b.key.to_hotkey().id()))
        {
            return Err(HotkeyError::AlreadyBound(taken.key));
        }

        let mut registered: Vec<(HotKey, Key)> = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let hotkey = binding.key.to_hotkey();
            if let Err(e) = manager.register(hotkey) {
                for (done, _) in &registered {
                    table.remove(&done.id());
                    let _ = manager.unregister(*done);
                }
                return Err(HotkeyError::Registration {
                    key: binding.key,
                    reason: e.to_string(),
                });
            }
            table.insert(hotkey.id(), (sender.clone(), binding.action));
            registered.push((hotkey, binding.key));
        }
        drop(table);

        tracing::debug!(
            "Hotkeys bound: {}",
            registered
                .iter()
                .map(|(_, key)| key.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Box::new(GlobalSubscription {
            manager,
            hotkeys: registered,
            receiver,
        }))
    }
}

struct GlobalSubscription {
    manager: GlobalHotKeyManager,
    hotkeys: Vec<(HotKey, Key)>,
    receiver: Receiver<HotkeyAction>,
}

impl HotkeySubscription for GlobalSubscription {
    fn poll(&mut self) -> Vec<HotkeyAction> {
        pump_messages();
        self.receiver.try_iter().collect()
    }
}

impl Drop for GlobalSubscription {
    fn drop(&mut self) {
        let mut table = routes().lock().unwrap_or_else(|e| e.into_inner());
        for (hotkey, key) in &self.hotkeys {
            table.remove(&hotkey.id());
            if let Err(e) = self.manager.unregister(*hotkey) {
                tracing::warn!("Failed to unregister {}: {}", key, e);
            }
        }
        tracing::debug!("Hotkeys released ({})", self.hotkeys.len());
    }
}

/// Hotkey messages are posted to the thread that created the manager, so the
/// polling thread has to drain its own message queue.
#[cfg(windows)]
fn pump_messages() {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    let mut msg = MSG::default();
    unsafe {
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(not(windows))]
fn pump_messages() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        assert_eq!(Key::AltQ.to_string(), "ALT+Q");
        assert_eq!(Key::Escape.to_string(), "ESC");
    }

    #[test]
    fn test_hotkey_ids_are_distinct() {
        let ids: std::collections::HashSet<u32> = PLOT_BINDINGS
            .iter()
            .chain(CANCEL_BINDINGS.iter())
            .map(|b| b.key.to_hotkey().id())
            .collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_plot_bindings_cover_every_control() {
        let actions: Vec<HotkeyAction> = PLOT_BINDINGS.iter().map(|b| b.action).collect();
        assert!(actions.contains(&HotkeyAction::TogglePause));
        assert!(actions.contains(&HotkeyAction::Stop));
        assert!(actions.contains(&HotkeyAction::SlowDown));
        assert!(actions.contains(&HotkeyAction::SpeedUp));
    }
}
