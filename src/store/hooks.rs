//! Side-effect hooks fired by the config store
//!
//! Login-item registration, hotkey binding and the tray process live outside
//! the store. The store only tells them when persisted settings changed.

use tracing::info;

/// Collaborators notified after a successful flush.
///
/// Implementations must be cheap to call repeatedly: `reload_hotkeys` and
/// `restart_tray_process` run on every flush without diffing.
pub trait StoreHooks: Send + Sync {
    /// Register or unregister the application as a login item.
    /// Called only when the persisted `open_login` value actually changed.
    /// Must not flush a login change itself: concurrent calls are serialized.
    fn set_login_item(&self, enabled: bool);

    /// Rebind global hotkeys from the current config.
    fn reload_hotkeys(&self);

    /// Restart the tray process so it picks up new settings.
    fn restart_tray_process(&self, forced: bool);
}

/// Hooks that do nothing, for headless use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl StoreHooks for NoopHooks {
    fn set_login_item(&self, _enabled: bool) {}
    fn reload_hotkeys(&self) {}
    fn restart_tray_process(&self, _forced: bool) {}
}

/// Hooks that only report what would have happened.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl StoreHooks for LoggingHooks {
    fn set_login_item(&self, enabled: bool) {
        info!(enabled, "Login item change requested");
    }

    fn reload_hotkeys(&self) {
        info!("Hotkey reload requested");
    }

    fn restart_tray_process(&self, forced: bool) {
        info!(forced, "Tray restart requested");
    }
}

/// Callback run once after the first successful config load.
pub type PostLoadHook = Box<dyn FnOnce() + Send>;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::StoreHooks;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HookCall {
        SetLoginItem(bool),
        ReloadHotkeys,
        RestartTrayProcess(bool),
    }

    /// Records every hook invocation in order.
    #[derive(Debug, Default)]
    pub struct RecordingHooks {
        calls: Mutex<Vec<HookCall>>,
    }

    impl RecordingHooks {
        pub fn calls(&self) -> Vec<HookCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, call: &HookCall) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
        }

        pub fn login_item_calls(&self) -> Vec<bool> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|c| match c {
                    HookCall::SetLoginItem(enabled) => Some(*enabled),
                    _ => None,
                })
                .collect()
        }
    }

    impl StoreHooks for RecordingHooks {
        fn set_login_item(&self, enabled: bool) {
            self.calls.lock().unwrap().push(HookCall::SetLoginItem(enabled));
        }

        fn reload_hotkeys(&self) {
            self.calls.lock().unwrap().push(HookCall::ReloadHotkeys);
        }

        fn restart_tray_process(&self, forced: bool) {
            self.calls
                .lock()
                .unwrap()
                .push(HookCall::RestartTrayProcess(forced));
        }
    }
}
