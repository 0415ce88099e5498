//! Windows low-level keyboard hook.
//!
//! The hook is installed on its own thread, which pumps messages until
//! uninstall posts WM_QUIT. The hook procedure runs synchronously for every
//! key transition system-wide: it forwards key-downs to the dispatch channel
//! and swallows the key when the intercept gate says so. Panics are caught at
//! the FFI boundary.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::bounded;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use windows::Win32::{
    Foundation::*,
    System::LibraryLoader::GetModuleHandleW,
    System::Threading::GetCurrentThreadId,
    UI::WindowsAndMessaging::*,
};

use q9_core::InterceptGate;

use super::{join_bounded, Input, InputSender, KeyEvent, KeySource};

struct HookTarget {
    sink: InputSender,
    gate: Arc<InterceptGate>,
}

static HOOK_TARGET: Mutex<Option<HookTarget>> = Mutex::new(None);

/// `KeySource` backed by `WH_KEYBOARD_LL`.
pub struct LowLevelHook {
    thread: Option<JoinHandle<()>>,
    thread_id: u32,
}

impl LowLevelHook {
    pub fn new() -> Self {
        Self {
            thread: None,
            thread_id: 0,
        }
    }
}

impl Default for LowLevelHook {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for LowLevelHook {
    fn install(&mut self, sink: InputSender, gate: Arc<InterceptGate>) -> Result<()> {
        if self.thread.is_some() {
            return Err(anyhow!("keyboard hook already installed"));
        }
        set_target(Some(HookTarget { sink, gate }));

        let (ready_tx, ready_rx) = bounded::<Result<u32, String>>(1);
        let thread = std::thread::Builder::new()
            .name("q9-keyboard-hook".into())
            .spawn(move || hook_thread(ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                info!(thread_id, "keyboard hook installed");
                self.thread_id = thread_id;
                self.thread = Some(thread);
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = thread.join();
                set_target(None);
                Err(anyhow!(message)).context("SetWindowsHookExW failed")
            }
            Err(_) => {
                set_target(None);
                Err(anyhow!("keyboard hook thread exited during install"))
            }
        }
    }

    fn uninstall(&mut self, timeout: Duration) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        unsafe {
            if let Err(e) = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) {
                warn!("failed to post WM_QUIT to hook thread: {e}");
            }
        }
        if join_bounded(thread, timeout) {
            info!("keyboard hook removed");
        } else {
            warn!("keyboard hook thread did not stop in time");
        }
        set_target(None);
    }

    fn name(&self) -> &'static str {
        "windows-hook"
    }
}

impl Drop for LowLevelHook {
    fn drop(&mut self) {
        self.uninstall(Duration::from_millis(500));
    }
}

fn set_target(target: Option<HookTarget>) {
    match HOOK_TARGET.lock() {
        Ok(mut guard) => *guard = target,
        Err(poisoned) => *poisoned.into_inner() = target,
    }
}

fn hook_thread(ready: crossbeam_channel::Sender<Result<u32, String>>) {
    let hook = unsafe {
        let module = match GetModuleHandleW(None) {
            Ok(module) => module,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };
        match SetWindowsHookExW(WH_KEYBOARD_LL, Some(low_level_keyboard_proc), module, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        }
    };
    let _ = ready.send(Ok(unsafe { GetCurrentThreadId() }));

    unsafe {
        let mut msg = MSG::default();
        // 0 on WM_QUIT, -1 on error
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
        if let Err(e) = UnhookWindowsHookEx(hook) {
            error!("UnhookWindowsHookEx failed: {e}");
        }
    }
    debug!("hook message loop finished");
}

/// Forward a transition; returns true when the key must be swallowed.
fn handle_transition(vk_code: u32, is_key_down: bool) -> bool {
    let guard = match HOOK_TARGET.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let Some(target) = guard.as_ref() else {
        return false;
    };
    let intercept = target.gate.should_intercept(vk_code);
    if intercept && is_key_down {
        let _ = target.sink.send(Input::Key(KeyEvent::down(vk_code)));
    }
    // key-up of an intercepted key is swallowed too, never forwarded
    intercept
}

unsafe extern "system" fn low_level_keyboard_proc(
    ncode: i32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let result = catch_unwind(AssertUnwindSafe(|| {
        if ncode < 0 || lparam.0 == 0 {
            return None;
        }
        let kb = unsafe { *(lparam.0 as *const KBDLLHOOKSTRUCT) };
        let message = wparam.0 as u32;
        let is_key_down = message == WM_KEYDOWN || message == WM_SYSKEYDOWN;
        handle_transition(kb.vkCode, is_key_down).then_some(LRESULT(1))
    }));

    match result {
        Ok(Some(swallowed)) => swallowed,
        Ok(None) => unsafe { CallNextHookEx(None, ncode, wparam, lparam) },
        Err(_) => {
            error!("panic in keyboard hook procedure");
            unsafe { CallNextHookEx(None, ncode, wparam, lparam) }
        }
    }
}
