use crate::error::AppError;
use log::{debug, error, warn};
use std::io::Write;
use std::process::{Command, Stdio};

pub const COPY_FAILED_MESSAGE: &str = "Failed to copy content. Please manually copy the text.";

/// Anything that can put text on the system clipboard.
pub trait ClipboardBackend: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), String>;
}

/// Try the primary clipboard, then the fallback. Only a double failure is an error.
pub fn copy_with_fallback(
    primary: &dyn ClipboardBackend,
    fallback: &dyn ClipboardBackend,
    text: &str,
) -> Result<(), AppError> {
    let primary_err = match primary.write_text(text) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    warn!("Clipboard write failed, trying fallback: {}", primary_err);

    fallback.write_text(text).map_err(|fallback_err| {
        error!("Fallback copy failed: {}", fallback_err);
        AppError::Clipboard(COPY_FAILED_MESSAGE.to_string())
    })
}

/// Candidate command-line clipboard writers for this platform, in preference order.
fn clipboard_commands() -> Vec<(&'static str, Vec<&'static str>)> {
    #[cfg(target_os = "macos")]
    {
        vec![("pbcopy", vec![])]
    }
    #[cfg(target_os = "windows")]
    {
        vec![("clip", vec![])]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let mut commands = Vec::new();
        if std::env::var("WAYLAND_DISPLAY").is_ok() {
            commands.push(("wl-copy", vec![]));
        }
        commands.push(("xclip", vec!["-selection", "clipboard"]));
        commands.push(("xsel", vec!["--clipboard", "--input"]));
        commands
    }
}

/// `wl-copy` and `xclip` fork a process that keeps serving the selection, so
/// no output pipe is held open and only the direct child is waited on.
fn pipe_to_command(program: &str, args: &[&str], text: &str) -> Result<(), String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("Failed to execute {}: {}", program, e))?;

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| format!("{} has no stdin", program))?;
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| format!("Failed to write to {}: {}", program, e))?;
    }

    let status = child
        .wait()
        .map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
    if !status.success() {
        return Err(format!("{} exited with {}", program, status));
    }
    Ok(())
}

/// Copies through the platform's command-line clipboard tool.
pub struct SystemCommandClipboard;

impl ClipboardBackend for SystemCommandClipboard {
    fn write_text(&self, text: &str) -> Result<(), String> {
        let mut last_error = "No clipboard command available".to_string();
        for (program, args) in clipboard_commands() {
            match pipe_to_command(program, &args, text) {
                Ok(()) => {
                    debug!("Copied {} chars via {}", text.len(), program);
                    return Ok(());
                }
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}

#[cfg(feature = "desktop")]
pub use plugin::PluginClipboard;

#[cfg(feature = "desktop")]
mod plugin {
    use super::ClipboardBackend;
    use tauri::AppHandle;
    use tauri_plugin_clipboard_manager::ClipboardExt;

    /// The clipboard-manager plugin, the primary copy path in the desktop app.
    pub struct PluginClipboard {
        app_handle: AppHandle,
    }

    impl PluginClipboard {
        pub fn new(app_handle: &AppHandle) -> Self {
            Self {
                app_handle: app_handle.clone(),
            }
        }
    }

    impl ClipboardBackend for PluginClipboard {
        fn write_text(&self, text: &str) -> Result<(), String> {
            self.app_handle
                .clipboard()
                .write_text(text)
                .map_err(|e| format!("Failed to write to clipboard: {}", e))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every successful write; fails when told to.
    #[derive(Default)]
    pub(crate) struct MockClipboard {
        pub should_fail: bool,
        pub written: Mutex<Vec<String>>,
    }

    impl MockClipboard {
        pub(crate) fn that_fails() -> Self {
            Self {
                should_fail: true,
                ..Default::default()
            }
        }

        pub(crate) fn writes(&self) -> Vec<String> {
            self.written.lock().unwrap().clone()
        }
    }

    impl ClipboardBackend for MockClipboard {
        fn write_text(&self, text: &str) -> Result<(), String> {
            if self.should_fail {
                return Err("mock clipboard unavailable".into());
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn primary_success_skips_fallback() {
        let primary = MockClipboard::default();
        let fallback = MockClipboard::default();
        copy_with_fallback(&primary, &fallback, "Subject: Partnership").unwrap();
        assert_eq!(primary.writes(), vec!["Subject: Partnership"]);
        assert!(fallback.writes().is_empty());
    }

    #[test]
    fn primary_failure_uses_fallback() {
        let primary = MockClipboard::that_fails();
        let fallback = MockClipboard::default();
        copy_with_fallback(&primary, &fallback, "Subject: Partnership").unwrap();
        assert_eq!(fallback.writes(), vec!["Subject: Partnership"]);
    }

    #[test]
    fn double_failure_is_a_clipboard_error() {
        let err = copy_with_fallback(
            &MockClipboard::that_fails(),
            &MockClipboard::that_fails(),
            "Subject: Partnership",
        )
        .unwrap_err();
        assert_eq!(err, AppError::Clipboard(COPY_FAILED_MESSAGE.to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn command_that_forks_a_selection_owner_returns_promptly() {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let script = "cat >/dev/null; sleep 20 & exit 0";
            let _ = tx.send(pipe_to_command("sh", &["-c", script], "Subject: Partnership"));
        });

        let outcome = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("clipboard command still blocked after 5s");
        assert_eq!(outcome, Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_its_exit_status() {
        let err = pipe_to_command("sh", &["-c", "cat >/dev/null; exit 3"], "Subject: Partnership")
            .unwrap_err();
        assert!(err.contains("exited with"), "{}", err);
    }
}
