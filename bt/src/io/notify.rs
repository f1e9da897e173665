//! Optional notification hook (`BT_NOTIFY_HOOK`).

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Run `hook` with `message` as its single argument. Failures are logged, never fatal.
///
/// The hook's output is captured and logged, so it never mixes with bt's own.
pub fn notify(hook: Option<&str>, workdir: &Path, message: &str) {
    let Some(hook) = hook else {
        return;
    };
    let output = Command::new("sh")
        .arg("-c")
        .arg(format!("{hook} \"$1\""))
        .arg("bt-notify")
        .arg(message)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .output();
    match output {
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if output.status.success() {
                debug!(hook, stdout = %stdout.trim(), stderr = %stderr.trim(), "notify hook ran");
            } else {
                warn!(hook, code = ?output.status.code(), stderr = %stderr.trim(), "notify hook failed");
            }
        }
        Err(err) => warn!(hook, err = %err, "notify hook could not be started"),
    }
}
