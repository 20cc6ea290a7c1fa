//! Child processes started on behalf of the model or a validator.
//!
//! Every child runs in its own process group with `kill_on_drop`. While a
//! [`ProcessGroupGuard`] is armed, dropping it kills the whole group, so an
//! abandoned execution (timeout, deadline, task abort) leaves nothing behind.
//! Once the child has been reaped the guard is disarmed and sends nothing.

use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Builds a command with piped output, no stdin and its own process group.
pub(crate) fn command(program: &str, args: &[String], cwd: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Kills a child's process group when dropped while armed.
#[derive(Debug)]
pub(crate) struct ProcessGroupGuard {
    #[cfg(unix)]
    pgid: Option<nix::unistd::Pid>,
}

impl ProcessGroupGuard {
    /// Arms a guard for the group led by `child_id`.
    pub(crate) fn new(child_id: Option<u32>) -> Self {
        #[cfg(not(unix))]
        let _ = child_id;
        Self {
            #[cfg(unix)]
            pgid: child_id
                .and_then(|id| i32::try_from(id).ok())
                .map(nix::unistd::Pid::from_raw),
        }
    }

    /// Stops the guard from signalling. Call once the child has been reaped:
    /// its process group id may then be reused by an unrelated process.
    pub(crate) fn disarm(&mut self) {
        #[cfg(unix)]
        {
            self.pgid = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        #[cfg(unix)]
        {
            self.pgid.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

#[cfg(unix)]
impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            // ESRCH means the group is already gone.
            let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn disarmed_guard_no_longer_targets_the_group() {
        let mut guard = ProcessGroupGuard::new(Some(4242));
        assert!(guard.is_armed());
        guard.disarm();
        assert!(!guard.is_armed());
    }

    #[test]
    fn missing_child_id_is_unarmed() {
        assert!(!ProcessGroupGuard::new(None).is_armed());
    }

    #[tokio::test]
    async fn dropping_an_armed_guard_kills_background_members() {
        let dir = TempDir::new().unwrap();
        let script = "(sleep 1; touch late.txt) & wait".to_string();
        let child = command("sh", &["-c".to_string(), script], dir.path())
            .spawn()
            .unwrap();

        let guard = ProcessGroupGuard::new(child.id());
        let waited =
            tokio::time::timeout(Duration::from_millis(200), child.wait_with_output()).await;
        assert!(waited.is_err());
        drop(guard);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("late.txt").exists());
    }
}
