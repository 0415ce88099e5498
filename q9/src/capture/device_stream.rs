//! Capture through a privileged helper process.
//!
//! Reading `/dev/input` needs elevated rights, so the main process starts
//! `q9 hook-helper` through a launcher (`sudo` by default) and reads its
//! stdout. Threads:
//! - reader: helper stdout → `Input::Key`, `Input::SourceClosed` at EOF
//! - control: mirrors the `InterceptGate` state to helper stdin; dropping
//!   stdin at shutdown makes the helper release the device
//!
//! On Unix the helper leads its own process group. Shutdown signals the
//! whole group, so nothing the launcher started outlives `uninstall`.

use anyhow::{bail, Context};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use std::os::unix::process::CommandExt;

use q9_core::InterceptGate;

use super::protocol::{control_lines, parse_key_line};
use super::{join_bounded, Input, InputSender, KeyEvent, KeySource};

const CONTROL_POLL: Duration = Duration::from_millis(50);

/// `KeySource` backed by the device helper.
pub struct DeviceStreamSource {
    argv: Vec<String>,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    control: Option<JoinHandle<()>>,
    stop: Option<Sender<()>>,
}

impl DeviceStreamSource {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            child: None,
            reader: None,
            control: None,
            stop: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

impl KeySource for DeviceStreamSource {
    fn install(&mut self, sink: InputSender, gate: Arc<InterceptGate>) -> anyhow::Result<()> {
        let Some((program, args)) = self.argv.split_first() else {
            bail!("empty helper command");
        };
        if self.child.is_some() {
            bail!("helper already running");
        }

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start helper `{}`", self.argv.join(" ")))?;
        info!(pid = child.id(), command = %self.argv.join(" "), "device helper started");

        let stdout = child.stdout.take().context("helper stdout not captured")?;
        let stdin = child.stdin.take().context("helper stdin not captured")?;

        self.reader = Some(
            std::thread::Builder::new()
                .name("q9-helper-reader".into())
                .spawn(move || read_helper_output(stdout, sink))?,
        );

        let (stop_tx, stop_rx) = bounded::<()>(0);
        self.control = Some(
            std::thread::Builder::new()
                .name("q9-helper-control".into())
                .spawn(move || mirror_gate(stdin, &gate, stop_rx))?,
        );
        self.stop = Some(stop_tx);
        self.child = Some(child);
        Ok(())
    }

    fn uninstall(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;

        // control thread drops helper stdin when the stop channel closes
        self.stop.take();
        if let Some(control) = self.control.take() {
            if !join_bounded(control, remaining(deadline)) {
                warn!("helper control thread did not stop in time");
            }
        }

        if let Some(mut child) = self.child.take() {
            terminate(&child);
            let exited = wait_until(&mut child, deadline);
            if !exited {
                warn!(pid = child.id(), "helper did not exit in time, killing it");
            }
            // also reaches group members that ignored SIGTERM
            kill_all(&mut child);
            if !exited {
                let _ = child.wait();
            }
        }

        if let Some(reader) = self.reader.take() {
            if !join_bounded(reader, remaining(deadline)) {
                warn!("helper reader thread did not stop in time");
            }
        }
        info!("device helper stopped");
    }

    fn name(&self) -> &'static str {
        "device-stream"
    }
}

impl Drop for DeviceStreamSource {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.uninstall(Duration::from_millis(500));
        }
    }
}

fn read_helper_output(stdout: std::process::ChildStdout, sink: InputSender) {
    for line in BufReader::new(stdout).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("reading helper output failed: {e}");
                break;
            }
        };
        match parse_key_line(&line) {
            Some(code) => {
                if sink.send(Input::Key(KeyEvent::down(code))).is_err() {
                    return;
                }
            }
            None => debug!(line = %line, "helper diagnostic"),
        }
    }
    let _ = sink.send(Input::SourceClosed("device-stream"));
}

fn mirror_gate(
    mut stdin: ChildStdin,
    gate: &InterceptGate,
    stop: crossbeam_channel::Receiver<()>,
) {
    let mut sent = None;
    loop {
        let state = (gate.scheme(), gate.global_enabled());
        if sent != Some(state) {
            let mut payload = String::new();
            for line in control_lines(state.0, state.1) {
                payload.push_str(&line);
                payload.push('\n');
            }
            if let Err(e) = stdin
                .write_all(payload.as_bytes())
                .and_then(|_| stdin.flush())
            {
                warn!("helper stdin closed: {e}");
                return;
            }
            debug!(scheme = ?state.0, global = state.1, "intercept state sent to helper");
            sent = Some(state);
        }
        match stop.recv_timeout(CONTROL_POLL) {
            Err(RecvTimeoutError::Timeout) => continue,
            _ => return,
        }
    }
}

/// Ask the helper and the rest of its process group to stop.
fn terminate(child: &Child) {
    #[cfg(unix)]
    signal_group(child, Signal::SIGTERM);
    #[cfg(not(unix))]
    let _ = child;
}

/// Kill whatever is left of the helper's process group.
fn kill_all(child: &mut Child) {
    #[cfg(unix)]
    signal_group(child, Signal::SIGKILL);
    if let Err(e) = child.kill() {
        debug!("killing helper: {e}");
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: Signal) {
    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), signal) {
        // group already empty
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(signal = signal.as_str(), "signalling helper group failed: {e}"),
    }
}

fn wait_until(child: &mut Child, deadline: Instant) -> bool {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(%status, "helper exited");
                return true;
            }
            Ok(None) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(None) => return false,
            Err(e) => {
                warn!("waiting for helper failed: {e}");
                return false;
            }
        }
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use q9_core::{InputScheme, KeyMap, Platform};

    fn gate() -> Arc<InterceptGate> {
        Arc::new(InterceptGate::new(
            KeyMap::new(Platform::Linux).unwrap(),
            InputScheme::Numpad,
            true,
        ))
    }

    fn shell(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn forwards_key_lines_and_skips_diagnostics() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut source = DeviceStreamSource::new(shell(
            "echo 'grabbed keyboard'; echo KEY:79; echo KEY:oops; echo KEY:80",
        ));
        source.install(tx, gate()).unwrap();

        let timeout = Duration::from_secs(5);
        assert_eq!(rx.recv_timeout(timeout).unwrap(), Input::Key(KeyEvent::down(79)));
        assert_eq!(rx.recv_timeout(timeout).unwrap(), Input::Key(KeyEvent::down(80)));
        assert_eq!(rx.recv_timeout(timeout).unwrap(), Input::SourceClosed("device-stream"));
        source.uninstall(Duration::from_secs(2));
        assert!(!source.is_running());
    }

    #[test]
    fn helper_receives_intercept_state() {
        let (tx, rx) = crossbeam_channel::unbounded();
        // echo the first two control lines back as diagnostics, then a key
        let mut source = DeviceStreamSource::new(shell(
            "read a; read b; case \"$a $b\" in 'SCHEME:numpad GLOBAL:1') echo KEY:1;; esac",
        ));
        source.install(tx, gate()).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Input::Key(KeyEvent::down(1))
        );
        source.uninstall(Duration::from_secs(2));
    }

    #[test]
    fn stuck_helper_is_stopped_within_the_bound() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut source = DeviceStreamSource::new(shell("trap '' TERM; while true; do sleep 1; done"));
        source.install(tx, gate()).unwrap();
        let started = Instant::now();
        source.uninstall(Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!source.is_running());
    }

    #[cfg(target_os = "linux")]
    fn process_gone(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            // zombies wait for their new parent to reap them
            Ok(stat) => stat
                .rsplit_once(')')
                .is_some_and(|(_, rest)| rest.trim_start().starts_with(['Z', 'X'])),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn helper_children_do_not_outlive_uninstall() {
        let pidfile =
            std::env::temp_dir().join(format!("q9_helper_child_{}.pid", std::process::id()));
        let _ = std::fs::remove_file(&pidfile);
        let script = format!(
            "sleep 60 & echo $! > {}; trap '' TERM; while true; do sleep 1; done",
            pidfile.display()
        );
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut source = DeviceStreamSource::new(shell(&script));
        source.install(tx, gate()).unwrap();

        let started = Instant::now();
        let grandchild: u32 = loop {
            let written = std::fs::read_to_string(&pidfile).unwrap_or_default();
            if let Ok(pid) = written.trim().parse() {
                break pid;
            }
            assert!(started.elapsed() < Duration::from_secs(5), "helper never wrote its child pid");
            std::thread::sleep(Duration::from_millis(10));
        };

        source.uninstall(Duration::from_millis(300));
        let deadline = Instant::now() + Duration::from_secs(2);
        while !process_gone(grandchild) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(process_gone(grandchild), "helper child {grandchild} still running");
        let _ = std::fs::remove_file(&pidfile);
    }

    #[test]
    fn empty_command_is_an_install_error() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let mut source = DeviceStreamSource::new(Vec::new());
        assert!(source.install(tx, gate()).is_err());
    }
}
