// External process player
// Drives one player process per sound channel: play, loop, replace, stop

use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use super::devices::DeviceResolver;

/// How long a terminated player gets to exit before it is killed outright
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Pause before restarting a loop whose last cycle did not exit cleanly
const LOOP_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Invoked once per playback attempt, after the session has been cleared
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Per-request options
#[derive(Clone, Default)]
pub struct PlayOptions {
    /// Device hint in `hw:<card>,<device>` form
    pub device: Option<String>,
    pub callback: Option<Callback>,
}

impl PlayOptions {
    pub fn with_device<S: Into<String>>(mut self, device: S) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for PlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayOptions")
            .field("device", &self.device)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// How a single spawn attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The process exited on its own
    Finished { code: Option<i32> },
    /// Replaced by a newer request or stopped
    Killed,
    /// Waiting on the process failed
    Failed(String),
    /// The process never started
    SpawnFailed(String),
}

impl PlaybackOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PlaybackOutcome::Finished { code: Some(0) })
    }
}

/// One-shot completion signal for a spawn attempt
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<PlaybackOutcome>,
}

impl Completion {
    /// An already-finished attempt
    pub(crate) fn resolved(outcome: PlaybackOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// Wait for the attempt to end
    pub async fn wait(self) -> PlaybackOutcome {
        self.rx.await.unwrap_or(PlaybackOutcome::Killed)
    }

    /// Blocking variant for callers outside the runtime
    pub fn wait_blocking(self) -> PlaybackOutcome {
        self.rx.blocking_recv().unwrap_or(PlaybackOutcome::Killed)
    }
}

/// Capability interface every player backend provides
pub trait SoundPlayer: Send + Sync {
    /// Player binary this backend launches
    fn command(&self) -> &str;

    /// Play `file` once, replacing whatever this player is doing
    fn play(&self, file: &Path, options: PlayOptions) -> Completion;

    /// Play `file` over and over until stopped or replaced
    fn loop_play(&self, file: &Path, options: PlayOptions);

    fn stop(&self);

    /// A player process is alive right now
    fn is_playing(&self) -> bool;

    /// A loop is active, even between two of its cycles
    fn is_looping(&self) -> bool;
}

struct Session {
    id: u64,
    kill: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct SessionState {
    current: Option<Session>,
    /// Token of the active loop, if any
    looping: Option<u64>,
    next_id: u64,
}

impl SessionState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Send the kill request and forget the handle.
    fn kill_current(&mut self) {
        if let Some(mut session) = self.current.take() {
            log::debug!("Terminating playback session {}", session.id);
            if let Some(kill) = session.kill.take() {
                let _ = kill.send(());
            }
        }
    }
}

/// A single playback cycle
struct Cycle {
    file: PathBuf,
    options: PlayOptions,
    loop_token: Option<u64>,
}

struct Inner {
    command: String,
    runtime: Handle,
    resolver: DeviceResolver,
    state: Mutex<SessionState>,
}

/// Player backed by an external command (`aplay`, `paplay`, ...)
///
/// Holds at most one live process. Any new request kills the previous
/// process before spawning its own.
pub struct ProcessPlayer {
    inner: Arc<Inner>,
}

impl ProcessPlayer {
    pub fn new<S: Into<String>>(command: S, runtime: Handle) -> Self {
        Self::with_resolver(command, runtime, DeviceResolver::default())
    }

    pub fn with_resolver<S: Into<String>>(
        command: S,
        runtime: Handle,
        resolver: DeviceResolver,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                command: command.into(),
                runtime,
                resolver,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Argument vector for a request, command first
    pub fn build_args(&self, file: &Path, device: Option<&str>) -> Vec<String> {
        self.inner.build_args(file, device)
    }
}

impl SoundPlayer for ProcessPlayer {
    fn command(&self) -> &str {
        &self.inner.command
    }

    fn play(&self, file: &Path, options: PlayOptions) -> Completion {
        let cycle = Cycle {
            file: file.to_path_buf(),
            options,
            loop_token: None,
        };
        self.inner
            .launch(cycle)
            .unwrap_or_else(|| Completion::resolved(PlaybackOutcome::Killed))
    }

    fn loop_play(&self, file: &Path, options: PlayOptions) {
        let token = {
            let mut state = self.inner.state.lock();
            let token = state.next_id();
            state.looping = Some(token);
            token
        };
        log::debug!("Looping {:?} (loop {})", file, token);

        let cycle = Cycle {
            file: file.to_path_buf(),
            options,
            loop_token: Some(token),
        };
        let _ = self.inner.launch(cycle);
    }

    fn stop(&self) {
        let mut state = self.inner.state.lock();
        state.looping = None;
        state.kill_current();
    }

    fn is_playing(&self) -> bool {
        self.inner.state.lock().current.is_some()
    }

    fn is_looping(&self) -> bool {
        self.inner.state.lock().looping.is_some()
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Inner {
    fn build_args(&self, file: &Path, device: Option<&str>) -> Vec<String> {
        let file = file.to_string_lossy().to_string();
        match self.resolver.resolve(&self.command, device) {
            Some(device) => vec![self.command.clone(), "--device".to_string(), device, file],
            None => vec![self.command.clone(), file],
        }
    }

    /// Start a cycle. Returns `None` when a loop cycle was cancelled before
    /// it could spawn.
    fn launch(self: &Arc<Self>, cycle: Cycle) -> Option<Completion> {
        let args = self.build_args(&cycle.file, cycle.options.device.as_deref());
        let (done_tx, done_rx) = oneshot::channel();

        let mut state = self.state.lock();
        match cycle.loop_token {
            Some(token) if state.looping != Some(token) => {
                log::debug!("Loop {} was cancelled, not restarting", token);
                return None;
            }
            Some(_) => {}
            None => state.looping = None,
        }
        state.kill_current();

        log::debug!("{}", args.join(" "));
        let spawned = {
            let _guard = self.runtime.enter();
            Command::new(&args[0])
                .args(&args[1..])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
        };

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                if cycle.loop_token.is_some() {
                    state.looping = None;
                }
                drop(state);

                log::warn!("Failed to start {}: {}", self.command, e);
                if let Some(callback) = &cycle.options.callback {
                    callback();
                }
                let _ = done_tx.send(PlaybackOutcome::SpawnFailed(e.to_string()));
                return Some(Completion { rx: done_rx });
            }
        };

        let id = state.next_id();
        let (kill_tx, kill_rx) = oneshot::channel();
        state.current = Some(Session {
            id,
            kill: Some(kill_tx),
        });
        drop(state);

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let outcome = supervise(child, kill_rx).await;
            let delay = if outcome.is_success() {
                Duration::ZERO
            } else {
                LOOP_RETRY_DELAY
            };

            if let Some(cycle) = inner.finish(id, cycle, outcome, done_tx) {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                // The loop token is checked again under the lock before respawn
                let _ = inner.launch(cycle);
            }
        });

        Some(Completion { rx: done_rx })
    }

    /// Runs exactly once per spawned process. Hands the cycle back when its
    /// loop is still active and should go around again.
    fn finish(
        &self,
        id: u64,
        cycle: Cycle,
        outcome: PlaybackOutcome,
        done_tx: oneshot::Sender<PlaybackOutcome>,
    ) -> Option<Cycle> {
        let restart = {
            let mut state = self.state.lock();
            if state.current.as_ref().map(|s| s.id) == Some(id) {
                state.current = None;
            }
            cycle.loop_token.is_some() && state.looping == cycle.loop_token
        };

        match &outcome {
            PlaybackOutcome::Failed(e) => log::warn!("{} failed: {}", self.command, e),
            other => log::debug!("Playback session {} ended: {:?}", id, other),
        }

        if let Some(callback) = &cycle.options.callback {
            callback();
        }
        let _ = done_tx.send(outcome);

        restart.then_some(cycle)
    }
}

async fn supervise(mut child: Child, kill: oneshot::Receiver<()>) -> PlaybackOutcome {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => PlaybackOutcome::Finished { code: status.code() },
            Err(e) => PlaybackOutcome::Failed(e.to_string()),
        },
        _ = kill => {
            terminate(&mut child).await;
            PlaybackOutcome::Killed
        }
    }
}

/// SIGTERM first, SIGKILL once the grace period runs out.
async fn terminate(child: &mut Child) {
    if request_exit(child).await {
        let exited = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await;
        match exited {
            Ok(_) => return,
            Err(_) => log::debug!(
                "Player {:?} ignored SIGTERM for {:?}, killing it",
                child.id(),
                TERMINATE_GRACE
            ),
        }
    }

    if let Err(e) = child.start_kill() {
        log::debug!("Kill request failed: {}", e);
    }
    let _ = child.wait().await;
}

/// Ask the process to exit. Returns false when no signal could be sent.
#[cfg(unix)]
async fn request_exit(child: &Child) -> bool {
    let Some(pid) = child.id().map(|id| id.to_string()) else {
        return false;
    };

    let sent = Command::new("kill")
        .args(["-TERM", pid.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match sent {
        Ok(status) => status.success(),
        Err(e) => {
            log::debug!("Could not send SIGTERM to {}: {}", pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
async fn request_exit(_child: &Child) -> bool {
    false
}
