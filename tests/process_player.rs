// Process player behaviour against fake player scripts
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chime_lib::sound::devices::{AlsaRegistry, DeviceResolver};
use chime_lib::sound::{
    is_installed, Completion, PlayOptions, PlaybackOutcome, ProcessPlayer, SoundPlayer,
};
use tempfile::TempDir;
use tokio::runtime::Handle;

// Writing and exec'ing scripts from parallel tests can hit ETXTBSY
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

struct Fixture {
    dir: TempDir,
    log: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("spawns.log");
        Self { dir, log }
    }

    /// Fake player that records its arguments, then sleeps and exits with `code`.
    fn player_script(&self, name: &str, sleep: &str, code: i32) -> String {
        self.script(name, &format!("{}\nsleep {}\nexit {}", self.record(), sleep, code))
    }

    /// Shell line appending the player's arguments to the spawn log
    fn record(&self) -> String {
        format!("echo \"$*\" >> \"{}\"", self.log.display())
    }

    fn script(&self, name: &str, body: &str) -> String {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    fn registry(&self) -> DeviceResolver {
        let root = self.dir.path().join("asound");
        fs::create_dir_all(&root).unwrap();
        fs::write(
            root.join("cards"),
            " 0 [PCH            ]: HDA-Intel - HDA Intel PCH\n 1 [Device         ]: USB-Audio - USB Audio Device\n",
        )
        .unwrap();
        fs::write(
            root.join("devices"),
            "  3: [ 0- 0]: digital audio playback\n 10: [ 1- 0]: digital audio playback\n 11: [ 1- 0]: digital audio capture\n",
        )
        .unwrap();
        DeviceResolver::new(Arc::new(AlsaRegistry::with_root(root)))
    }

    fn spawns(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Wait until the spawn log has at least `count` lines
    async fn wait_for_spawns(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.spawns().len() < count {
            assert!(Instant::now() < deadline, "player never started");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn counting_callback(counter: &Arc<AtomicUsize>) -> PlayOptions {
    let counter = Arc::clone(counter);
    PlayOptions::default().with_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

async fn finish(completion: Completion) -> PlaybackOutcome {
    tokio::time::timeout(Duration::from_secs(5), completion.wait())
        .await
        .expect("playback did not finish in time")
}

#[tokio::test]
async fn play_runs_to_completion() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::new(fixture.player_script("aplay", "0", 0), Handle::current());
    let calls = Arc::new(AtomicUsize::new(0));

    let completion = player.play(Path::new("/sounds/a.wav"), counting_callback(&calls));
    assert!(player.is_playing());

    assert_eq!(finish(completion).await, PlaybackOutcome::Finished { code: Some(0) });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!player.is_playing());
    assert_eq!(fixture.spawns(), vec!["/sounds/a.wav"]);
}

#[tokio::test]
async fn nonzero_exit_still_completes_once() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::new(fixture.player_script("aplay", "0", 3), Handle::current());
    let calls = Arc::new(AtomicUsize::new(0));

    let completion = player.play(Path::new("a.wav"), counting_callback(&calls));
    assert_eq!(finish(completion).await, PlaybackOutcome::Finished { code: Some(3) });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!player.is_playing());
}

#[tokio::test]
async fn pass_through_player_gets_hw_device() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::with_resolver(
        fixture.player_script("aplay", "0", 0),
        Handle::current(),
        fixture.registry(),
    );

    let options = PlayOptions::default().with_device("hw:1,0");
    finish(player.play(Path::new("a.wav"), options)).await;
    assert_eq!(fixture.spawns(), vec!["--device hw:1,0 a.wav"]);
}

#[tokio::test]
async fn translating_player_gets_sink_address() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::with_resolver(
        fixture.player_script("paplay", "0", 0),
        Handle::current(),
        fixture.registry(),
    );

    let options = PlayOptions::default().with_device("hw:1,0");
    finish(player.play(Path::new("a.wav"), options)).await;

    // Capture-only and unknown devices fall back to the default
    let options = PlayOptions::default().with_device("hw:1,1");
    finish(player.play(Path::new("b.wav"), options)).await;

    assert_eq!(
        fixture.spawns(),
        vec!["--device alsa:pcm:1:hw:Device,0:playback a.wav", "b.wav"]
    );
}

#[tokio::test]
async fn new_request_replaces_live_process() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::new(fixture.player_script("aplay", "5", 0), Handle::current());
    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));

    let first = player.play(Path::new("a.wav"), counting_callback(&first_calls));
    let second = player.play(Path::new("b.wav"), counting_callback(&second_calls));

    assert_eq!(finish(first).await, PlaybackOutcome::Killed);
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);

    // The replaced process's exit must not clear the new session
    assert!(player.is_playing());
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);

    player.stop();
    assert!(!player.is_playing());
    assert_eq!(finish(second).await, PlaybackOutcome::Killed);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn spawn_failure_completes_immediately() {
    let _serial = serial();
    let player = ProcessPlayer::new("/nonexistent/bin/aplay", Handle::current());
    let calls = Arc::new(AtomicUsize::new(0));

    let completion = player.play(Path::new("a.wav"), counting_callback(&calls));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!player.is_playing());
    assert!(matches!(finish(completion).await, PlaybackOutcome::SpawnFailed(_)));
}

#[tokio::test]
async fn loop_repeats_until_stopped() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::new(fixture.player_script("aplay", "0", 0), Handle::current());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let options = PlayOptions::default().with_callback(move || {
        let _ = tx.send(());
    });
    player.loop_play(Path::new("ring.wav"), options);

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("loop cycle did not complete")
            .expect("callback channel closed");
    }
    player.stop();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let settled = fixture.spawns().len();
    assert!(settled >= 3);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(fixture.spawns().len(), settled);
    assert!(!player.is_playing());
    assert!(fixture.spawns().iter().all(|line| line == "ring.wav"));
}

#[tokio::test]
async fn loop_ends_when_player_cannot_start() {
    let _serial = serial();
    let player = ProcessPlayer::new("/nonexistent/bin/aplay", Handle::current());
    let calls = Arc::new(AtomicUsize::new(0));

    player.loop_play(Path::new("ring.wav"), counting_callback(&calls));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!player.is_looping());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!player.is_playing());
}

#[tokio::test]
async fn loop_survives_nonzero_exit() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::new(fixture.player_script("paplay", "0", 1), Handle::current());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let options = PlayOptions::default().with_callback(move || {
        let _ = tx.send(());
    });
    player.loop_play(Path::new("ring.wav"), options);

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("loop stopped after a failing cycle")
            .expect("callback channel closed");
    }
    assert!(player.is_looping());

    player.stop();
    assert!(!player.is_looping());
    tokio::time::sleep(Duration::from_millis(500)).await;
    let settled = fixture.spawns().len();
    assert!(settled >= 3);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(fixture.spawns().len(), settled);
    assert!(!player.is_playing());
}

#[tokio::test]
async fn stop_from_loop_callback_prevents_respawn() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = Arc::new(ProcessPlayer::new(
        fixture.player_script("aplay", "0", 0),
        Handle::current(),
    ));
    let calls = Arc::new(AtomicUsize::new(0));

    let options = {
        let player = Arc::clone(&player);
        let calls = Arc::clone(&calls);
        PlayOptions::default().with_callback(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            player.stop();
        })
    };
    player.loop_play(Path::new("ring.wav"), options);
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(fixture.spawns().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!player.is_looping());
    assert!(!player.is_playing());
}

#[tokio::test]
async fn loop_is_reported_between_cycles() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = Arc::new(ProcessPlayer::new(
        fixture.player_script("aplay", "0", 0),
        Handle::current(),
    ));
    let seen = Arc::new(Mutex::new(Vec::new()));

    // The callback runs after a cycle's process is gone and before the next spawn
    let options = {
        let player = Arc::clone(&player);
        let seen = Arc::clone(&seen);
        PlayOptions::default().with_callback(move || {
            seen.lock().unwrap().push((player.is_playing(), player.is_looping()));
        })
    };
    player.loop_play(Path::new("ring.wav"), options);
    fixture.wait_for_spawns(2).await;
    player.stop();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&(false, true)));
    assert!(!player.is_looping());
}

#[tokio::test]
async fn play_cancels_active_loop() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::new(fixture.player_script("aplay", "0.05", 0), Handle::current());

    player.loop_play(Path::new("ring.wav"), PlayOptions::default());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let completion = player.play(Path::new("message.wav"), PlayOptions::default());
    assert_eq!(finish(completion).await, PlaybackOutcome::Finished { code: Some(0) });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let rings = |spawns: Vec<String>| spawns.iter().filter(|line| *line == "ring.wav").count();
    let settled = rings(fixture.spawns());
    assert!(settled >= 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(rings(fixture.spawns()), settled);
    assert_eq!(
        fixture.spawns().iter().filter(|line| *line == "message.wav").count(),
        1
    );
    assert!(!player.is_playing());
}

#[tokio::test]
async fn replacement_terminates_gracefully() {
    let _serial = serial();
    if !is_installed("kill") {
        return;
    }
    let fixture = Fixture::new();
    let log = fixture.log.display().to_string();
    let command = fixture.script(
        "aplay",
        &format!(
            "trap 'echo terminated >> \"{}\"; exit 0' TERM\n{}\nwhile :; do sleep 0.05; done",
            log,
            fixture.record()
        ),
    );
    let player = ProcessPlayer::new(command, Handle::current());

    let completion = player.play(Path::new("a.wav"), PlayOptions::default());
    fixture.wait_for_spawns(1).await;
    player.stop();

    assert_eq!(finish(completion).await, PlaybackOutcome::Killed);
    assert_eq!(fixture.spawns(), vec!["a.wav", "terminated"]);
}

#[tokio::test]
async fn player_ignoring_term_is_killed() {
    let _serial = serial();
    let fixture = Fixture::new();
    let command = fixture.script(
        "aplay",
        &format!("trap '' TERM\n{}\nsleep 5", fixture.record()),
    );
    let player = ProcessPlayer::new(command, Handle::current());

    let completion = player.play(Path::new("a.wav"), PlayOptions::default());
    fixture.wait_for_spawns(1).await;
    let started = Instant::now();
    player.stop();

    assert_eq!(finish(completion).await, PlaybackOutcome::Killed);
    if is_installed("kill") {
        assert!(started.elapsed() >= Duration::from_millis(400));
    }
}

#[tokio::test]
async fn dropping_the_player_kills_its_process() {
    let _serial = serial();
    let fixture = Fixture::new();
    let player = ProcessPlayer::new(fixture.player_script("aplay", "5", 0), Handle::current());

    let completion = player.play(Path::new("a.wav"), PlayOptions::default());
    drop(player);
    assert_eq!(finish(completion).await, PlaybackOutcome::Killed);
}
