// Installed player discovery
// Probes the executable search path for known player binaries

use std::env;
use std::ffi::OsStr;
use std::path::Path;

/// Player commands tried in order when the settings don't name any
pub const DEFAULT_PLAYERS: &[&str] = &["paplay", "aplay", "pw-play", "play", "mpg123"];

/// Returns the first command in `candidates` that is installed on `PATH`.
pub fn get_first_installed<S: AsRef<str>>(candidates: &[S]) -> Option<String> {
    let search_path = env::var_os("PATH").unwrap_or_default();
    get_first_installed_in(candidates, &search_path)
}

/// Same as [`get_first_installed`] but against an explicit `PATH`-style value.
pub fn get_first_installed_in<S: AsRef<str>>(
    candidates: &[S],
    search_path: &OsStr,
) -> Option<String> {
    candidates
        .iter()
        .map(|candidate| candidate.as_ref())
        .find(|command| is_installed_in(command, search_path))
        .map(str::to_string)
}

/// Checks whether `command` can be launched. Never fails: anything that goes
/// wrong while probing counts as "not installed".
pub fn is_installed(command: &str) -> bool {
    let search_path = env::var_os("PATH").unwrap_or_default();
    is_installed_in(command, &search_path)
}

pub fn is_installed_in(command: &str, search_path: &OsStr) -> bool {
    if command.is_empty() {
        return false;
    }

    // Explicit paths bypass the search path
    if command.contains(std::path::MAIN_SEPARATOR) || command.contains('/') {
        return is_executable(Path::new(command));
    }

    env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(command))
        .any(|candidate| is_executable(&candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
