/// Output device resolution
///
/// Turns a generic `hw:<card>,<device>` hint into the device argument a
/// particular player command understands, using the ALSA card and device
/// registries exposed under `/proc/asound`.

use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Card index -> card id (the bracketed name in `/proc/asound/cards`)
pub type AudioCardMap = BTreeMap<String, String>;

/// Card index -> playback device indices on that card, in registry order
pub type AudioDeviceMap = BTreeMap<String, Vec<String>>;

const DEFAULT_ASOUND_ROOT: &str = "/proc/asound";

fn hint_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^hw:([0-9]+),([0-9]+)$").unwrap())
}

fn card_line_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // " 1 [Device         ]: USB-Audio - USB Audio Device"
    REGEX.get_or_init(|| Regex::new(r"^\s*([0-9]+)\s+\[\s*([^\]]*?)\s*\]").unwrap())
}

fn device_line_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // " 10: [ 1- 0]: digital audio playback"
    REGEX.get_or_init(|| Regex::new(r"\[\s*([0-9]+)-\s*([0-9]+)\]").unwrap())
}

/// A parsed `hw:<card>,<device>` hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwAddress {
    pub card: String,
    pub device: String,
}

impl HwAddress {
    pub fn parse(hint: &str) -> Option<Self> {
        let captures = hint_regex().captures(hint)?;
        Some(Self {
            card: captures[1].to_string(),
            device: captures[2].to_string(),
        })
    }
}

/// How a player command wants its output device addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerFamily {
    /// Takes ALSA hardware strings as-is (aplay)
    PassThrough,
    /// Takes a sink address built from the card name (paplay)
    Translating,
    /// No known device flag; always plays on the default device
    Other,
}

impl PlayerFamily {
    /// Classify by file name so `/usr/bin/paplay` and `paplay` agree.
    pub fn of(command: &str) -> Self {
        let name = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);

        match name {
            "aplay" => PlayerFamily::PassThrough,
            "paplay" => PlayerFamily::Translating,
            _ => PlayerFamily::Other,
        }
    }
}

/// Parse the contents of `/proc/asound/cards`.
pub fn parse_cards(text: &str) -> AudioCardMap {
    text.lines()
        .filter_map(|line| card_line_regex().captures(line))
        .filter(|captures| !captures[2].is_empty())
        .map(|captures| (captures[1].to_string(), captures[2].to_string()))
        .collect()
}

/// Parse the contents of `/proc/asound/devices`, keeping playback endpoints only.
pub fn parse_devices(text: &str) -> AudioDeviceMap {
    let mut devices = AudioDeviceMap::new();

    for line in text.lines().filter(|line| line.contains("playback")) {
        if let Some(captures) = device_line_regex().captures(line) {
            devices
                .entry(captures[1].to_string())
                .or_default()
                .push(captures[2].to_string());
        }
    }

    devices
}

/// Source of card/device enumerations
pub trait DeviceRegistry: Send + Sync {
    fn cards(&self) -> AudioCardMap;
    fn devices(&self) -> AudioDeviceMap;
}

/// Reads the ALSA procfs registry. Unreadable files yield empty maps.
#[derive(Debug, Clone)]
pub struct AlsaRegistry {
    root: PathBuf,
}

impl AlsaRegistry {
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, name: &str) -> Option<String> {
        let path = self.root.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::debug!("Could not read {:?}: {}", path, e);
                None
            }
        }
    }
}

impl Default for AlsaRegistry {
    fn default() -> Self {
        Self::with_root(DEFAULT_ASOUND_ROOT)
    }
}

impl DeviceRegistry for AlsaRegistry {
    fn cards(&self) -> AudioCardMap {
        self.read("cards").map(|t| parse_cards(&t)).unwrap_or_default()
    }

    fn devices(&self) -> AudioDeviceMap {
        self.read("devices").map(|t| parse_devices(&t)).unwrap_or_default()
    }
}

/// Cards currently known to the system registry
pub fn get_cards() -> AudioCardMap {
    AlsaRegistry::default().cards()
}

/// Playback devices currently known to the system registry
pub fn get_devices() -> AudioDeviceMap {
    AlsaRegistry::default().devices()
}

/// Resolve `hint` for `command` against the live system registry.
///
/// `None` means "let the player use its default device"; it is never an error.
pub fn resolve_device(command: &str, hint: Option<&str>) -> Option<String> {
    DeviceResolver::default().resolve(command, hint)
}

/// Pure resolution over already-enumerated maps.
pub fn resolve_device_with(
    command: &str,
    hint: &str,
    cards: &AudioCardMap,
    devices: &AudioDeviceMap,
) -> Option<String> {
    let address = HwAddress::parse(hint)?;
    let card_name = cards.get(&address.card)?;

    match PlayerFamily::of(command) {
        PlayerFamily::PassThrough => Some(hint.to_string()),
        PlayerFamily::Translating => {
            let listed = devices
                .get(&address.card)
                .is_some_and(|list| list.contains(&address.device));
            listed.then(|| {
                format!(
                    "alsa:pcm:{}:hw:{},{}:playback",
                    address.card, card_name, address.device
                )
            })
        }
        PlayerFamily::Other => None,
    }
}

/// Device resolver bound to a registry source
#[derive(Clone)]
pub struct DeviceResolver {
    registry: Arc<dyn DeviceRegistry>,
}

impl DeviceResolver {
    pub fn new(registry: Arc<dyn DeviceRegistry>) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, command: &str, hint: Option<&str>) -> Option<String> {
        let hint = hint?;

        // Skip the registry reads when the answer can't depend on them
        if HwAddress::parse(hint).is_none() {
            log::debug!("Ignoring malformed device hint {:?}", hint);
            return None;
        }
        if PlayerFamily::of(command) == PlayerFamily::Other {
            log::debug!("{} has no device flag, using default device", command);
            return None;
        }

        let resolved = resolve_device_with(
            command,
            hint,
            &self.registry.cards(),
            &self.registry.devices(),
        );
        if resolved.is_none() {
            log::debug!("Device {} not present, using default device", hint);
        }
        resolved
    }
}

impl Default for DeviceResolver {
    fn default() -> Self {
        Self::new(Arc::new(AlsaRegistry::default()))
    }
}
