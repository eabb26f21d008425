//! Command-line argument parsing for the chime CLI.

use std::env;

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Sound file to play
    pub file_path: Option<String>,
    /// Player command override; otherwise the first installed default
    pub player: Option<String>,
    /// Output device hint (`hw:<card>,<device>`)
    pub device: Option<String>,
    /// Loop the file for this many seconds, then stop
    pub loop_secs: Option<u64>,
    /// Print the sound cards and playback devices, then exit
    pub list_devices: bool,
    /// Whether help was requested
    pub show_help: bool,
}

impl CliArgs {
    /// Parse arguments from command line.
    pub fn parse() -> Self {
        Self::parse_from(env::args().skip(1))
    }

    pub fn parse_from<I: IntoIterator<Item = String>>(input: I) -> Self {
        let mut args = Self::default();
        let mut iter = input.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => {
                    args.show_help = true;
                }
                "--list-devices" => {
                    args.list_devices = true;
                }
                "--player" | "--device" | "--loop" => {
                    let Some(value) = iter.next() else {
                        eprintln!("{} requires an argument", arg);
                        args.show_help = true;
                        continue;
                    };
                    match arg.as_str() {
                        "--player" => args.player = Some(value),
                        "--device" => args.device = Some(value),
                        _ => match value.parse::<u64>() {
                            Ok(secs) => args.loop_secs = Some(secs),
                            Err(_) => {
                                eprintln!("--loop expects a number of seconds, got {}", value);
                                args.show_help = true;
                            }
                        },
                    }
                }
                _ if arg.starts_with('-') => {
                    eprintln!("Unknown flag: {}", arg);
                    args.show_help = true;
                }
                _ => {
                    args.file_path = Some(arg);
                }
            }
        }

        if args.file_path.is_none() && !args.list_devices {
            args.show_help = true;
        }

        args
    }

    /// Print help text to stderr.
    pub fn print_help() {
        eprintln!(
            "Usage:\n  chime [--player <cmd>] [--device hw:<card>,<device>] [--loop <secs>] <file>\n\
             \x20 chime --list-devices\n\n\
             Flags:\n\
             \x20 --player <cmd>       Player command (default: first of paplay, aplay, pw-play, play, mpg123)\n\
             \x20 --device <hint>      Output device in hw:<card>,<device> form\n\
             \x20 --loop <secs>        Repeat the file for <secs> seconds\n\
             \x20 --list-devices       Show sound cards and playback devices\n\
             \x20 -h, --help           Show this help\n"
        );
    }
}
