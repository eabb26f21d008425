//! Chime CLI
//!
//! Plays a sound file through the same player core the shell uses, which is
//! handy for checking device hints and installed players by hand.

mod args;

use anyhow::{bail, Result};
use std::path::Path;
use std::time::Duration;

use args::CliArgs;
use chime_lib::sound::devices::{get_cards, get_devices};
use chime_lib::sound::{get_first_installed, PlayOptions, ProcessPlayer, SoundPlayer, DEFAULT_PLAYERS};

fn list_devices() {
    let cards = get_cards();
    let devices = get_devices();

    if cards.is_empty() {
        println!("No sound cards found");
        return;
    }

    for (index, name) in &cards {
        let playback = devices
            .get(index)
            .map(|list| list.join(", "))
            .unwrap_or_else(|| "-".to_string());
        println!("card {}: {} (playback devices: {})", index, name, playback);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    chime_lib::init_logging("info");

    let args = CliArgs::parse();
    if args.show_help {
        CliArgs::print_help();
        return Ok(());
    }
    if args.list_devices {
        list_devices();
        return Ok(());
    }

    let command = match args.player.or_else(|| get_first_installed(DEFAULT_PLAYERS)) {
        Some(command) => command,
        None => bail!("No audio players found (tried {})", DEFAULT_PLAYERS.join(", ")),
    };
    let Some(file) = args.file_path else {
        bail!("No file given");
    };

    let player = ProcessPlayer::new(command, tokio::runtime::Handle::current());
    let options = PlayOptions {
        device: args.device,
        callback: None,
    };
    log::info!("Playing {} with {}", file, player.command());

    match args.loop_secs {
        Some(secs) => {
            player.loop_play(Path::new(&file), options);
            tokio::time::sleep(Duration::from_secs(secs)).await;
            player.stop();
        }
        None => {
            let outcome = player.play(Path::new(&file), options).wait().await;
            log::info!("Playback ended: {:?}", outcome);
        }
    }

    Ok(())
}
