// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::thread;

use clap::{crate_version, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use harptrainer::audio;
use harptrainer::config::{self, Trainer};
use harptrainer::lick::{Lick, LickBook};
use harptrainer::player::{CallAndResponsePlayer, SessionEvent, StartOutcome};
use harptrainer::transport::PlayOutcome;
use harptrainer::verify;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A harmonica ear trainer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads a key's samples and lists them.
    Samples {
        /// The path to the trainer configuration.
        config: PathBuf,
        /// The harmonica key. Overrides the configuration.
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Lists the licks and checks them against a key's samples.
    Licks {
        /// The path to the trainer configuration.
        config: PathBuf,
        /// The harmonica key. Overrides the configuration.
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Plays a lick once.
    Play(LickArgs),
    /// Loops a lick and a metronome response until interrupted.
    Drill(LickArgs),
}

#[derive(Args)]
struct LickArgs {
    /// The path to the trainer configuration.
    config: PathBuf,
    /// The lick to play. A random one is picked if not given.
    #[arg(short, long)]
    lick: Option<String>,
    /// Only pick random licks from this register.
    #[arg(short, long)]
    register: Option<String>,
    /// The tempo in beats per minute. Overrides the configuration.
    #[arg(short, long)]
    bpm: Option<f64>,
    /// The harmonica key. Overrides the configuration.
    #[arg(short, long)]
    key: Option<String>,
}

/// Finds the named lick, or picks a random one.
fn choose_lick<'a>(
    book: &'a LickBook,
    name: Option<&str>,
    register: Option<&str>,
) -> Result<&'a Lick, Box<dyn Error>> {
    let lick = match (name, register) {
        (Some(name), _) => book.find(name),
        (None, Some(register)) => book.random_in_register(register),
        (None, None) => book.random(),
    };
    lick.ok_or_else(|| "no matching lick found".into())
}

fn key_or_default<'a>(trainer: &'a Trainer, key: &'a Option<String>) -> &'a str {
    key.as_deref().unwrap_or(trainer.key())
}

fn print_lick(lick: &Lick) {
    println!(
        "{} [{}, {}, {} beats]: {}",
        lick.name,
        lick.register,
        lick.time_signature_str(),
        lick.total_beats(),
        lick.display_tabs().join(" ")
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Samples { config: path, key } => {
            let trainer = config::load_trainer(&path)?;
            let engine = config::init_engine(&trainer, key_or_default(&trainer, &key))?;
            let library = engine.library.read();

            if library.is_empty() {
                println!("No samples found in {}.", library.base_path().display());
                return Ok(());
            }

            println!(
                "Samples for key {} (count: {}):",
                library.key().unwrap_or("?"),
                library.len()
            );
            for label in library.labels() {
                println!("- {}", label);
            }
        }
        Commands::Licks { config: path, key } => {
            let trainer = config::load_trainer(&path)?;
            let book = LickBook::load(&trainer.licks_path())?;
            if book.is_empty() {
                println!("No licks found in {}.", trainer.licks_path().display());
                return Ok(());
            }

            println!("Licks (count: {}):", book.len());
            for lick in book.all() {
                print!("- ");
                print_lick(lick);
            }
            println!();

            let engine = config::init_engine(&trainer, key_or_default(&trainer, &key))?;
            let library = engine.library.read();
            let report = verify::check_all(&book, Some(&*library));
            verify::print_report(&report, &book);
            if report.has_errors() {
                return Err("lick verification failed".into());
            }
        }
        Commands::Play(args) => {
            let trainer = config::load_trainer(&args.config)?;
            let book = LickBook::load(&trainer.licks_path())?;
            let lick = choose_lick(&book, args.lick.as_deref(), args.register.as_deref())?;
            let engine = config::init_engine(&trainer, key_or_default(&trainer, &args.key))?;
            verify::warn_missing_samples(lick, &engine.library.read());

            print_lick(lick);
            let bpm = args.bpm.unwrap_or(trainer.bpm());
            let transport = engine.transport;
            let events = lick.lick_data.clone();
            let outcome =
                tokio::task::spawn_blocking(move || transport.play(&events, bpm)).await??;
            if outcome == PlayOutcome::NothingLoaded {
                println!("No samples are loaded, nothing was played.");
            }
        }
        Commands::Drill(args) => {
            let trainer = config::load_trainer(&args.config)?;
            let book = LickBook::load(&trainer.licks_path())?;
            let lick = choose_lick(&book, args.lick.as_deref(), args.register.as_deref())?;
            let engine = config::init_engine(&trainer, key_or_default(&trainer, &args.key))?;
            verify::warn_missing_samples(lick, &engine.library.read());

            print_lick(lick);
            let bpm = args.bpm.unwrap_or(trainer.bpm());
            let player = CallAndResponsePlayer::new(engine.transport, engine.metronome);
            let events = player.events();
            let printer = thread::spawn(move || {
                for event in events.iter() {
                    match event {
                        SessionEvent::CallPlayed { cycle } => {
                            println!("Call {} played, your turn.", cycle + 1)
                        }
                        SessionEvent::Failed { reason } => println!("Drill failed: {}", reason),
                        SessionEvent::Stopped { cycles } => {
                            println!("Drill stopped after {} call(s).", cycles)
                        }
                        SessionEvent::Started | SessionEvent::ResponsePlayed { .. } => {}
                    }
                }
            });

            let outcome = player.start(lick.events(), bpm, &lick.time_signature())?;
            if outcome == StartOutcome::AlreadyRunning {
                return Err("drill is already running".into());
            }
            println!("Press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;

            // Stopping waits for the segment that's playing to finish.
            tokio::task::spawn_blocking(move || {
                player.stop();
            })
            .await?;
            if printer.join().is_err() {
                return Err("event printer panicked".into());
            }
        }
    }

    Ok(())
}
