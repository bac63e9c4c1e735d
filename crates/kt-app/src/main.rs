use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use kt_audio::MusicPlayer;
use kt_core::traits::AudioSink;
use kt_engine::ScriptEngine;

pub mod cli;

fn main() -> ExitCode {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging (stderr)
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Jouer ; toute erreur sort en rouge sur stdout
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("\x1b[31m{e:#}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &cli::Cli) -> Result<()> {
    // 1. Lire le script
    let source = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("Script illisible : {}", cli.script.display()))?;
    let lines: Vec<String> = source.lines().map(str::to_string).collect();

    // 2. Parser — la lecture ne démarre pas sur un script invalide
    let elements = kt_script::parse(&lines)?;

    // 3. Piste audio optionnelle. Un fichier illisible ou
    // indécodable est une erreur ; les pannes de périphérique en
    // cours de lecture sont avalées par le thread audio.
    let audio: Option<Box<dyn AudioSink>> = match &cli.music {
        Some(path) => {
            let player = MusicPlayer::new(path)
                .with_context(|| format!("Piste audio : {}", path.display()))?;
            Some(Box::new(player))
        }
        None => None,
    };

    // 4. Exécuter la timeline
    ScriptEngine::new(elements, audio, cli.fps).run()
}
