use std::path::PathBuf;

use clap::Parser;

/// kinetype — Lecteur de typographie cinétique pour terminal.
///
/// Joue un script `.clip` dans le terminal courant, optionnellement
/// synchronisé sur une piste audio. La lecture démarre sur ENTRÉE.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script .clip à jouer.
    pub script: PathBuf,

    /// Piste audio de fond (MP3).
    #[arg(short = 'm', long)]
    pub music: Option<PathBuf>,

    /// FPS cible de la boucle de rendu.
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_coherent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_music_option() {
        let cli = Cli::parse_from(["kinetype", "intro.clip", "-m", "track.mp3"]);
        assert_eq!(cli.script, PathBuf::from("intro.clip"));
        assert_eq!(cli.music, Some(PathBuf::from("track.mp3")));
        assert_eq!(cli.fps, 30);
    }
}
