use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use kt_core::traits::AudioSink;

use crate::decode;
use crate::error::AudioError;

/// Commandes du thread de lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerCommand {
    Play,
    Stop,
}

/// Lecteur de musique de fond.
///
/// Le fichier est décodé une fois à la construction ; un thread dédié
/// possède le stream cpal (qui n'est pas `Send` et doit vivre sur son
/// thread) et obéit aux commandes `Play`/`Stop`. Après le dernier
/// échantillon le callback émet du silence — la piste ne boucle pas.
///
/// # Example
/// ```no_run
/// use kt_audio::MusicPlayer;
/// use kt_core::traits::AudioSink;
/// let player = MusicPlayer::new("track.mp3").unwrap();
/// player.play();
/// player.stop();
/// ```
pub struct MusicPlayer {
    cmd_tx: flume::Sender<PlayerCommand>,
}

impl MusicPlayer {
    /// Décode `path` et prépare le thread de lecture.
    ///
    /// # Errors
    /// Fichier illisible, format inconnu, ou piste vide.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (samples, sample_rate) = decode::decode_file(path)?;
        if samples.is_empty() {
            return Err(AudioError::EmptyTrack(path.display().to_string()).into());
        }

        let (cmd_tx, cmd_rx) = flume::bounded(4);
        std::thread::Builder::new()
            .name("kt-audio".to_string())
            .spawn(move || {
                if let Err(e) = run_playback(samples, sample_rate, &cmd_rx) {
                    log::warn!("Lecture audio abandonnée : {e}");
                }
            })?;

        Ok(Self { cmd_tx })
    }
}

impl AudioSink for MusicPlayer {
    fn play(&self) {
        if self.cmd_tx.try_send(PlayerCommand::Play).is_err() {
            log::warn!("Démarrage audio impossible : thread de lecture absent");
        }
    }

    fn stop(&self) {
        // Idempotent : le thread peut déjà être parti.
        let _ = self.cmd_tx.try_send(PlayerCommand::Stop);
    }
}

/// Corps du thread audio : attend `Play`, monte le stream de sortie,
/// puis le garde vivant jusqu'au `Stop` (ou la mort de l'émetteur).
fn run_playback(
    samples: Vec<f32>,
    sample_rate: u32,
    cmd_rx: &flume::Receiver<PlayerCommand>,
) -> Result<()> {
    match cmd_rx.recv() {
        Ok(PlayerCommand::Play) => {}
        // Stop avant le départ, ou lecteur abandonné.
        _ => return Ok(()),
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoOutputDevice)?;
    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config = supported.config();
    let channels = config.channels as usize;
    let ratio = f64::from(sample_rate) / f64::from(config.sample_rate.0);
    let samples = Arc::new(samples);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            build_output_stream::<f32>(&device, &config, samples, ratio, channels)?
        }
        cpal::SampleFormat::I16 => {
            build_output_stream::<i16>(&device, &config, samples, ratio, channels)?
        }
        cpal::SampleFormat::U16 => {
            build_output_stream::<u16>(&device, &config, samples, ratio, channels)?
        }
        fmt => return Err(AudioError::UnsupportedFormat(format!("{fmt:?}")).into()),
    };

    stream.play()?;
    log::info!(
        "Lecture audio démarrée @ {} Hz, {channels} canaux",
        config.sample_rate.0
    );

    // Le stream vit tant que ce thread attend.
    loop {
        match cmd_rx.recv() {
            Ok(PlayerCommand::Stop) | Err(_) => break,
            Ok(PlayerCommand::Play) => {}
        }
    }
    Ok(())
}

/// Monte un stream de sortie générique sur le format du périphérique.
/// Lecture linéaire avec ré-échantillonnage par pas fractionnaire ;
/// silence après la fin de la piste.
fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Vec<f32>>,
    ratio: f64,
    channels: usize,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut pos = 0.0f64;
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let idx = pos as usize;
                let sample = samples.get(idx).copied().unwrap_or(0.0);
                let out = T::from_sample(sample);
                for slot in frame.iter_mut() {
                    *slot = out;
                }
                if idx < samples.len() {
                    pos += ratio;
                }
            }
        },
        |err| {
            log::error!("Erreur de stream audio : {err}");
        },
        None,
    )?;
    Ok(stream)
}
