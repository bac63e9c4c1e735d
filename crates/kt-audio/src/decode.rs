use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::{AudioBufferRef, Channels, SampleBuffer};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Piste prête à décoder, sortie de la phase de probe.
struct LoadedTrack {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

/// Décode un fichier audio en échantillons f32 mono.
///
/// Le lecteur annonce du MP3 ; WAV, FLAC et OGG passent par le même
/// probe. L'entrée stéréo est moyennée en mono, le stream de sortie
/// re-duplique le canal de toute façon.
///
/// # Errors
/// Fichier illisible, format inconnu, ou flux irrécupérable. Une
/// frame isolée corrompue est ignorée avec un avertissement.
pub fn decode_file(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let mut track = open_track(path)?;
    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match track.reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Flux audio tronqué : {e}");
                break;
            }
        };
        if packet.track_id() != track.track_id {
            continue;
        }
        match track.decoder.decode(&packet) {
            Ok(audio) => downmix_into(audio, track.channels, &mut mono),
            // une frame corrompue n'invalide pas la piste
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Frame audio corrompue, ignorée : {msg}");
            }
            Err(e) => return Err(e).context("Décodage audio interrompu"),
        }
    }

    log::info!(
        "Piste décodée : {} échantillons @ {} Hz depuis {}",
        mono.len(),
        track.sample_rate,
        path.display()
    );

    Ok((mono, track.sample_rate))
}

/// Ouvre le fichier, identifie le format et monte le décodeur de la
/// piste par défaut.
fn open_track(path: &Path) -> Result<LoadedTrack> {
    let file = File::open(path)
        .with_context(|| format!("Fichier audio illisible : {}", path.display()))?;
    let stream = MediaSourceStream::new(
        Box::new(file),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let reader = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Format audio non reconnu")?
        .format;

    let (track_id, codec_params) = {
        let track = reader
            .default_track()
            .context("Aucune piste audio par défaut")?;
        (track.id, track.codec_params.clone())
    };
    let decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .context("Décodeur audio indisponible")?;

    Ok(LoadedTrack {
        reader,
        decoder,
        track_id,
        sample_rate: codec_params.sample_rate.unwrap_or(44_100),
        channels: codec_params.channels.map_or(1, Channels::count),
    })
}

/// Moyenne un bloc décodé sur ses canaux et l'ajoute à `mono`.
fn downmix_into(audio: AudioBufferRef<'_>, channels: usize, mono: &mut Vec<f32>) {
    let channels = channels.max(1);
    let mut interleaved = SampleBuffer::<f32>::new(audio.capacity() as u64, *audio.spec());
    interleaved.copy_interleaved_ref(audio);
    mono.extend(
        interleaved
            .samples()
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// WAV PCM 16 bits minimal : en-tête RIFF + chunk fmt + chunk data.
    fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    #[test]
    fn decodes_a_minimal_wav() {
        let samples: Vec<i16> = vec![0, 8192, -8192, 16384, -16384, 0, 4096, -4096];
        let path = std::env::temp_dir().join("kt_audio_decode_test.wav");
        let mut f = File::create(&path).unwrap();
        f.write_all(&wav_bytes(&samples, 8000)).unwrap();
        drop(f);

        let (decoded, rate) = decode_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(rate, 8000);
        assert_eq!(decoded.len(), samples.len());
        assert!((decoded[1] - 0.25).abs() < 0.01);
        assert!((decoded[2] + 0.25).abs() < 0.01);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(decode_file("/nonexistent/kt.mp3").is_err());
    }
}
