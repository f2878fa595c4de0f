use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::{Hint, ProbeResult};

/// A fully decoded track, samples interleaved by channel.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Per-frame channel average. NaN and infinite samples count as zero.
    pub fn mono(&self) -> Vec<f32> {
        self.samples
            .chunks(self.channels.max(1))
            .map(|frame| {
                frame.iter().filter(|s| s.is_finite()).sum::<f32>() / frame.len() as f32
            })
            .collect()
    }
}

/// Tag and container facts gathered without decoding any audio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_number: Option<u32>,
    pub duration: Option<Duration>,
}

impl TrackInfo {
    /// Fill tags still missing here from `other`.
    fn or(self, other: TrackInfo) -> TrackInfo {
        TrackInfo {
            title: self.title.or(other.title),
            artist: self.artist.or(other.artist),
            album: self.album.or(other.album),
            track_number: self.track_number.or(other.track_number),
            duration: self.duration.or(other.duration),
        }
    }
}

fn probe(path: &Path) -> Result<ProbeResult> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")
}

pub fn probe_track(path: &Path) -> Result<TrackInfo> {
    let mut probed = probe(path)?;

    // Tags ahead of the container (ID3v2) win over the container's own.
    let mut info = probed
        .metadata
        .get()
        .and_then(|m| m.current().map(read_tags))
        .unwrap_or_default();
    if let Some(rev) = probed.format.metadata().current() {
        info = info.or(read_tags(rev));
    }

    info.duration = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .and_then(|t| {
            let frames = t.codec_params.n_frames?;
            let rate = t.codec_params.sample_rate?;
            Some(Duration::from_secs_f64(frames as f64 / rate as f64))
        });

    Ok(info)
}

fn read_tags(rev: &MetadataRevision) -> TrackInfo {
    let text = |wanted: fn(&StandardTagKey) -> bool| {
        rev.tags()
            .iter()
            .find(|t| t.std_key.as_ref().is_some_and(wanted))
            .map(|t| t.value.to_string().trim().to_string())
            .filter(|s| !s.is_empty())
    };

    TrackInfo {
        title: text(|k| matches!(k, StandardTagKey::TrackTitle)),
        artist: text(|k| matches!(k, StandardTagKey::Artist | StandardTagKey::AlbumArtist)),
        album: text(|k| matches!(k, StandardTagKey::Album)),
        track_number: text(|k| matches!(k, StandardTagKey::TrackNumber))
            .and_then(|n| parse_track_number(&n)),
        duration: None,
    }
}

/// "7", "07" and "7/12" all read as 7.
fn parse_track_number(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn decode_audio(path: &Path) -> Result<DecodedAudio> {
    let probed = probe(path)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend_from_slice(sample_buf.samples());
    }

    let audio = DecodedAudio {
        samples: all_samples,
        channels: channels.max(1),
        sample_rate,
    };

    log::info!(
        "Decoded {}: {} frames x {}ch, {}Hz, {:.1}s",
        path.display(),
        audio.frames(),
        audio.channels,
        sample_rate,
        audio.duration().as_secs_f32()
    );

    Ok(audio)
}
