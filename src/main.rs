mod cli;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cli::{AnalyzeArgs, Cli, Command, PlayArgs};
use scopeplay::audio::analysis::analyze_track;
use scopeplay::audio::decode::decode_audio;
use scopeplay::audio::engine::{DecodedEngine, SharedEngine};
use scopeplay::config::{self, Settings};
use scopeplay::pipeline::{FrameProducer, TickScheduler};
use scopeplay::playlist::persist::{self, LoadMode};
use scopeplay::playlist::{import, PlaybackMode, Player, SharedPlaylist};
use scopeplay::render::{Drawable, RendererKind};
use scopeplay::{EventBus, PlaylistChange, UiEvent};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if cli.list_renderers {
        println!("Available renderers:");
        for kind in RendererKind::ALL {
            if let Some(value) = kind.to_possible_value() {
                println!("  {:<14} {}", value.get_name(), kind.display_name());
            }
        }
        return Ok(());
    }

    let settings = load_settings(cli.config.as_deref());

    match cli.command {
        Some(Command::Play(args)) => play(args, settings),
        Some(Command::Analyze(args)) => analyze(args, settings),
        None => bail!("Nothing to do; try `scopeplay play <files>` or --help"),
    }
}

/// Explicit --config path, or the first discovered config file. A broken
/// file is reported and defaults are used.
fn load_settings(explicit: Option<&Path>) -> Settings {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(config::discover_config) else {
        return Settings::default();
    };
    match config::load_config(&path) {
        Ok(settings) => {
            log::info!("Loaded config from {}", path.display());
            settings
        }
        Err(e) => {
            log::warn!("Failed to load config from {}: {:#}", path.display(), e);
            Settings::default()
        }
    }
}

fn play(args: PlayArgs, mut settings: Settings) -> Result<()> {
    if let Some(renderer) = args.renderer {
        settings.visual.renderer = renderer;
    }
    if let Some(fps) = args.fps {
        settings.visual.tick_hz = fps;
    }
    let settings = settings.validated();

    let bus = EventBus::new();
    let events = bus.subscribe();
    let playlist = SharedPlaylist::new(settings.playlist.undo_capacity, bus.clone());

    if args.inputs.is_empty() {
        let saved = config::playlist_path().context("No config directory for the saved playlist")?;
        persist::load_into(
            &playlist,
            &saved,
            LoadMode::Replace,
            settings.playlist.skip_missing,
            settings.playlist.undo_capacity,
        )?;
    } else {
        let paths = import::collect_inputs(&args.inputs)?;
        log::info!("Reading tags of {} file(s)...", paths.len());
        let tracks: Vec<_> = paths.par_iter().map(|p| import::describe(p)).collect();
        playlist.import(tracks);
    }
    if playlist.is_empty() {
        bail!("Playlist is empty");
    }

    let decoded = Arc::new(Mutex::new(DecodedEngine::new()));
    let engine: SharedEngine = decoded.clone();

    let mode = PlaybackMode {
        shuffle: args.shuffle,
        repeat: args.repeat,
    };
    let mut player = Player::new(playlist.clone(), engine.clone(), mode);

    let producer = FrameProducer::new(engine, &settings, bus.clone());
    let scheduler = TickScheduler::spawn(producer, settings.visual.tick_hz)?;
    log::info!(
        "Rendering {} at {} Hz",
        settings.visual.renderer.display_name(),
        settings.visual.tick_hz
    );

    if player.next()?.is_none() {
        bail!("No playable tracks");
    }

    let limit = args.seconds.map(Duration::from_secs_f64);
    let every = args.every.max(1);
    let mut bar: Option<ProgressBar> = None;

    while player.current().is_some() {
        for event in events.try_iter() {
            if let UiEvent::PlaylistChanged(PlaylistChange::NowPlaying(id)) = event {
                if let Some(old) = bar.take() {
                    old.finish();
                }
                let title = playlist
                    .read()
                    .get(id)
                    .map(|e| e.title.clone())
                    .unwrap_or_default();
                bar = Some(track_bar(&title, decoded.lock().duration())?);
            }
        }

        match scheduler.frames().recv_timeout(Duration::from_millis(100)) {
            Ok(frame) if frame.tick % every == 0 => {
                let line = format!("{:>6} {}", frame.tick, frame.drawable.sparkline(args.width));
                match &bar {
                    Some(pb) => pb.println(line),
                    None => println!("{}", line),
                }
            }
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        {
            let mut engine = decoded.lock();
            let position = engine.position();
            if let Some(pb) = &bar {
                pb.set_position(position.as_millis() as u64);
            }
            if limit.is_some_and(|limit| position >= limit) {
                let end = engine.duration();
                engine.seek(end);
            }
        }

        player.poll()?;
    }

    if let Some(pb) = bar {
        pb.finish_with_message("done");
    }

    let producer = scheduler.stop()?;
    let stats = producer.stats();
    log::info!(
        "{} frames shown, {} dropped, {} skipped",
        stats.delivered,
        stats.dropped,
        stats.skipped
    );

    if let Some(target) = args.save {
        let path = match target {
            Some(path) => path,
            None => config::playlist_path().context("No config directory for the saved playlist")?,
        };
        persist::save(&playlist.read(), &path)?;
    }

    Ok(())
}

fn track_bar(title: &str, duration: Duration) -> Result<ProgressBar> {
    let pb = ProgressBar::new(duration.as_millis() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:30!} [{elapsed_precise}] {bar:40.cyan/blue} {percent}%")?
            .progress_chars("=>-"),
    );
    pb.set_message(title.to_string());
    Ok(pb)
}

#[derive(Serialize)]
struct AnalysisReport {
    input: PathBuf,
    sample_rate: u32,
    channels: usize,
    fft_size: usize,
    hop: usize,
    duration_secs: f64,
    frames: Vec<FluxPoint>,
}

#[derive(Serialize)]
struct FluxPoint {
    tick: u64,
    time_secs: f64,
    flux: f32,
    peak_hz: Option<f32>,
}

fn analyze(args: AnalyzeArgs, settings: Settings) -> Result<()> {
    let fft_size = args
        .fft_size
        .unwrap_or(settings.analysis.fft_size)
        .max(2)
        .next_power_of_two();
    let hop = args.hop.max(1);

    log::info!("Decoding audio...");
    let audio = decode_audio(&args.input)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Analyzing...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let frames = analyze_track(&audio, fft_size, hop);
    spinner.finish_and_clear();

    if frames.is_empty() {
        bail!("No audio in {}", args.input.display());
    }

    let bin_hz = audio.sample_rate as f32 / fft_size as f32;
    let points: Vec<FluxPoint> = frames
        .iter()
        .map(|f| FluxPoint {
            tick: f.tick,
            time_secs: (f.tick as usize * hop) as f64 / audio.sample_rate as f64,
            flux: f.spectral_flux,
            peak_hz: f.peak_bin().map(|b| b as f32 * bin_hz),
        })
        .collect();

    let peak = points
        .iter()
        .max_by(|a, b| a.flux.total_cmp(&b.flux))
        .map(|p| (p.flux, p.time_secs))
        .unwrap_or_default();
    let mean = points.iter().map(|p| p.flux).sum::<f32>() / points.len() as f32;

    let envelope: Vec<f32> = points
        .iter()
        .map(|p| if peak.0 > 0.0 { p.flux / peak.0 } else { 0.0 })
        .collect();
    println!("{}", Drawable::Bars(envelope).sparkline(64));
    log::info!(
        "{} frames, mean flux {:.3}, peak flux {:.3} at {:.2}s",
        points.len(),
        mean,
        peak.0,
        peak.1
    );

    if let Some(output) = &args.output {
        let report = AnalysisReport {
            input: args.input.clone(),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            fft_size,
            hop,
            duration_secs: audio.duration().as_secs_f64(),
            frames: points,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        log::info!("Wrote flux envelope to {}", output.display());
    }

    Ok(())
}
