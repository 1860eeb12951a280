mod autoplay;

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand, ValueEnum};
use pulsefall_core::{
    BandAnalyzer, BeatClock, BeatDetector, BeatEvent, DetectorSettings, Difficulty, Game,
    GameConfig, GameEvent, Outcome, PlayMode, SignalSampler, Track, TrackSource,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::autoplay::Autoplay;

fn main() -> pulsefall_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            input,
            sample_rate,
            options,
            fps,
            autoplay,
            events,
        } => run_play(&input, sample_rate, &options, fps, autoplay, events),
        Commands::Chart {
            input,
            output,
            sample_rate,
            options,
            fps,
        } => run_chart(&input, &output, sample_rate, &options, fps),
    }
}

fn run_play(
    input: &Path,
    sample_rate: u32,
    options: &GameOptions,
    fps: u32,
    autoplay: bool,
    emit_events: bool,
) -> pulsefall_core::Result<()> {
    let config = options.resolve()?;
    tracing::info!(?input, mode = ?config.mode, difficulty = ?config.difficulty, "starting play");

    let Some(track) = Track::load(input, sample_rate)? else {
        tracing::warn!(?input, "no audio selected, nothing to play");
        return Ok(());
    };
    let duration = track.duration_seconds();

    let mut game = Game::new(config)?;
    let fft_size = game.config().sampler.fft_size;
    game.load_track(Some(Box::new(TrackSource::new(track, fft_size))));
    game.start();

    let mut bot = autoplay.then(Autoplay::default);
    let mut out = BufWriter::new(io::stdout().lock());
    let mut stats = PlayStats::default();
    let dt = 1.0 / fps.max(1) as f32;

    while game.now() < duration {
        game.tick(dt);
        if let Some(bot) = bot.as_mut() {
            bot.play(&mut game);
        }
        for event in game.drain_events() {
            stats.record(&event);
            if emit_events {
                serde_json::to_writer(&mut out, &event)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;

    tracing::info!(
        score = game.session().score(),
        max_combo = stats.max_combo,
        spawned = stats.spawned,
        hits = stats.hits,
        misses = stats.misses,
        "track finished"
    );
    Ok(())
}

fn run_chart(
    input: &Path,
    output: &Path,
    sample_rate: u32,
    options: &GameOptions,
    fps: u32,
) -> pulsefall_core::Result<()> {
    let config = options.resolve()?;
    tracing::info!(?input, ?output, difficulty = ?config.difficulty, "charting track");

    let Some(track) = Track::load(input, sample_rate)? else {
        tracing::warn!(?input, "no audio selected, nothing to chart");
        return Ok(());
    };
    let duration = track.duration_seconds();
    let fft_size = config.sampler.fft_size;

    let mut sampler = SignalSampler::new(fft_size);
    sampler.attach(Box::new(TrackSource::new(track, fft_size)));
    let analyzer = BandAnalyzer::new(config.detection.partition);
    let detector = BeatDetector::new(DetectorSettings::from_tier(
        &config.tier(),
        config.detection.discipline,
    ));

    // Charts list every beat, so the live note cap never applies.
    let mut clock = BeatClock::default();
    let mut beats = Vec::new();
    let dt = 1.0 / fps.max(1) as f32;
    let mut frame = 1_u64;
    loop {
        let time = frame as f32 * dt;
        if time > duration {
            break;
        }
        if let Some(snapshot) = sampler.sample(time) {
            let bands = analyzer.analyze(snapshot.bins(), snapshot.sample_rate());
            beats.extend(detector.detect(&bands, time, 0, &mut clock));
        }
        frame += 1;
    }

    let chart = Chart {
        sample_rate,
        duration_seconds: duration,
        difficulty: config.difficulty,
        beats,
    };
    let mut writer = BufWriter::new(File::create(output)?);
    serde_json::to_writer_pretty(&mut writer, &chart)?;
    writer.flush()?;

    tracing::info!(beats = chart.beats.len(), ?output, "chart written");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Debug, Serialize)]
struct Chart {
    sample_rate: u32,
    duration_seconds: f32,
    difficulty: Difficulty,
    beats: Vec<BeatEvent>,
}

#[derive(Debug, Default)]
struct PlayStats {
    spawned: usize,
    hits: usize,
    misses: usize,
    max_combo: u32,
}

impl PlayStats {
    fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::NoteSpawned { .. } => self.spawned += 1,
            GameEvent::NoteResolved {
                outcome: Outcome::Hit { .. },
                ..
            } => self.hits += 1,
            GameEvent::NoteResolved {
                outcome: Outcome::Miss,
                ..
            } => self.misses += 1,
            GameEvent::ScoreChanged { combo, .. } => self.max_combo = self.max_combo.max(*combo),
            _ => {}
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat-driven rhythm game", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a raw PCM track headlessly, optionally streaming game events.
    Play {
        /// Mono little-endian f32 PCM file.
        input: PathBuf,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[command(flatten)]
        options: GameOptions,
        /// Frames per second driving both ticks.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Let the built-in bot play.
        #[arg(long)]
        autoplay: bool,
        /// Write every game event to stdout as a JSON line.
        #[arg(long)]
        events: bool,
    },
    /// Detect the beats of a track ahead of time and write them as JSON.
    Chart {
        /// Mono little-endian f32 PCM file.
        input: PathBuf,
        /// Output path for the chart.
        output: PathBuf,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[command(flatten)]
        options: GameOptions,
        /// Analysis ticks per second.
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
}

#[derive(clap::Args, Debug)]
struct GameOptions {
    /// JSON configuration file. Missing keys use the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum)]
    difficulty: Option<DifficultyArg>,
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,
    /// Seed for note placement.
    #[arg(long)]
    seed: Option<u64>,
}

impl GameOptions {
    fn resolve(&self) -> pulsefall_core::Result<GameConfig> {
        let mut config = match &self.config {
            Some(path) => GameConfig::load(path)?,
            None => GameConfig::default(),
        };
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty.into();
        }
        if let Some(mode) = self.mode {
            config.mode = mode.into();
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Normal,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(value: DifficultyArg) -> Self {
        match value {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Normal => Difficulty::Normal,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Lanes,
    Pointer,
}

impl From<ModeArg> for PlayMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Lanes => PlayMode::Lanes,
            ModeArg::Pointer => PlayMode::Pointer,
        }
    }
}
