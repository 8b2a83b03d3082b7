use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use think_timeline_core::{
    build_timeline, preload_for_config, validate_timeline, verify_config, AudienceProfile,
    AudioHost, AudioScheduler, AudioSession, ImageFetcher, Playback, ScheduleAnchor, SoundBank,
    ThinkConfig, ThinkError, Week,
};
use tracing_subscriber::EnvFilter;

fn main() -> think_timeline_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { config, output } => run_build(&config.resolve()?, output.as_ref()),
        Commands::Validate { config } => run_validate(&config.resolve()?),
        Commands::Verify { config, seeds } => run_verify(&config.resolve()?, seeds),
        Commands::Simulate { config, step_ms } => run_simulate(&config.resolve()?, step_ms),
    }
}

fn run_build(config: &ThinkConfig, output: Option<&PathBuf>) -> think_timeline_core::Result<()> {
    tracing::info!(week = config.week.number(), seed = config.seed, "building timeline");
    let json = build_timeline(config).to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(?path, "timeline written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn run_validate(config: &ThinkConfig) -> think_timeline_core::Result<()> {
    let result = validate_timeline(&build_timeline(config));
    print!("{result}");
    if result.is_valid {
        Ok(())
    } else {
        Err(ThinkError::msg("timeline failed structural validation"))
    }
}

fn run_verify(config: &ThinkConfig, seeds: u32) -> think_timeline_core::Result<()> {
    let mut failures = 0;
    for offset in 0..seeds.max(1) {
        let mut config = config.clone();
        config.seed = config.seed.wrapping_add(offset);
        let report = verify_config(&config);
        if !report.passed {
            failures += 1;
        }
        println!("seed {}:", config.seed);
        print!("{report}");
    }
    if failures == 0 {
        Ok(())
    } else {
        Err(ThinkError::msg(format!("{failures} seed(s) failed verification")))
    }
}

fn run_simulate(config: &ThinkConfig, step_ms: u32) -> think_timeline_core::Result<()> {
    let timeline = build_timeline(config);
    let mut playback = Playback::new(&timeline);

    let report = preload_for_config(&config.assets, config.week, config.month, &mut LoggingFetcher);
    tracing::info!(loaded = report.loaded, failed = report.failed.len(), "assets preloaded");
    playback.mark_assets_ready();

    let bank = SoundBank {
        tick: Some("sounds/tick.mp3".to_string()),
        recall_start: Some("sounds/recall.mp3".to_string()),
        music: Some("sounds/music.mp3".to_string()),
    };
    let mut session = AudioSession::init(LoggingHost::default(), &bank);
    let summary =
        AudioScheduler::new(&timeline).schedule(&mut session, ScheduleAnchor::new(0.0, 0.0));
    tracing::info!(scheduled = summary.scheduled, "audio cues scheduled");

    let mut last_phase = None;
    while !playback.is_finished() {
        let event = playback.advance(step_ms.max(1));
        session.host_mut().now = f64::from(playback.position_ms()) / 1000.0;
        session.poll();
        if let Some(event) = event {
            if last_phase != Some(event.phase) {
                tracing::info!(phase = ?event.phase, at_ms = event.t0, "phase");
                last_phase = Some(event.phase);
            }
        }
    }

    let host = session.teardown();
    tracing::info!(sounds = host.played, "simulation finished");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Accepts every image; real decoding belongs to the renderer host.
struct LoggingFetcher;

impl ImageFetcher for LoggingFetcher {
    fn fetch_and_decode(&mut self, url: &str) -> think_timeline_core::Result<()> {
        tracing::debug!(url, "preload image");
        Ok(())
    }
}

/// Audio host that only advances a virtual clock and logs dispatches.
#[derive(Debug, Default)]
struct LoggingHost {
    now: f64,
    buffers: Vec<String>,
    played: usize,
}

impl AudioHost for LoggingHost {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn decode(&mut self, url: &str) -> think_timeline_core::Result<usize> {
        self.buffers.push(url.to_string());
        Ok(self.buffers.len() - 1)
    }

    fn play(&mut self, buffer: usize, at: f64, gain: f32) -> think_timeline_core::Result<u64> {
        self.played += 1;
        let url = self.buffers.get(buffer).map(String::as_str).unwrap_or("?");
        tracing::trace!(url, at, gain, "play");
        Ok(self.played as u64)
    }

    fn stop(&mut self, voice: u64, at: f64) {
        tracing::trace!(voice, at, "stop");
    }

    fn ramp_gain(&mut self, voice: u64, target: f32, at: f64, ramp_seconds: f64) {
        tracing::trace!(voice, target, at, ramp_seconds, "ramp");
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic Think routine timeline compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a timeline and write it as JSON.
    Build {
        #[command(flatten)]
        config: ConfigArgs,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the structural checks on a compiled timeline.
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Run the statistical checks, optionally over consecutive seeds.
    Verify {
        #[command(flatten)]
        config: ConfigArgs,
        /// Number of consecutive seeds to verify, starting at `--seed`.
        #[arg(long, default_value_t = 1)]
        seeds: u32,
    },
    /// Play a timeline against a logging audio host.
    Simulate {
        #[command(flatten)]
        config: ConfigArgs,
        /// Virtual frame step in milliseconds.
        #[arg(long, default_value_t = 16)]
        step_ms: u32,
    },
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// JSON config file. Flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Week rule variant (out-of-range values snap to 1..=4).
    #[arg(short, long)]
    week: Option<i64>,
    /// Audience timing profile, e.g. `700ms` or `junior`.
    #[arg(short, long)]
    audience: Option<String>,
    #[arg(short, long)]
    seed: Option<u32>,
    #[arg(short, long)]
    month: Option<u8>,
}

impl ConfigArgs {
    fn resolve(&self) -> think_timeline_core::Result<ThinkConfig> {
        let mut config = match &self.config {
            Some(path) => ThinkConfig::load(path)?,
            None => ThinkConfig::default(),
        };
        if let Some(week) = self.week {
            config.week = Week::from(week);
        }
        if let Some(audience) = &self.audience {
            config.audience = AudienceProfile::parse_lenient(audience);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(month) = self.month {
            config.month = Some(month);
        }
        Ok(config)
    }
}
