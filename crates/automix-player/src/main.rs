//! Automix player - headless dual-deck playback of analyzed mixes
//!
//! This is the main entry point. It:
//! 1. Fetches a completed analysis job (tracks + mix instructions)
//! 2. Opens the default audio output, falling back to clock-only playback
//! 3. Runs the auto-DJ frame loop until the mix finishes
//!
//! ## Command line flags
//!
//! - `--job <id>`: analysis job to play (required)
//! - `--manual`: play the job's tracks back to back, ignoring the mix plan
//! - `--config <path>`: config file override

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use automix_core::api::BackendClient;
use automix_core::loader::TrackLoader;
use automix_core::media::clock::ClockElement;
use automix_core::media::output::AudioOutput;
use automix_core::media::MediaElement;
use automix_core::model::JobStatus;
use automix_core::scheduler::AutoDj;
use automix_core::service::DeckService;
use automix_core::{NUM_DECKS, SAMPLE_RATE};

/// Frame cadence of the control loop
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// How often the status line is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

const USAGE: &str = "usage: automix-player --job <id> [--manual] [--config <path>]";

struct Args {
    job_id: String,
    config_path: Option<PathBuf>,
    /// Play the job's tracks back to back instead of executing the mix plan
    manual: bool,
}

fn parse_args() -> Result<Args> {
    let mut job_id = None;
    let mut config_path = None;
    let mut manual = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--job" => {
                job_id = Some(args.next().context("--job requires a job id")?);
            }
            "--config" => {
                config_path = Some(PathBuf::from(
                    args.next().context("--config requires a path")?,
                ));
            }
            "--manual" => manual = true,
            other => bail!("unknown argument: {} ({})", other, USAGE),
        }
    }

    let Some(job_id) = job_id else {
        bail!("{}", USAGE);
    };
    Ok(Args { job_id, config_path, manual })
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    log::info!("automix-player starting up, job {}", args.job_id);

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                      Automix Player                          ║");
    println!("║              dual-deck automated DJ playback                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let config_path = args.config_path.unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(&config_path);

    let client = BackendClient::new(&cfg.api.base_url, cfg.api.session_cookie.clone());

    let job = client
        .job_results(&args.job_id)
        .with_context(|| format!("failed to fetch job {} from {}", args.job_id, client.base_url()))?;
    if job.status != JobStatus::Completed {
        bail!(
            "job {} is not ready to play (status: {:?}{})",
            job.id,
            job.status,
            job.error_message
                .as_deref()
                .map(|m| format!(", error: {}", m))
                .unwrap_or_default()
        );
    }
    let playlist_name = job.playlist_name.as_deref().unwrap_or("untitled mix");
    let mut dj = if args.manual {
        if job.tracks.is_empty() {
            bail!("job {} has no tracks to play", job.id);
        }
        println!(
            "Playing '{}' track by track: {} tracks",
            playlist_name,
            job.tracks.len()
        );
        AutoDj::manual(job.tracks.clone())
    } else {
        let Some(mix) = &job.mix_instructions else {
            bail!(
                "job {} completed without mix instructions (use --manual to play its tracks back to back)",
                job.id
            );
        };
        println!(
            "Playing '{}': {} tracks, {} transitions, {:.0}s total",
            playlist_name,
            mix.total_tracks,
            mix.transitions.len(),
            mix.total_duration
        );
        AutoDj::new(mix, job.tracks.clone())
    };

    // Open audio; without a device the mix still runs on wall-clock elements
    // (useful for dry runs and CI).
    let (audio, elements): (Option<AudioOutput>, [Box<dyn MediaElement>; NUM_DECKS]) =
        match AudioOutput::start(cfg.audio.master_volume) {
            Ok((output, [element_a, element_b])) => {
                (Some(output), [Box::new(element_a), Box::new(element_b)])
            }
            Err(e) => {
                log::warn!("No audio output ({}), running silent", e);
                eprintln!("Warning: could not open audio output: {}", e);
                eprintln!("Running silent with clock-driven playback");
                (None, [Box::new(ClockElement::new()), Box::new(ClockElement::new())])
            }
        };
    let sample_rate = audio.as_ref().map(AudioOutput::sample_rate).unwrap_or(SAMPLE_RATE);

    let loader = TrackLoader::spawn(Arc::new(client.clone()), sample_rate);
    let mut service = DeckService::new(elements, loader);

    dj.start(&mut service);

    let mut last_status = Instant::now();
    while dj.is_active() {
        dj.tick(&mut service);

        if last_status.elapsed() >= STATUS_INTERVAL {
            last_status = Instant::now();
            let snapshot = dj.snapshot(&service);
            let title = snapshot
                .current_track
                .as_ref()
                .map(|t| t.title.as_str())
                .unwrap_or("-");
            log::info!(
                "[{}] {} @ {:.1}s, crossfader {:.2}, {} transitions done",
                snapshot.status,
                title,
                snapshot.current_position,
                service.crossfader(),
                dj.completed_transitions()
            );
        }

        std::thread::sleep(FRAME_INTERVAL);
    }

    println!(
        "Mix finished: {} transitions played",
        dj.completed_transitions()
    );

    // The stream handle must stay alive for the whole mix
    drop(audio);
    Ok(())
}
