//! Offline WAV feedback analysis.

use crate::config::Settings;
use anyhow::Context;
use clap::Args;
use hound::{SampleFormat, WavReader};
use indicatif::{ProgressBar, ProgressStyle};
use larsen_core::{
    Error, FeedbackDetector, PreventionAction, PreventionController, SecureSampleBuffer,
    compute_peaks, linear_to_db,
};
use std::path::{Path, PathBuf};

#[derive(Args)]
#[command(allow_negative_numbers = true)]
pub struct AnalyzeArgs {
    /// Input WAV file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Analysis window size in frames
    #[arg(long, default_value = "4096")]
    window: usize,

    /// Detection threshold in dBFS
    #[arg(long)]
    threshold_db: Option<f32>,

    /// Noise floor in dBFS
    #[arg(long)]
    noise_floor_db: Option<f32>,

    /// Window-to-window stability epsilon in dB
    #[arg(long)]
    epsilon_db: Option<f32>,

    /// Consecutive suspect windows required to trigger
    #[arg(long)]
    sustain: Option<u32>,

    /// TOML settings file (flags override file values)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Read a WAV file as interleaved f32 frames.
///
/// Integer formats are normalized to [-1.0, 1.0]; float formats are clamped
/// to full scale so out-of-range masters don't fail buffer validation.
fn read_wav_interleaved(path: &Path) -> anyhow::Result<(Vec<f32>, usize, u32)> {
    let reader =
        WavReader::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v.clamp(-1.0, 1.0)))
            .collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
    };

    Ok((samples, channels, spec.sample_rate))
}

pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.window > 0, "window size must be at least 1 frame");

    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let mut detector_config = settings.detector_config();
    if let Some(v) = args.threshold_db {
        detector_config.detection_threshold_db = v;
    }
    if let Some(v) = args.noise_floor_db {
        detector_config.noise_floor_db = v;
    }
    if let Some(v) = args.epsilon_db {
        detector_config.stability_epsilon_db = v;
    }
    if let Some(v) = args.sustain {
        detector_config.sustained_trigger_count = v;
    }

    let (samples, channels, sample_rate) = read_wav_interleaved(&args.input)?;
    anyhow::ensure!(channels > 0, "input file reports zero channels");
    let total_frames = samples.len() / channels;
    // Guard against truncated files: only analyze whole frames.
    let samples = &samples[..total_frames * channels];
    println!(
        "Analyzing {}: {} channels, {} Hz, {:.2}s, {}-frame windows",
        args.input.display(),
        channels,
        sample_rate,
        total_frames as f32 / sample_rate as f32,
        args.window
    );

    let mut buffer = SecureSampleBuffer::new(channels, args.window)
        .context("cannot allocate analysis buffer")?;
    let mut detector =
        FeedbackDetector::new(detector_config).context("invalid detector configuration")?;
    let mut controller = PreventionController::new(settings.prevention_policy())
        .context("invalid prevention policy")?;

    let window_samples = args.window * channels;
    let window_count = samples.len().div_ceil(window_samples);

    let pb = ProgressBar::new(window_count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("##-"),
    );

    let mut events = Vec::new();
    let mut channel_peaks = vec![0.0_f32; channels];

    for (index, chunk) in samples.chunks(window_samples).enumerate() {
        let frames = buffer.write_interleaved(chunk)?;
        let peaks: Vec<f32> = buffer
            .with_scoped_access(frames, |view| compute_peaks(view).map_err(Error::from))?;

        for (held, &fresh) in channel_peaks.iter_mut().zip(&peaks) {
            if fresh > *held {
                *held = fresh;
            }
        }

        if let Some(event) = detector.update(&peaks) {
            let action = controller.on_event(&event);
            let time_secs = (index * args.window) as f32 / sample_rate as f32;
            events.push((index, time_secs, event, action));
        }
        pb.set_position(index as u64 + 1);
    }
    pb.finish_and_clear();

    println!("\nPer-channel peak levels:");
    for (channel, &peak) in channel_peaks.iter().enumerate() {
        println!("  channel {}: {:>7.2} dBFS", channel, linear_to_db(peak));
    }

    if events.is_empty() {
        println!("\nNo sustained feedback found in {} windows.", window_count);
        return Ok(());
    }

    println!("\nSustained feedback in {} of {} windows:", events.len(), window_count);
    for (index, time_secs, event, action) in &events {
        println!(
            "  window {:>5} ({:>8.2}s)  channels {:?}  magnitude {:.3}",
            index, time_secs, event.channels, event.magnitude
        );
        match action {
            Some(PreventionAction::GainReduction { amount_db }) => {
                println!("      -> reduce gain by {:.1} dB", amount_db);
            }
            Some(PreventionAction::ChannelMute { channels }) => {
                println!("      -> mute channels {:?}", channels);
            }
            Some(PreventionAction::RouteChange { from, to }) => {
                println!("      -> reroute {} -> {}", from, to);
            }
            None => {}
        }
    }

    Ok(())
}
