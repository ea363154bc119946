//! Live capture monitoring.
//!
//! Thin platform glue: a cpal input stream feeds each callback buffer to
//! the monitor as one analysis tick. All detection logic lives behind the
//! monitor boundary; this command only owns the stream and the shutdown
//! signal.

use crate::config::Settings;
use anyhow::Context;
use clap::Args;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host};
use larsen_core::linear_to_db;
use larsen_monitor::{FeedbackMonitor, MonitorConfig, PreventionAction};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Args)]
pub struct LiveArgs {
    /// Input device name (substring match; default device if omitted)
    #[arg(long)]
    device: Option<String>,

    /// Bound on pending analysis ticks
    #[arg(long, default_value = "8")]
    queue_depth: usize,

    /// TOML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Extract device name via `description()` (cpal 0.17+).
fn device_name(device: &Device) -> Option<String> {
    device.description().ok().map(|d| d.name().to_string())
}

fn find_input_device(host: &Host, name: &str) -> anyhow::Result<Device> {
    let needle = name.to_lowercase();
    host.input_devices()
        .context("cannot enumerate input devices")?
        .find(|device| {
            device_name(device)
                .map(|n| n.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .with_context(|| format!("no input device matching '{name}'"))
}

pub fn run(args: LiveArgs) -> anyhow::Result<()> {
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let host = cpal::default_host();
    let device = match &args.device {
        Some(name) => find_input_device(&host, name)?,
        None => host
            .default_input_device()
            .context("no default input device")?,
    };
    let supported = device
        .default_input_config()
        .context("cannot read device input config")?;
    let channels = supported.channels() as usize;
    let sample_rate = supported.sample_rate();

    println!(
        "Monitoring {} ({} channels, {} Hz). Ctrl-C to stop.",
        device_name(&device).unwrap_or_else(|| "<unnamed>".into()),
        channels,
        sample_rate
    );

    let monitor = FeedbackMonitor::new(MonitorConfig {
        queue_depth: args.queue_depth,
        detector: settings.detector_config(),
        policy: settings.prevention_policy(),
        // Capacity for the largest callback buffer a backend will
        // reasonably deliver in one go.
        ..MonitorConfig::new(channels, 16384)
    })?;

    monitor.on_feedback_event(|event| {
        println!(
            "!! feedback on channels {:?} (magnitude {:.2} dBFS)",
            event.channels,
            linear_to_db(event.magnitude)
        );
    });
    monitor.on_prevention_action(|action| match action {
        PreventionAction::GainReduction { amount_db } => {
            println!("   -> reduce gain by {amount_db:.1} dB");
        }
        PreventionAction::ChannelMute { channels } => {
            println!("   -> mute channels {channels:?}");
        }
        PreventionAction::RouteChange { from, to } => {
            println!("   -> reroute {from} -> {to}");
        }
    });

    let monitor = Arc::new(monitor);

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        println!("\nStopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    let callback_monitor = Arc::clone(&monitor);
    let stream = device
        .build_input_stream(
            &supported.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // A rejected tick (clipped or non-finite capture) is dropped
                // and the session continues.
                if let Err(err) = callback_monitor.submit_interleaved(data) {
                    tracing::debug!(error = %err, "tick rejected");
                }
            },
            |err| tracing::error!(error = %err, "input stream error"),
            None,
        )
        .context("cannot build input stream")?;
    stream.play().context("cannot start input stream")?;

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }

    drop(stream);
    println!("Dropped ticks: {}", monitor.dropped_ticks());
    if let Ok(mut monitor) = Arc::try_unwrap(monitor) {
        monitor.stop();
    }

    Ok(())
}
