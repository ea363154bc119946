//! Capture device listing.

use clap::Args;
use cpal::traits::{DeviceTrait, HostTrait};

#[derive(Args)]
pub struct DevicesArgs {}

pub fn run(_args: DevicesArgs) -> anyhow::Result<()> {
    let host = cpal::default_host();

    let default_name = host.default_input_device().and_then(|device| {
        device
            .description()
            .ok()
            .map(|description| description.name().to_string())
    });

    let mut found = false;
    println!("Capture Devices");
    println!("===============\n");

    if let Ok(devices) = host.input_devices() {
        for (index, device) in devices.enumerate() {
            let Ok(description) = device.description() else {
                continue;
            };
            let name = description.name().to_string();
            found = true;

            let details = device
                .default_input_config()
                .map(|config| {
                    format!("{} Hz, {} ch", config.sample_rate(), config.channels())
                })
                .unwrap_or_else(|_| "unavailable".into());
            let marker = if Some(&name) == default_name.as_ref() {
                " (default)"
            } else {
                ""
            };
            println!("  [{index}] {name} ({details}){marker}");
        }
    }

    if !found {
        println!("No capture devices found.");
    }

    Ok(())
}
