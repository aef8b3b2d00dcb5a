//! vibedaw-player: plays the demo song on the default output device

mod config;
mod demo;

use std::thread;
use std::time::Instant;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vibedaw_services::{AudioSession, Sequencer};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("vibedaw=debug".parse()?)
            .add_directive("cpal=warn".parse()?))
        .init();

    let config = config::load_config();
    tracing::info!(path = %config::config_path().display(), "Starting vibedaw player");

    let song = demo::demo_song();
    let session = AudioSession::realtime(&config.engine);
    let mut sequencer = Sequencer::new(session, config.engine.drift_policy);
    sequencer.preload(&song, config.engine.fetch_timeout());

    let clock = Instant::now();
    sequencer
        .play(&song, clock.elapsed().as_secs_f64())
        .context("Failed to start playback")?;

    let frame = config.playback.frame_interval();
    while clock.elapsed().as_secs_f64() < config.playback.duration_secs {
        thread::sleep(frame);
        sequencer.tick(&song, clock.elapsed().as_secs_f64());
    }

    sequencer.stop();
    // Let the release fades reach the device before the stream goes away
    thread::sleep(frame * 3);
    sequencer.close();

    tracing::info!(elapsed = clock.elapsed().as_secs_f64(), "Done");
    Ok(())
}
