//! Ocean Loop headless runner
//!
//! Drives the simulation without a window: spawns a few clusters, runs a fixed
//! number of ticks and logs what a renderer and synthesizer would have received.
//! Set `RUST_LOG=debug` for per-spawn output.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use clap::Parser;
    use glam::Vec2;

    use ocean_loop::Settings;
    use ocean_loop::audio_worker::{AudioWorker, WorkerParams};
    use ocean_loop::sim::{AudioInput, Command, SimState, TickInput, tick};

    /// Command line arguments
    #[derive(Parser, Debug)]
    #[command(name = "ocean-loop")]
    #[command(about = "Headless particle simulation runner", long_about = None)]
    pub struct Args {
        /// Settings JSON file (missing fields use defaults)
        #[arg(long, value_name = "PATH")]
        pub settings: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(long, default_value = "900")]
        pub ticks: u64,

        /// Random clusters spawned at start
        #[arg(long, default_value = "3")]
        pub groups: u32,

        /// Override the settings seed
        #[arg(long)]
        pub seed: Option<u64>,

        /// Cross-check audio mapping on the worker thread
        #[arg(long)]
        pub worker: bool,

        /// Write the final scene JSON here
        #[arg(long, value_name = "PATH")]
        pub save: Option<PathBuf>,
    }

    pub fn run(args: Args) -> ocean_loop::Result<()> {
        let mut settings = match &args.settings {
            Some(path) => Settings::from_json(&std::fs::read_to_string(path)?)?,
            None => Settings::default(),
        };
        if let Some(seed) = args.seed {
            settings.seed = seed;
        }

        let worker = args.worker.then(|| AudioWorker::spawn(WorkerParams::from(&settings)));
        let mut state = SimState::new(settings)?;
        state.queue(Command::ScatterRandom { groups: args.groups });

        // Pointer sweeps slowly across the middle of the viewport
        let center = state.viewport().center();
        let mut playing_peak = 0;
        for t in 0..args.ticks {
            let phase = t as f32 * 0.01;
            let input = TickInput {
                pointer: Some(center + Vec2::new(phase.cos(), phase.sin()) * center.y * 0.5),
                ..Default::default()
            };
            let frame = tick(&mut state, &input);

            let playing = frame.audio.iter().filter(|u| u.params.should_play).count();
            playing_peak = playing_peak.max(playing);

            if let Some(worker) = &worker {
                let inputs: Vec<AudioInput> = frame
                    .audio
                    .iter()
                    .filter_map(|u| {
                        state
                            .particle(u.particle)
                            .map(|p| AudioInput::from_particle(p, state.viewport(), u.params.voice_index))
                    })
                    .collect();
                let offloaded = worker.process_batch(inputs)?;
                if offloaded.len() != frame.audio.len()
                    || offloaded.iter().zip(&frame.audio).any(|(a, b)| *a != b.params)
                {
                    log::warn!("tick {}: worker mapping diverged from inline mapping", frame.tick);
                }
            }

            if state.particle_count() == 0 {
                state.queue(Command::ScatterRandom { groups: 1 });
            }

            if frame.tick % 150 == 0 {
                let stats = state.pool_stats();
                log::info!(
                    "tick {}: {} active, {} available, {:.1}% utilization, {} voices playing",
                    frame.tick,
                    stats.active,
                    stats.available,
                    stats.utilization,
                    playing
                );
            }
        }

        let stats = state.pool_stats();
        log::info!(
            "done after {} ticks: {} particles created in total, peak {} voices playing",
            state.time_ticks(),
            stats.total_created,
            playing_peak
        );
        if let Some(worker) = &worker {
            let stats = worker.stats()?;
            log::info!("audio worker mapped {} particles in {} batches", stats.calculations, stats.batches);
        }

        if let Some(path) = &args.save {
            let saved_at_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default();
            let scene = state.snapshot().with_timestamp(saved_at_ms);
            std::fs::write(path, scene.to_json()?)?;
            log::info!("scene saved to {}", path.display());
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use clap::Parser;

    env_logger::init();
    log::info!("Ocean Loop (headless) starting...");

    if let Err(err) = native::run(native::Args::parse()) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The web front end drives the library directly
}
