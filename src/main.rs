use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use neurodrive::{FileChampionStore, Params, Population, StartPose, Track};

const TRACK_WIDTH: usize = 1400;
const TRACK_HEIGHT: usize = 900;

/// Headless neuroevolution run on a procedural oval track.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of generations to evolve.
    #[arg(long, default_value_t = 20)]
    generations: u32,

    /// Ticks after which a generation is ended even if cars are still driving.
    #[arg(long, default_value_t = 5000)]
    max_ticks: u32,

    /// Time step passed to every tick.
    #[arg(long, default_value_t = 1.0)]
    dt: f32,

    /// Cars per generation (overrides the parameter file).
    #[arg(long)]
    population: Option<usize>,

    /// Random seed (overrides the parameter file).
    #[arg(long)]
    seed: Option<u64>,

    /// JSON parameter file.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Where the champion network is stored.
    #[arg(long, default_value = "models/champion.json")]
    champion: PathBuf,

    /// Start from the stored champion instead of random brains.
    #[arg(long)]
    resume: bool,

    /// Write the final population summary as JSON.
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut params = match &args.params {
        Some(path) => Params::load_from_file(path)
            .with_context(|| format!("failed to load parameters from {}", path.display()))?,
        None => Params::default(),
    };
    if let Some(population) = args.population {
        params.population_size = population;
    }
    if args.seed.is_some() {
        params.seed = args.seed;
    }
    params.resume_from_champion |= args.resume;

    let track = Arc::new(oval_track()?);
    let start = StartPose::new(700.0, 730.0, 3.0 * std::f32::consts::FRAC_PI_2);
    let store = Box::new(FileChampionStore::new(&args.champion));

    let mut population = Population::new(params, track, start, store)?;
    info!(
        "Starting evolution: {} cars, champion stored at {}",
        population.population_size(),
        args.champion.display()
    );

    while population.generation() <= args.generations {
        let generation = population.generation();
        let mut ticks = 0;

        while population.generation() == generation {
            population.step(args.dt)?;
            ticks += 1;

            if ticks >= args.max_ticks && population.generation() == generation {
                info!(
                    "Generation {} hit the tick limit with {} cars left",
                    generation,
                    population.cars().len()
                );
                population.advance_generation()?;
            }
        }

        info!(
            "generation: {} | ticks: {} | best fitness: {:.2} | last generation best: {:.2}",
            generation,
            ticks,
            population.best_fitness(),
            population.history().last().copied().unwrap_or_default()
        );
    }

    if let Some(path) = &args.summary {
        let json = serde_json::to_string_pretty(&population.summary())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
    }

    Ok(())
}

/// Elliptical ring road centred in the window.
fn oval_track() -> Result<Track> {
    let (cx, cy) = (TRACK_WIDTH as f32 / 2.0, TRACK_HEIGHT as f32 / 2.0);
    let inside = |x: f32, y: f32, rx: f32, ry: f32| {
        let (dx, dy) = ((x - cx) / rx, (y - cy) / ry);
        dx * dx + dy * dy <= 1.0
    };

    Ok(Track::from_fn(TRACK_WIDTH, TRACK_HEIGHT, |x, y| {
        let (x, y) = (x as f32 + 0.5, y as f32 + 0.5);
        !inside(x, y, 620.0, 380.0) || inside(x, y, 420.0, 200.0)
    })?)
}
