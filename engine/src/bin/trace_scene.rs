//! CLI tool for tracing an acoustic scene and printing per-target parameters
//!
//! Usage: cargo run --bin trace_scene <scene.json> [cycles]

use echotrace::prelude::*;
use echotrace::profiling;
use std::env;
use std::process;

fn main() {
    echotrace::init_logging();
    profiling::start_profiler();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <scene.json> [cycles]", args[0]);
        eprintln!(
            "\nTraces the scene with blocking cycles and prints the smoothed audio parameters."
        );
        eprintln!("\nExample:");
        eprintln!("  {} assets/scenes/two_rooms.json 30", args[0]);
        process::exit(1);
    }

    let cycles = match args.get(2).map(|value| value.parse::<usize>()) {
        None => 10,
        Some(Ok(cycles)) if cycles > 0 => cycles,
        Some(_) => {
            eprintln!("ERROR: cycles must be a positive integer");
            process::exit(1);
        }
    };

    if let Err(e) = run(&args[1], cycles) {
        eprintln!("ERROR: {e}");
        process::exit(1);
    }
}

fn run(path: &str, cycles: usize) -> Result<()> {
    let mut scene = AcousticScene::load_from_file(path)?;
    scene.config.cycle_mode = CycleMode::Blocking;
    let listener = scene.listener;
    let mut engine = scene.into_engine()?;

    // Fixed 60 Hz frame step
    let dt = 1.0 / 60.0;
    for _ in 0..cycles {
        engine.update(&listener, dt)?;
        profiling::mark_frame();
    }

    println!("=== Acoustic Trace Report ===");
    println!("Scene: {path}");
    println!("Cycles: {cycles}");
    if let Some(stats) = engine.last_stats() {
        println!(
            "Last cycle: {} batches, {} rays, {} hits",
            stats.batches, stats.rays, stats.bounces
        );
    }
    let echo = engine.echo();
    println!(
        "Echo: strength {:.3}, delay {:.1} ms",
        echo.strength,
        echo.delay_seconds * 1000.0
    );

    println!("\nTARGETS:");
    for target in engine.targets() {
        let current = target.feedback.current();
        println!("  - {} {}", target.id, target.name);
        if let Some(settings) = target.settings {
            println!(
                "    muffle {:.3}, hits {}, estimate {:?}",
                settings.muffle_strength, settings.hit_count, settings.estimated_position
            );
        }
        println!(
            "    volume {:.3}, cutoff {:.0} Hz, pan {:+.3}",
            current.volume, current.low_pass_cutoff_hz, current.pan
        );
    }
    Ok(())
}
