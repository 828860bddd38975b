//! Myocard CLI - headless cardiac tissue simulations and snapshot tools.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use myocard::{
    compute::Engine,
    schema::{Grid, GridStats, SimConfig},
    snapshot,
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "run" => cmd_run(&args[2..]),
        "info" => cmd_info(&args[2..]),
        "--example" => print_example_config(),
        "--help" | "-h" => print_usage(&args[0]),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Myocard - Cardiac Excitable-Media Simulator");
    eprintln!();
    eprintln!("Usage: {} <command> [options]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <config.json> [ticks] [output.bin]");
    eprintln!("                                  Run headless, optionally saving the");
    eprintln!("                                  final grid as a snapshot");
    eprintln!("  info <grid.bin>                 Show snapshot information");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --example                       Print example configuration");
    eprintln!("  --help, -h                      Show this help message");
}

fn cmd_run(args: &[String]) {
    if args.is_empty() {
        eprintln!("Usage: myocard run <config.json> [ticks] [output.bin]");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[0]);
    let ticks: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(100);
    let output_path = args.get(2).map(PathBuf::from);

    let config = load_config(&config_path);

    println!("Myocard Simulation");
    println!("==================");
    println!("Grid: {}x{}", config.width, config.height);
    println!(
        "Kernel radius: {}  AP: {}  Rest: {}  Threshold: {}",
        config.search_radius, config.ap_duration, config.rest_duration, config.ap_threshold
    );
    println!("Ticks: {}", ticks);
    println!();

    let mut grid = Grid::uniform(config.width, config.height);
    grid.seed_pacemaker_patch(config.width / 2, config.height / 2, 2);

    let mut engine = Engine::new(grid, &config).unwrap_or_else(|e| {
        eprintln!("Error initialising engine: {}", e);
        std::process::exit(1);
    });

    print_stats("Initial state", &engine.stats());
    println!();
    println!("Running...");

    let start = Instant::now();
    for i in 0..ticks {
        engine.tick();

        // Print progress every 10%
        if (i + 1) % (ticks / 10).max(1) == 0 {
            let stats = engine.stats();
            let elapsed = start.elapsed().as_secs_f32();
            let ticks_per_sec = (i + 1) as f32 / elapsed;
            println!(
                "  Tick {}/{}: active={}, resting={}, {:.1} ticks/s",
                i + 1,
                ticks,
                stats.active,
                stats.resting,
                ticks_per_sec
            );
        }
    }

    let elapsed = start.elapsed();
    println!();
    print_stats("Final state", &engine.stats());
    println!();
    println!(
        "Time: {:.2}s ({:.1} ticks/s)",
        elapsed.as_secs_f32(),
        ticks as f32 / elapsed.as_secs_f32()
    );

    if let Some(path) = output_path {
        engine.save(&path).unwrap_or_else(|e| {
            eprintln!("Error saving snapshot: {}", e);
            std::process::exit(1);
        });
        println!("Snapshot saved: {}", path.display());
    }
}

fn cmd_info(args: &[String]) {
    if args.is_empty() {
        eprintln!("Usage: myocard info <grid.bin>");
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[0]);
    let grid = snapshot::load(&path).unwrap_or_else(|e| {
        eprintln!("Error reading snapshot: {}", e);
        std::process::exit(1);
    });

    println!("Snapshot Information");
    println!("====================");
    println!("File: {}", path.display());
    println!();
    println!("Grid: {}x{}", grid.width(), grid.height());
    println!("Orientations: {}", grid.num_orientations());
    for (i, o) in grid.orientations.iter().enumerate() {
        println!(
            "  [{}] direction ({}, {}), {} cell(s)",
            i, o.x_dir, o.y_dir, o.cell_count
        );
    }
    println!();
    print_stats("Census", &GridStats::from_grid(&grid));
    println!(
        "Size: {} bytes ({:.2} KB)",
        snapshot::serialized_len(&grid),
        snapshot::serialized_len(&grid) as f64 / 1024.0
    );
}

fn load_config(path: &PathBuf) -> SimConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn print_stats(label: &str, stats: &GridStats) {
    println!("{}:", label);
    println!("  Pacemaker cells: {}", stats.pacemaker);
    println!("  Tissue cells: {}", stats.tissue);
    println!("  Resting cells: {}", stats.resting);
    println!("  Active cells: {}", stats.active);
}

fn print_example_config() {
    let config = SimConfig::default();
    println!("Example configuration (config.json):");
    println!("{}", serde_json::to_string_pretty(&config).unwrap());
}
