use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use climatune::config::AppConfig;
use climatune::loader::{self, LoadOutcome};
use climatune::scale::{Keyboard, KeyboardLayout};
use climatune::{charts, midi};

#[derive(Parser)]
#[command(name = "climatune", version, about = "Sonify temperature anomaly records as piano notes")]
struct Cli {
    /// Path to config TOML (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyCount {
    #[value(name = "88")]
    K88,
    #[value(name = "108")]
    K108,
}

impl KeyCount {
    fn layout(self) -> KeyboardLayout {
        match self {
            Self::K88 => KeyboardLayout::Grand88,
            Self::K108 => KeyboardLayout::Extended108,
        }
    }
}

/// Options shared by every pipeline subcommand. Unset options fall back
/// to the config file, then to the built-in defaults.
#[derive(Args)]
struct PipelineOpts {
    /// Input anomaly table (defaults to config input_path)
    input: Option<PathBuf>,

    /// Keyboard size in keys
    #[arg(long, value_enum)]
    keys: Option<KeyCount>,

    /// Octaves of anomaly covered either side of zero
    #[arg(long)]
    span: Option<f64>,

    /// Output directory for charts and the MIDI file
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Prefix prepended to chart filenames
    #[arg(long)]
    prefix: Option<String>,
}

impl PipelineOpts {
    fn apply(self, config: &mut AppConfig) {
        if let Some(input) = self.input {
            config.input_path = input;
        }
        if let Some(keys) = self.keys {
            config.layout = keys.layout();
        }
        if let Some(span) = self.span {
            config.span = span;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(prefix) = self.prefix {
            config.output_prefix = prefix;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: diagnostic charts plus the MIDI file
    Render {
        #[command(flatten)]
        opts: PipelineOpts,

        /// MIDI output filename
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tempo in beats per minute
        #[arg(long)]
        tempo: Option<u32>,
    },

    /// Render the diagnostic charts only
    Plots {
        #[command(flatten)]
        opts: PipelineOpts,
    },

    /// Write the MIDI file only
    Midi {
        #[command(flatten)]
        opts: PipelineOpts,

        /// MIDI output filename
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Tempo in beats per minute
        #[arg(long)]
        tempo: Option<u32>,
    },

    /// Print a summary of the parsed series and its quantization
    Stats {
        #[command(flatten)]
        opts: PipelineOpts,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing); CLI flags override.
    let mut config = AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Render { opts, output, tempo } => {
            opts.apply(&mut config);
            if let Some(output) = output {
                config.output_midi_path = output;
            }
            if let Some(tempo) = tempo {
                config.tempo_bpm = tempo;
            }

            let (outcome, keyboard, indices) = load_and_quantize(&config)?;

            // Charts and MIDI are independent artifacts: attempt both,
            // report each, fail at the end if either failed.
            let chart_result =
                charts::render_all(&outcome.series, &indices, &keyboard, &config);

            std::fs::create_dir_all(&config.output_dir)
                .context("Failed to create output directory")?;
            let midi_path = config.midi_path();
            let events = midi::sequence(&indices, &keyboard, &config);
            let midi_result = midi::write_midi(&events, config.tempo_bpm, &midi_path);

            match &chart_result {
                Ok(paths) => println!(
                    "Charts: {} files written to {}",
                    paths.len(),
                    config.output_dir.display()
                ),
                Err(e) => eprintln!("Charts failed: {e}"),
            }
            match &midi_result {
                Ok(()) => println!(
                    "MIDI: {} ({} notes @ {} BPM)",
                    midi_path.display(),
                    events.len(),
                    config.tempo_bpm
                ),
                Err(e) => eprintln!("MIDI failed: {e}"),
            }

            chart_result.context("Chart rendering failed")?;
            midi_result.context("MIDI write failed")?;
        }

        Commands::Plots { opts } => {
            opts.apply(&mut config);

            let (outcome, keyboard, indices) = load_and_quantize(&config)?;
            let paths = charts::render_all(&outcome.series, &indices, &keyboard, &config)
                .context("Chart rendering failed")?;

            println!("Wrote {} charts:", paths.len());
            for p in &paths {
                println!("  {}", p.display());
            }
        }

        Commands::Midi { opts, output, tempo } => {
            opts.apply(&mut config);
            if let Some(output) = output {
                config.output_midi_path = output;
            }
            if let Some(tempo) = tempo {
                config.tempo_bpm = tempo;
            }

            let (_, keyboard, indices) = load_and_quantize(&config)?;

            std::fs::create_dir_all(&config.output_dir)
                .context("Failed to create output directory")?;
            let midi_path = config.midi_path();
            let events = midi::sequence(&indices, &keyboard, &config);
            midi::write_midi(&events, config.tempo_bpm, &midi_path)
                .context("MIDI write failed")?;

            println!(
                "MIDI: {} ({} notes @ {} BPM)",
                midi_path.display(),
                events.len(),
                config.tempo_bpm
            );
        }

        Commands::Stats { opts } => {
            opts.apply(&mut config);

            let (outcome, keyboard, indices) = load_and_quantize(&config)?;
            print_stats(&config, &outcome, &keyboard, &indices);
        }
    }

    Ok(())
}

/// Load the input table, build the keyboard, and quantize the series.
fn load_and_quantize(config: &AppConfig) -> Result<(LoadOutcome, Keyboard, Vec<usize>)> {
    let outcome = loader::load_series(&config.input_path).with_context(|| {
        format!("Failed to load input table {}", config.input_path.display())
    })?;

    let keyboard = Keyboard::new(config.layout, config.span);
    let anomalies: Vec<f64> = outcome.series.iter().map(|p| p.anomaly).collect();
    let indices = keyboard.quantize(&anomalies);

    Ok((outcome, keyboard, indices))
}

/// Print a fixed-width summary of the parsed series and its mapping.
fn print_stats(config: &AppConfig, outcome: &LoadOutcome, keyboard: &Keyboard, indices: &[usize]) {
    let stats = &outcome.stats;

    println!("Series Statistics");
    println!("=================");
    println!("Input:            {}", config.input_path.display());
    println!("Lines read:       {}", stats.lines_read);
    println!("Rows kept:        {}", stats.rows_kept);
    println!("Dropped (parse):  {}", stats.rows_dropped_parse);
    println!("Decimated:        {}", stats.lines_decimated);
    println!("Short lines:      {}", stats.lines_skipped_short);
    println!();

    if outcome.series.is_empty() {
        println!("No valid rows — nothing to map.");
        return;
    }

    let first_year = outcome.series.first().map(|p| p.year).unwrap_or(0);
    let last_year = outcome.series.last().map(|p| p.year).unwrap_or(0);
    let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for p in &outcome.series {
        min = min.min(p.anomaly);
        max = max.max(p.anomaly);
        sum += p.anomaly;
    }
    let mean = sum / outcome.series.len() as f64;

    let lo_idx = indices.iter().copied().min().unwrap_or(0);
    let hi_idx = indices.iter().copied().max().unwrap_or(0);

    println!("Year range:       {} - {}", first_year, last_year);
    println!(
        "Anomaly:          min {:.3}  mean {:.3}  max {:.3}",
        min, mean, max
    );
    println!(
        "Keyboard:         {} (A440 at key {})",
        keyboard.layout().label(),
        keyboard.layout().a440_key()
    );
    println!("Key indices:      {} - {}", lo_idx, hi_idx);
    println!(
        "Frequencies:      {:.1} Hz - {:.1} Hz",
        keyboard.frequency(lo_idx),
        keyboard.frequency(hi_idx)
    );
    println!(
        "Notes:            {} events @ {} BPM",
        indices.len(),
        config.tempo_bpm
    );
}
