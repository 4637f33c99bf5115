//! Headless front end for the scan timing model.
//!
//! Loads the scan configuration, applies field edits given on the command
//! line the same way the panel would, validates the result and prints the
//! read-back as JSON.
//!
//! ```bash
//! scan-preview --config config/scan.toml \
//!     --size X=10 --step X=2 --starts Laser488=0,5 --ends Laser488=2,7 --preview
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use scan_timing::config::{ScanConfig, DEFAULT_CONFIG_PATH};
use scan_timing::preview::{PreviewPlot, PreviewSink};
use scan_timing::ScanModel;

/// Width of the text preview in characters.
const PREVIEW_COLUMNS: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "scan-preview", version, about = "Check scan and TTL timing parameters")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Scan size in µm, AXIS=VALUE
    #[arg(long = "size", value_parser = key_value)]
    sizes: Vec<(String, String)>,

    /// Step size in µm, AXIS=VALUE
    #[arg(long = "step", value_parser = key_value)]
    steps: Vec<(String, String)>,

    /// Center position in µm, AXIS=VALUE
    #[arg(long = "center", value_parser = key_value)]
    centers: Vec<(String, String)>,

    /// Scan dimension binding, INDEX=AXIS
    #[arg(long = "dim", value_parser = key_value)]
    dims: Vec<(String, String)>,

    /// Pulse starts in ms, DEVICE=LIST (comma separated, empty entries allowed)
    #[arg(long = "starts", value_parser = key_value)]
    starts: Vec<(String, String)>,

    /// Pulse ends in ms, DEVICE=LIST
    #[arg(long = "ends", value_parser = key_value)]
    ends: Vec<(String, String)>,

    /// Dwell time per pixel in ms
    #[arg(long)]
    seq_time: Option<String>,

    /// Continuous laser pulses instead of a stage scan
    #[arg(long)]
    cont_laser: bool,

    /// Print a text rendering of the pulse preview
    #[arg(long)]
    preview: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

fn key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

/// Renders each trace as a row of `_` (low) and `#` (high).
struct TextPreview {
    out: String,
}

impl PreviewSink for TextPreview {
    fn render(&mut self, plot: &PreviewPlot) {
        for series in &plot.series {
            let samples = series.y.len();
            let row: String = (0..PREVIEW_COLUMNS.min(samples))
                .map(|col| {
                    let index = col * samples / PREVIEW_COLUMNS.min(samples);
                    if series.y[index] > 0.5 {
                        '#'
                    } else {
                        '_'
                    }
                })
                .collect();
            self.out.push_str(&format!("{:>8} |{row}|\n", series.color));
        }
        let span = plot.series.first().map_or(0, |s| s.x.len()) as f64 * plot.x_scale;
        self.out.push_str(&format!("{:>8}  0 .. {span} ms\n", ""));
    }
}

fn apply_edits(model: &mut ScanModel, cli: &Cli) -> Result<()> {
    for (axis, value) in &cli.sizes {
        model.edit_size(axis, value)?;
    }
    for (axis, value) in &cli.steps {
        model.edit_step_size(axis, value)?;
    }
    for (axis, value) in &cli.centers {
        model.edit_center(axis, value)?;
    }
    for (index, axis) in &cli.dims {
        let index: usize = index
            .parse()
            .with_context(|| format!("scan dimension index '{index}'"))?;
        model.set_scan_dim(index, axis)?;
    }
    for (device, list) in &cli.starts {
        model.edit_starts(device, list)?;
    }
    for (device, list) in &cli.ends {
        model.edit_ends(device, list)?;
    }
    if let Some(seq_time) = &cli.seq_time {
        model.edit_seq_time(seq_time)?;
    }
    if cli.cont_laser {
        model.set_cont_laser_mode();
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ScanConfig::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.application.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    tracing::info!(
        name = %config.application.name,
        positioners = config.scan.positioners.len(),
        ttl_devices = config.scan.ttl_devices.len(),
        "Starting scan preview"
    );

    let mut model = ScanModel::from_config(&config);
    apply_edits(&mut model, &cli)?;
    model.validate()?;

    println!("{}", serde_json::to_string_pretty(&model.snapshot())?);

    if cli.preview {
        let mut sink = TextPreview { out: String::new() };
        model.render_signal_preview(&mut sink, config.scan.sample_rate_hz)?;
        print!("{}", sink.out);
    }

    Ok(())
}
