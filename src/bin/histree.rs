use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use histree::common::config::{Config, config_file};
use histree::common::log;
use histree::layout_engine::{HistoryCommand, LayoutEngine};
use serde::Serialize;
use tracing::{info, warn};

/// Replays an edit-history script and prints the resulting diagram layout.
///
/// The script holds one JSON command per line, for example
/// `{"edit": {"kind": "fill"}}`, `"undo"` or `{"make_current": {"order": 3}}`.
/// Blank lines and lines starting with `#` are skipped.
#[derive(Parser)]
struct Cli {
    /// Script to replay. Reads standard input when omitted or `-`.
    script: Option<PathBuf>,

    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check whether the configuration file loads, then exit.
    #[arg(long)]
    validate: bool,

    /// Write the default configuration to the config path, then exit.
    #[arg(long)]
    init_config: bool,

    /// Print the stamps as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Also print the history as an ascii tree.
    #[arg(long)]
    tree: bool,

    /// Stop at the first command that is rejected.
    #[arg(long)]
    strict: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    extent: histree::layout_engine::Extent,
    can_undo: bool,
    can_redo: bool,
    stamps: &'a [histree::layout_engine::StampView],
}

fn main() {
    log::init_logging();
    let opt = Cli::parse();
    if let Err(e) = run(opt) {
        eprintln!("histree: {e:#}");
        process::exit(1);
    }
}

fn run(opt: Cli) -> anyhow::Result<()> {
    let config_path = opt.config.clone().unwrap_or_else(config_file);

    if opt.init_config {
        Config::default().save(&config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    if opt.validate {
        let config = Config::load(&config_path)?;
        let issues = config.validate();
        if issues.is_empty() {
            println!("Config file is valid: {}", config_path.display());
            return Ok(());
        }
        for issue in &issues {
            eprintln!("  {issue}");
        }
        anyhow::bail!("{} issue(s) in {}", issues.len(), config_path.display());
    }

    let config = if config_path.exists() {
        Config::read(&config_path)?
    } else {
        info!("No config at {}, using defaults", config_path.display());
        Config::default()
    };

    let mut engine: LayoutEngine<serde_json::Value> = LayoutEngine::new(config.layout);
    let reader: Box<dyn BufRead> = match opt.script.as_deref() {
        None => Box::new(BufReader::new(io::stdin())),
        Some(path) if path.as_os_str() == "-" => Box::new(BufReader::new(io::stdin())),
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening script {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
    };

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("reading script")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command: HistoryCommand<serde_json::Value> = serde_json::from_str(line)
            .with_context(|| format!("line {}: cannot parse command", idx + 1))?;
        match engine.handle_command(command) {
            Ok(response) => {
                if !response.evicted.is_empty() {
                    info!(line = idx + 1, evicted = ?response.evicted, "Evicted stamps");
                }
            }
            Err(e) if opt.strict => anyhow::bail!("line {}: {e}", idx + 1),
            Err(e) => warn!(line = idx + 1, "Rejected command: {e}"),
        }
    }

    let stamps = engine.stamps();
    let mut out = io::stdout().lock();
    if opt.json {
        let output = Output {
            extent: engine.extent(),
            can_undo: engine.can_undo(),
            can_redo: engine.can_redo(),
            stamps: &stamps,
        };
        serde_json::to_writer_pretty(&mut out, &output)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{:>6} {:>6} {:>5} {:>4} {:>4} {:>6} {:>6}  kind",
            "order", "parent", "step", "row", "col", "x", "y"
        )?;
        for s in &stamps {
            let parent = s.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
            let mut flags = String::new();
            if s.current {
                flags.push_str(" *");
            }
            if s.selected {
                flags.push_str(" +");
            }
            if s.marked {
                flags.push_str(" !");
            }
            writeln!(
                out,
                "{:>6} {:>6} {:>5} {:>4} {:>4} {:>6} {:>6}  {}{}",
                s.order, parent, s.step, s.row, s.column, s.x, s.y, s.kind, flags
            )?;
        }
        let extent = engine.extent();
        writeln!(out, "extent {}x{}", extent.width, extent.height)?;
    }
    if opt.tree {
        write!(out, "{}", engine.draw_tree())?;
    }
    Ok(())
}
