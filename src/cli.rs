use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "heatledger",
    version,
    about = "Rebuilds daily per-zone thermostat timelines and derives energy rollups"
)]
pub struct Args {
    /// Input snapshot (events plus day record) as JSON.
    #[arg(long)]
    pub snapshot: PathBuf,
    /// Where to write the derived day outputs. Defaults next to the snapshot.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Target local date (YYYY-MM-DD). Defaults to the snapshot's day record;
    /// when given, the snapshot must be for this date.
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Print the derived outputs to stdout instead of writing a file.
    #[arg(long, default_value_t = false)]
    pub print: bool,
}
