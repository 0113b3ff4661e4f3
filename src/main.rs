use anyhow::{Context, Result};
use clap::Parser;
use heatledger::{cli, config, pipeline, snapshot, time};

fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::RollupConfig::from_env()?;
    let snapshot_data = snapshot::load(&args.snapshot)?;

    let target_date = match args.date {
        Some(date) => date,
        None => match snapshot_data.day.as_ref() {
            Some(record) => record.date,
            None => time::yesterday_local(config.timezone, chrono::Utc::now())?,
        },
    };
    if let Some(record) = snapshot_data.day.as_ref() {
        if record.date != target_date {
            anyhow::bail!(
                "snapshot day record is for {}, expected {target_date}",
                record.date
            );
        }
    }

    let outputs = match pipeline::run_day(&snapshot_data, &config) {
        Ok(outputs) => outputs,
        Err(err) => {
            tracing::error!(date = %target_date, error = %err, "run aborted; previous outputs left untouched");
            return Err(err);
        }
    };

    for note in &outputs.notes {
        tracing::warn!(date = %target_date, note = %note, "degraded condition");
    }

    if args.print {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        let output_path = args
            .output
            .clone()
            .unwrap_or_else(|| args.snapshot.with_extension("outputs.json"));
        snapshot::write_outputs(&output_path, &outputs)
            .with_context(|| format!("failed to persist outputs for {target_date}"))?;
        tracing::info!(path = %output_path.display(), "wrote day outputs");
    }

    tracing::info!(
        date = %target_date,
        events = outputs.dq.events_count,
        zones = outputs.timelines.len(),
        usage = ?outputs.usage_label,
        dq = ?outputs.dq.status,
        score = ?outputs.dq.score,
        "run complete"
    );

    Ok(())
}
