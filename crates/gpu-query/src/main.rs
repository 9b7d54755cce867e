use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use gpu_query::config::{Cli, OutputFormat};
use gpu_query::report;
use gpu_query::{DeviceQuery, LibraryConfig};
use tracing::level_filters::LevelFilter;
use utils::{logging, version};

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    logging::init(LevelFilter::WARN);
    tracing::debug!("Starting gpu-query {}", &**version::VERSION);

    let query = DeviceQuery::native(LibraryConfig::from(&cli));
    let reports = report::collect(&query, cli.device).context("query devices failed")?;

    let mut out = std::io::stdout().lock();
    match cli.format {
        OutputFormat::Text => {
            report::write_text(&mut out, &reports).context("write report failed")?
        }
        OutputFormat::Json => {
            report::write_json(&mut out, &reports).context("write report failed")?
        }
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        anyhow::bail!("utilization query failed for {failed} device(s)");
    }

    Ok(())
}
