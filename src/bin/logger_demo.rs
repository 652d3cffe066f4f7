use waymark::logger::*;
use waymark::settings::parse_settings;

fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    trace!("bootstrap trace log");
    debug!("bootstrap debug log");
    info!("bootstrap info log");

    let settings = parse_settings(None)?;
    logger.reload_from_config(&LogConfig::from(&settings.log))?;
    trace!(target: "waymark", "application trace log");
    debug!(target: "waymark", "application debug log");
    info!(target: "waymark", "application info log");

    Ok(())
}
