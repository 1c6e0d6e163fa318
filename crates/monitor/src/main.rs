//! Drowsiness Monitor - Main Entry Point

use std::path::Path;

use anyhow::Context;
use dms::DmsModule;
use monitor::{
    init_logging, open_display, open_source, ExitFlag, MonitorApp, MonitorConfig,
    DEFAULT_CONFIG_PATH,
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = MonitorConfig::load(Path::new(DEFAULT_CONFIG_PATH))
        .with_context(|| format!("loading {}", DEFAULT_CONFIG_PATH))?;
    init_logging(config.log_json);

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let source = open_source(&config.camera).context("opening camera")?;
    let dms = DmsModule::new(config.dms.clone()).context("starting DMS")?;
    let flag = ExitFlag::install_ctrlc().context("installing exit handler")?;
    let (sink, exit) = open_display(&config.display, flag).context("preparing display")?;

    let mut app = MonitorApp::new(dms, source, sink, exit, &config.display);
    let stats = app.run()?;

    info!(
        "Processed {} frames ({} with a face, {} status changes)",
        stats.frames, stats.frames_with_face, stats.transitions
    );
    Ok(())
}
