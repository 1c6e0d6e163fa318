//! Frame loop: capture, analyze, display, poll for exit

use std::time::Duration;

use camera_capture::FrameSource;
use dms::{DmsModule, SessionStats, Status};
use tracing::{error, info};

use crate::display::DisplaySink;
use crate::exit::ExitControl;
use crate::{DisplayConfig, MonitorError};

pub struct MonitorApp<S, D, X> {
    dms: DmsModule,
    source: S,
    sink: D,
    exit: X,
    key_wait: Duration,
    max_frames: Option<u64>,
}

impl<S: FrameSource, D: DisplaySink, X: ExitControl> MonitorApp<S, D, X> {
    pub fn new(dms: DmsModule, source: S, sink: D, exit: X, display: &DisplayConfig) -> Self {
        Self {
            dms,
            source,
            sink,
            exit,
            key_wait: Duration::from_millis(display.key_wait_ms),
            max_frames: display.max_frames,
        }
    }

    /// Run until the camera stops, exit is requested or the frame limit is hit.
    ///
    /// The source and sink are released on every path out of the loop.
    pub fn run(&mut self) -> Result<SessionStats, MonitorError> {
        info!("Monitoring started");
        let outcome = self.run_loop();
        self.shutdown();
        outcome?;
        Ok(self.dms.stats().clone())
    }

    fn run_loop(&mut self) -> Result<(), MonitorError> {
        let mut processed: u64 = 0;
        loop {
            if self.max_frames.is_some_and(|max| processed >= max) {
                info!("Frame limit of {} reached", processed);
                return Ok(());
            }

            let frame = match self.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Camera stream ended after {} frames", processed);
                    return Ok(());
                }
                Err(e) => {
                    error!("Camera read failed: {}", e);
                    return Err(e.into());
                }
            };

            let report = self.dms.analyze(&frame)?;
            self.sink.show(&frame, &report)?;
            processed += 1;

            if self.exit.should_exit(self.key_wait) {
                info!("Exit requested, stopping");
                return Ok(());
            }
        }
    }

    fn shutdown(&mut self) {
        self.source.release();
        self.sink.close();

        let stats = self.dms.stats();
        match serde_json::to_string(stats) {
            Ok(summary) => info!("Session summary: {}", summary),
            Err(_) => info!("Session summary: {:?}", stats),
        }
        if stats.frames > 0 {
            info!(
                "Drowsy or sleeping in {:.1}% of frames ({} sleeping, {} drowsy)",
                stats.alert_ratio() * 100.0,
                stats.count(Status::Sleeping),
                stats.count(Status::Drowsy)
            );
        }
    }

    pub fn dms(&self) -> &DmsModule {
        &self.dms
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }
}
