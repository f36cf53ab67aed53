use std::io;
use std::process;
use std::thread;

use tokio::runtime::Builder;
use tracing::{error, warn};

use crate::checkpoint::SharedCheckpoint;
use crate::error::HarvestError;

pub const INTERRUPTED_EXIT_CODE: i32 = 130;

pub fn install(checkpoint: SharedCheckpoint) -> Result<(), HarvestError> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| HarvestError::SignalHandler(err.to_string()))?;

    // Register before returning so an early Ctrl-C is not missed.
    let signals = {
        let _guard = runtime.enter();
        Signals::register().map_err(|err| HarvestError::SignalHandler(err.to_string()))?
    };

    thread::Builder::new()
        .name("checkpoint-signal".to_string())
        .spawn(move || {
            let name = runtime.block_on(signals.recv());
            warn!(signal = name, "interrupted, saving checkpoint");
            let code = match checkpoint.flush() {
                Ok(_) => INTERRUPTED_EXIT_CODE,
                Err(err) => {
                    error!(error = %err, "failed to save checkpoint");
                    1
                }
            };
            process::exit(code);
        })
        .map_err(|err| HarvestError::SignalHandler(err.to_string()))?;
    Ok(())
}

#[cfg(unix)]
struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }
}
