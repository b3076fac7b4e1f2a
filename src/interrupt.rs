//! Ctrl-C handling: trips the session's cancel token so loops unwind and
//! the normal final flush runs.

use std::thread;

use tracing::{debug, warn};

use crate::session::CancelToken;

/// Spawn a listener thread that cancels `token` on the first interrupt.
///
/// The thread owns a current-thread runtime and exits after the signal.
pub fn install(token: CancelToken) {
    let spawned = thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!(error = %e, "failed to start interrupt listener");
                    return;
                }
            };
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing current step and saving state");
                    eprintln!("\nInterrupted: saving state before exit...");
                    token.cancel();
                }
            });
        });

    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn interrupt listener");
    } else {
        debug!("interrupt listener installed");
    }
}
