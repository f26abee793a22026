//! Processing-task loop.
//!
//! On hardware this runs as an Embassy task next to the DMA interrupt, which
//! only calls [`TransferHandoff::signal_complete`](crate::handoff::TransferHandoff::signal_complete)
//! and `signal_half`:
//!
//! ```rust,ignore
//! static HANDOFF: TransferHandoff = TransferHandoff::new();
//! static SHUTDOWN: AtomicBool = AtomicBool::new(false);
//!
//! #[embassy_executor::task]
//! async fn audio_task(mut pipeline: AudioPipeline) {
//!     playback::task::run(&mut pipeline, &mut embassy_time::Delay, &SHUTDOWN).await;
//! }
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_async::delay::DelayNs;
use platform::{DacControl, StreamSource, TransferSink};

use crate::decoder::NextTrackSource;
use crate::pipeline::Pipeline;

/// Sleep between service passes.
pub const TASK_TICK_MS: u32 = 1;

/// Service `pipeline` every [`TASK_TICK_MS`] until `shutdown` is set.
///
/// Errors from a pass are logged and the loop carries on; the pipeline has
/// already recovered (or stopped) by the time `service` returns. Returns the
/// number of passes run.
pub async fn run<S, K, D, C, T, const N: usize>(
    pipeline: &mut Pipeline<'_, S, K, D, C, T, N>,
    tick: &mut impl DelayNs,
    shutdown: &AtomicBool,
) -> u32
where
    S: StreamSource,
    K: TransferSink,
    D: DelayNs,
    C: DacControl,
    T: NextTrackSource,
{
    let mut passes: u32 = 0;
    while !shutdown.load(Ordering::Acquire) {
        if let Err(e) = pipeline.service().await {
            warn!("audio service: {:?}", e);
        }
        passes = passes.saturating_add(1);
        tick.delay_ms(TASK_TICK_MS).await;
    }
    debug!("audio task exiting after {} passes", passes);
    passes
}
