//! Per-operation settings: cancellation, progress reporting and the degree
//! of parallelism.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use enough::{Stop, StopReason, Unstoppable};

use crate::error::Result;

/// Stage of a pipeline operation, reported to [`DrawingProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawingOperation {
    /// Statistics pass of an optimizing quantizer.
    InitializingQuantizer,
    /// Setup of a ditherer.
    InitializingDitherer,
    /// The per-pixel copy.
    ProcessingPixels,
}

/// Receives progress notifications.
///
/// Called from worker threads at row-chunk granularity, never per pixel.
pub trait DrawingProgress: Send + Sync {
    /// A stage with `maximum` steps starts.
    fn new_operation(&self, operation: DrawingOperation, maximum: usize);

    /// `count` more steps of the current stage are done.
    fn increment(&self, count: usize);
}

/// A cancellation token backed by an atomic flag.
///
/// # Example
///
/// ```
/// use pixel_pipeline::{CancellationFlag, Stop};
///
/// let flag = CancellationFlag::new();
/// assert!(flag.check().is_ok());
/// flag.cancel();
/// assert!(flag.check().is_err());
/// ```
#[derive(Debug, Default)]
pub struct CancellationFlag(AtomicBool);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Stop for CancellationFlag {
    fn check(&self) -> std::result::Result<(), StopReason> {
        if self.is_canceled() {
            Err(StopReason::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Settings shared by one quantize/dither/copy operation.
#[derive(Clone, Copy)]
pub struct OperationContext<'c> {
    stop: &'c (dyn Stop + Sync),
    progress: Option<&'c dyn DrawingProgress>,
    max_parallelism: usize,
}

impl<'c> OperationContext<'c> {
    /// Uncancellable, silent, and parallel on the global thread pool.
    pub fn new() -> Self {
        Self {
            stop: &Unstoppable,
            progress: None,
            max_parallelism: 0,
        }
    }

    pub fn with_stop(mut self, stop: &'c (dyn Stop + Sync)) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_progress(mut self, progress: &'c dyn DrawingProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// `0` uses every core of the global pool, `1` runs on the calling
    /// thread, `n` builds a dedicated pool of `n` threads.
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    pub fn is_canceled(&self) -> bool {
        self.stop.check().is_err()
    }

    /// `Err(Canceled)` once the stop token fired.
    #[inline]
    pub(crate) fn check(&self) -> Result<()> {
        Ok(self.stop.check()?)
    }

    pub(crate) fn new_operation(&self, operation: DrawingOperation, maximum: usize) {
        if let Some(progress) = self.progress {
            progress.new_operation(operation, maximum);
        }
    }

    pub(crate) fn increment(&self, count: usize) {
        if let Some(progress) = self.progress {
            progress.increment(count);
        }
    }
}

impl Default for OperationContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("canceled", &self.is_canceled())
            .field("progress", &self.progress.is_some())
            .field("max_parallelism", &self.max_parallelism)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;
    use crate::error::DrawingError;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<(DrawingOperation, usize)>>,
        steps: AtomicUsize,
    }

    impl DrawingProgress for Recorder {
        fn new_operation(&self, operation: DrawingOperation, maximum: usize) {
            self.stages.lock().unwrap().push((operation, maximum));
        }

        fn increment(&self, count: usize) {
            self.steps.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_default_context_never_cancels() {
        let ctx = OperationContext::default();
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.max_parallelism(), 0);
    }

    #[test]
    fn test_flag_cancels_context() {
        let flag = CancellationFlag::new();
        let ctx = OperationContext::new().with_stop(&flag);
        assert!(!ctx.is_canceled());
        flag.cancel();
        assert_eq!(ctx.check(), Err(DrawingError::Canceled));
    }

    #[test]
    fn test_progress_is_forwarded() {
        let recorder = Recorder::default();
        let ctx = OperationContext::new().with_progress(&recorder);
        ctx.new_operation(DrawingOperation::ProcessingPixels, 10);
        ctx.increment(3);
        ctx.increment(7);
        assert_eq!(
            *recorder.stages.lock().unwrap(),
            vec![(DrawingOperation::ProcessingPixels, 10)]
        );
        assert_eq!(recorder.steps.load(Ordering::Relaxed), 10);
    }
}
