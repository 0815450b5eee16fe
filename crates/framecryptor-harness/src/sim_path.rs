//! Simulated media path.
//!
//! Stands in for an encoder/packetizer or depacketizer/decoder hook point.
//! Frames pushed through it go through whatever transformer is installed,
//! and the path counts what it forwarded and dropped.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use framecryptor_core::{Frame, FrameTransformer, MediaKind, MediaPath};
use parking_lot::Mutex;

/// One media path with a replaceable transformer slot.
pub struct SimMediaPath {
    kind: MediaKind,
    installed: Mutex<Option<Arc<dyn FrameTransformer>>>,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl SimMediaPath {
    /// Path carrying `kind` frames.
    pub fn new(kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            installed: Mutex::new(None),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        })
    }

    /// Run a frame through the installed transformer.
    ///
    /// Without a transformer the frame passes unchanged.
    pub fn push(&self, frame: Frame) -> Option<Frame> {
        // Clone out so the transform runs without holding the slot lock
        let hook = self.installed.lock().clone();
        let output = match hook {
            Some(hook) => hook.transform(frame),
            None => Some(frame),
        };

        let counter = if output.is_some() { &self.forwarded } else { &self.dropped };
        counter.fetch_add(1, Ordering::Relaxed);
        output
    }

    /// True while a transformer is installed.
    pub fn is_attached(&self) -> bool {
        self.installed.lock().is_some()
    }

    /// Frames that left the path.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Frames the transformer dropped.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MediaPath for SimMediaPath {
    fn media_kind(&self) -> MediaKind {
        self.kind
    }

    fn install_transformer(&self, transformer: Arc<dyn FrameTransformer>) {
        *self.installed.lock() = Some(transformer);
    }

    fn remove_transformer(&self, transformer: &Arc<dyn FrameTransformer>) {
        let mut installed = self.installed.lock();
        if installed.as_ref().is_some_and(|current| Arc::ptr_eq(current, transformer)) {
            *installed = None;
        }
    }
}
