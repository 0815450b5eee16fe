//! Narrow interface to the media transport.
//!
//! The cryptor never sees senders, receivers or packetizers. It only knows a
//! [`MediaPath`] it can install itself on, and the transport only knows a
//! [`FrameTransformer`] it calls once per frame.

use std::sync::Arc;

use crate::frame::{Frame, MediaKind};

/// Per-frame transform installed on a media path.
pub trait FrameTransformer: Send + Sync {
    /// Transform one frame. `None` drops the frame.
    fn transform(&self, frame: Frame) -> Option<Frame>;
}

/// One outgoing (encoder to packetizer) or incoming (depacketizer to decoder)
/// media path.
///
/// A path holds at most one transformer. Installing replaces the previous
/// one.
pub trait MediaPath: Send + Sync {
    /// Media kind carried by the path.
    fn media_kind(&self) -> MediaKind;

    /// Install `transformer` as the sole frame transform.
    fn install_transformer(&self, transformer: Arc<dyn FrameTransformer>);

    /// Remove `transformer` if it is the one installed.
    ///
    /// Implementations compare with [`Arc::ptr_eq`] so a cryptor that was
    /// replaced does not remove its successor.
    fn remove_transformer(&self, transformer: &Arc<dyn FrameTransformer>);
}
