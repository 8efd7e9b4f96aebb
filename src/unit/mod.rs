// Package unit provides the per-artifact unit context.

pub mod attachment;
pub mod context;

pub use attachment::AttachmentKey;
pub use context::{UnitContext, MOUNT_ROOT_ATTACHMENT, ROOT_ATTACHMENT};
