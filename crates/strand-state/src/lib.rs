//! State projection for AG-UI conversation state.
//!
//! Agent backends stream state as either full snapshots or incremental
//! deltas. Deltas use a JSON-Patch subset (`add`/`replace`/`remove`) over
//! slash-delimited pointer paths; this crate owns the pointer type and
//! the patch projector that folds deltas into an untyped document.

mod patch;
mod pointer;

pub use patch::{apply_patch, PatchOp};
pub use pointer::Pointer;
