//! Form session engine.
//!
//! One `FormSession` owns the editing state of a root entity: scalar fields
//! and child rows (`EntityStore`), attachment slots and pending deletions
//! (`AttachmentManager`), and the session token that discards stale loads.
//! `hydrate` maps a server graph into that state and `assemble` maps it back
//! into a multipart payload. Transports plug in through `FormTransport`.

pub mod assemble;
pub mod attachments;
pub mod draft;
pub mod hydrate;
pub mod preview;
pub mod session;
pub mod store;
pub mod transport;

pub use assemble::assemble;
pub use attachments::{load_staged_file, AttachmentManager};
pub use draft::{DraftDocument, DraftRecord, DraftRow, DraftStore};
pub use hydrate::{hydrate, HydratedEntity};
pub use preview::PreviewRegistry;
pub use session::{FormSession, LoadOutcome, LoadTicket, SessionState, SessionToken};
pub use store::EntityStore;
pub use transport::FormTransport;
