//! Pure domain logic for treating a hosted issue tracker as a JSON object store.
//!
//! Nothing in this crate performs I/O. Label encoding, envelope encoding/decoding
//! and the recursive merge used to replay updates are all total functions over
//! strings and [`serde_json::Value`]s, so they are exhaustively unit-testable
//! without a `RepoGateway`.

pub mod envelope;
pub mod history;
pub mod label;
pub mod merge;
pub mod meta;

pub use envelope::{EnvelopeError, EnvelopeMeta, EnvelopeType, ParsedComment, UpdateEnvelope, UpdateMode};
pub use history::HistoryEntry;
pub use label::{LabelError, LabelKind};
pub use meta::{ObjectMeta, StoredObject};

/// Default label marking an issue as participating in the store.
pub const DEFAULT_BASE_LABEL: &str = "stored-object";

/// Default prefix for the uid label, e.g. `UID:foo`.
pub const DEFAULT_UID_PREFIX: &str = "UID:";

/// Default reaction content used to mark a comment consumed.
pub const DEFAULT_PROCESSED_REACTION: &str = "+1";

/// Default reaction content stamped on the initial-state comment.
pub const DEFAULT_INITIAL_STATE_REACTION: &str = "rocket";

/// Bound on alias-chain recursion before resolution gives up and returns
/// the last id reached.
pub const MAX_ALIAS_DEPTH: u32 = 5;
