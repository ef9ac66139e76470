//! Provider webhook: subscription handshake, payload signature and
//! status-change ingestion.
//!
//! The ingestor goes straight to the record store and never touches the
//! poller's known-live set, so both paths stay independently idempotent.

pub mod ingestor;
pub mod payload;
pub mod signature;

pub use ingestor::{ReceiveReport, VerifyRejected, WebhookIngestor, WebhookSettings};
pub use payload::{ChangeKind, ENDED_STATUSES, StatusChange, parse_changes};
pub use signature::{SIGNATURE_HEADER, SignatureError, sign, verify_signature};
