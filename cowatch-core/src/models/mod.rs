pub mod chat;
pub mod content;
pub mod id;
pub mod playback;
pub mod session;
pub mod viewer;

pub use chat::ChatMessage;
pub use content::{ContentKind, SessionContent};
pub use id::{generate_id, SessionId, ViewerId};
pub use playback::{PlaybackProposal, PlaybackState, ProposalOutcome};
pub use session::{generate_pin, ControlPolicy, Session, SessionPhase};
pub use viewer::{AdmissionStatus, ConnectionQuality, Viewer};
