//! Types shared between the chunked-upload server and its client: the session
//! identifier, the resume-record DTO that both sides serialize across the wire, and the
//! uniform error envelope.

mod error;
mod ids;
mod resume;

pub use error::{ErrorCode, ErrorEnvelope};
pub use ids::SessionId;
pub use resume::ResumeRecord;
