pub mod session;

pub use session::{SessionState, UploadSession};
