mod service;
mod session;

pub use crate::error::TutorError;
pub use service::TutorService;
pub use session::{TutorPhase, TutorSession};
