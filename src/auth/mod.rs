pub mod cookies;
pub mod handlers;
pub mod middleware;
pub mod session;

pub use session::{RequestSession, SessionOutcome};
