pub mod naming;
pub mod session;
pub mod store;

pub use session::{NoopSessionProbe, SessionProbe};
pub use store::LibraryIndex;
