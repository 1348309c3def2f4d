mod firebase;
mod memory;
mod provider;
mod session;

// Public API of the identity subsystem.
pub use crate::error::AuthError;
pub use firebase::FirebaseIdentity;
pub use memory::InMemoryIdentity;
pub use provider::{AuthUser, FederatedCredential, IdentityProvider};
pub use session::{AuthChange, AuthSession, AuthSnapshot};
