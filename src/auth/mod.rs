pub mod middleware;
pub mod password;
pub mod policy;
pub mod token;

pub use middleware::{authenticate, CurrentUser, Identity, MaybeIdentity};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use policy::{authorize, Access};
pub use token::{Claims, TokenError, TokenService};
