pub mod account;
pub mod error;
pub mod session;
pub mod tenant;

pub use account::{AdminAccount, CreateUserRequest, RegistryUser, UserType};
pub use error::Error;
pub use session::{Session, SESSION_MAX_AGE_SECS};
pub use tenant::{CreateOutcome, CreateTenantRequest, TenantRecord, TenantStatus};
