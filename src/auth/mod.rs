//! Bearer token authentication.
//!
//! Tokens are signed JWTs that are also recorded in the database, so they
//! can be revoked before they expire. [`JwtService`] issues, validates and
//! revokes them; [`Guard`] turns a request's `Authorization` header into a
//! user once per request.

mod errors;
mod extractors;
mod guard;
pub mod password;
mod service;
mod state;

pub use errors::ApiAuthError;
pub use extractors::{AdminAuth, Auth};
pub use guard::{Credentials, Guard, RequestContext, split_credential};
pub use service::{JwtService, ServiceError, TOKEN_LABEL};
pub use state::HasAuthBackend;
