//! Authentication state trait and macro.

use super::guard::Guard;

/// Trait for router state that can authenticate requests.
pub trait HasAuthBackend {
    fn guard(&self) -> &Guard;
}

/// Implement `HasAuthBackend` for a state struct with a `guard: Guard` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub guard: Guard,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn guard(&self) -> &$crate::auth::Guard {
                &self.guard
            }
        }
    };
}
