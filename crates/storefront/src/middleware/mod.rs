//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Device fingerprint (anonymous cart/favorites owner)
//! 7. Protected paths (sign-in gate for account pages)
//! 8. Rate limiting on `/auth` (governor)

pub mod auth;
pub mod device;
pub mod protected;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{CurrentOwner, OptionalAuth, RequireAuth};
pub use device::{DeviceId, device_fingerprint_middleware};
pub use protected::{is_protected, login_redirect, protected_paths_middleware, safe_redirect};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{create_session_store, session_layer};
