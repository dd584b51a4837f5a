//! HTTP middleware and resolver guards

pub mod auth;
pub mod jwt;
pub mod rate_limit;

pub use auth::{check_user_authorization, current_user_id, require_auth, require_teacher, require_user};
pub use jwt::{AuthenticatedUser, JwtMiddleware};
pub use rate_limit::{RateLimitConfig, RateLimitMiddleware};
