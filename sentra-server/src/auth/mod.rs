pub mod jwt;
pub mod middleware;

pub use jwt::{AuthKeys, Claims, Role, TokenType};
pub use middleware::{AuthSession, auth_middleware, authenticate_token};
