//! REST endpoint paths

pub const LOGIN: &str = "/api/auth/login";
pub const LOGOUT: &str = "/api/auth/logout";
pub const VERIFY_TOKEN: &str = "/api/auth/verify";

pub const USERS: &str = "/api/users";
pub const USER: &str = "/api/users/{id}";

pub const HEALTH_CHECK: &str = "/api/health";

/// `/api/users/{id}` with the id percent-encoded
pub fn user_path(id: &str) -> String {
    USER.replace("{id}", &urlencoding::encode(id))
}
