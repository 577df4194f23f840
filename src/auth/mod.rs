//! 认证与授权
//!
//! JWT 双令牌签发校验、bcrypt 密码哈希、请求提取器与权限判定。

pub mod extractor;
pub mod jwt;
pub mod password;
pub mod permissions;

pub use extractor::{AuthUser, CurrentUser};
pub use jwt::{Claims, TokenIssuer, TokenPair};
pub use permissions::{perm, RequiredPermission};
