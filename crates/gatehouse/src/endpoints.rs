//! Backend endpoint paths.

pub use gatehouse_cipher::PUBLIC_KEY_PATH;

pub const LOGIN_PATH: &str = "/api/account/login";
pub const REGISTER_PATH: &str = "/api/account/regist";
pub const PASSWORD_PATH: &str = "/api/account/pwd";
pub const AVATAR_PATH: &str = "/api/account/modifyphoto";
pub const APP_DOWNLOAD_PATH: &str = "/api/account/downloadapp";
/// Sign-on bridge for the third-party reporting platform.
pub const SSO_LOGIN_PATH: &str = "api/xwlogin/crmLogin";
