//! Authentication: credential state, captcha acquisition, login handshake.

pub mod captcha;
pub mod credentials;
pub mod login;

pub use captcha::{CaptchaChallenge, CaptchaProvider, CaptchaSolver, CommandSolver};
pub use credentials::{COOKIE_HEADER, CredentialSet, SharedCredentials, TOKEN_HEADER};
pub use login::LoginFlow;
