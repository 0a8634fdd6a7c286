pub mod cache;
pub mod jwt;
pub mod mailer;
pub mod password;
pub mod verification;

pub use cache::{CacheStore, MemoryCache};
pub use jwt::{JwtKeys, TokenKind, TokenPair};
pub use mailer::{LogMailer, MailError, Mailer, SmtpMailer};
