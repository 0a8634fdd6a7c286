pub mod domain;
pub mod repository;

pub use domain::{Decision, Relationship, RequestStatus, SendOutcome, SocialError};
pub use repository::{FriendshipRepository, RepositoryError, SqliteFriendshipRepository};
