//! Data models for Libris

pub mod book;
pub mod borrowing;
pub mod token;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use borrowing::{Borrowing, BorrowingDetails, BorrowingStatus};
pub use token::{PasswordResetToken, RefreshToken, RegistrationOtp};
pub use user::{Role, User, UserClaims};
