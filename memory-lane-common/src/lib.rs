//! Memory Lane Common Types
//!
//! Wire types shared by the backend and any Rust client of its REST API.

pub mod memory;
pub mod responses;
pub mod timestamp;
pub mod user;

pub use memory::{Memory, MemoryEntry, MemoryPayload, PayloadError, ValidMemory};
pub use responses::{
    CsrfTokenResponse, MemoriesResponse, MemoryResponse, MessageResponse, UploadResponse,
    UserResponse, WhoAmIResponse,
};
pub use timestamp::{
    from_unix_seconds, to_unix_seconds, TimestampError, MAX_UNIX_SECONDS, MIN_UNIX_SECONDS,
};
pub use user::{AuthorProfile, UpdateBioRequest, UserProfile};
