pub mod memory;
pub mod user;

pub use memory::{Memory, MemoryFields, MemoryWithAuthor};
pub use user::User;
