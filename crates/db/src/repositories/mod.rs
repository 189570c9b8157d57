//! Stateless repositories, one per table. Every method takes the pool.

pub mod room_access_repo;
pub mod user_repo;

pub use room_access_repo::RoomAccessRepo;
pub use user_repo::UserRepo;
