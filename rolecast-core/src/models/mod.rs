pub mod id;
pub mod message;
pub mod profile;

pub use id::{generate_id, ConnectionId, ModuleId, UserId};
pub use message::{codes, HubMessage};
pub use profile::{Profile, RoleSet};
