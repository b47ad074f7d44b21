pub mod entities;
pub mod registry;
pub mod traits;
