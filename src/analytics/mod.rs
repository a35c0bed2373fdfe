pub mod events;
pub mod logger;
pub mod reporter;
