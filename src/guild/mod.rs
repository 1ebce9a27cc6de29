pub mod context;
pub mod registry;

pub use context::GuildContext;
pub use registry::GuildRegistry;
