pub mod app;
pub mod config;
pub mod session;
pub mod state;
pub mod timings;

pub use app::*;
pub use config::*;
pub use session::*;
pub use state::*;
pub use timings::*;
