//! Messaging command bot: command grammar, per-user sessions, status rendering,
//! the Telegram transport and the message poll loop.

pub mod bot_runtime;
pub mod command;
pub mod session;
pub mod status_render;
pub mod telegram_api_client;
pub mod trip_notifier;
pub mod vehicle_commander;

pub use bot_runtime::*;
pub use command::*;
pub use session::*;
pub use status_render::*;
pub use telegram_api_client::*;
pub use trip_notifier::*;
pub use vehicle_commander::*;
