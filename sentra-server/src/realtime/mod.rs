pub mod arming;
pub mod connection;
pub mod handler;
pub mod messages;
pub mod registry;

pub use arming::{ArmScheduler, ArmTicket};
pub use connection::{ClientConnection, Identity};
pub use handler::websocket_handler;
pub use messages::ClientEvent;
pub use registry::{OPERATORS_GROUP, PresenceRegistry, customer_group};
