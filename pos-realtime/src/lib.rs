pub mod close;
pub mod connection;
pub mod hub;
pub mod rooms;
pub mod topics;

pub mod prelude {
    pub use crate::close::HubCloseCode;
    pub use crate::hub::{ws_handler, HubState};
    pub use crate::rooms::{restaurant_room, user_room, RoomMessage, WsRooms};
    pub use crate::topics::ConnectionType;
}
