pub mod events;
pub mod identity;
pub mod match_state;
pub mod record;
pub mod websocket;
