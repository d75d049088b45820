pub mod events;
pub mod hub;
pub mod store;
pub mod ws;

pub use hub::ChatHub;
