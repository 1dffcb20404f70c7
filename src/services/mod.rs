pub mod helpers;
pub mod room;
