pub(crate) mod events;
pub(crate) mod helpers;
pub(crate) mod models;
pub(crate) mod verify;
