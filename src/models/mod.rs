pub mod user;
pub mod event;
pub mod registration;

pub use user::{Caller, Role, User};
pub use event::{Event, EventPatch, EventStatus, EventView, NewEvent};
pub use registration::{NewRegistration, Registrant, Registration, UserRegistration};
