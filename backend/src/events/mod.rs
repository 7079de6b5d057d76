//! Event bus (see [`bus`]).

mod bus;

pub use bus::{EventBus, Subscription};
