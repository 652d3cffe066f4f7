mod server;
mod port;
mod notifier;
mod event_publisher_impl;

pub use server::*;
pub use port::*;
pub use notifier::*;
pub use event_publisher_impl::*;
