mod communicator;
mod local;
mod star;

pub use communicator::Communicator;
pub use local::LocalGroup;
pub use star::StarGroup;
