pub mod server;

pub use server::start_callback_server;
