// Server module entry point
// Listener setup, connection serving, rebind and signal handling

pub mod connection;
pub mod listener;
pub mod restart;
pub mod signal;

// `loop` is a keyword, so the module is exposed as server_loop
#[path = "loop.rs"]
pub mod server_loop;

pub use connection::wait_for_idle;
pub use listener::create_reusable_listener;
pub use server_loop::start_server_loop;
pub use signal::start_signal_handler;
