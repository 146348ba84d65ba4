//! Logging setup shared by rota binaries.

mod logger;
pub use logger::*;

mod panic;
pub use panic::install_panic_hook;
