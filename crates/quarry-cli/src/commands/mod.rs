//! Command implementations.

pub mod chunk;
pub mod decode;
pub mod submit;
pub mod sweep;
pub mod watch;

pub use self::chunk::execute_chunk;
pub use self::decode::execute_decode;
pub use self::submit::execute_submit;
pub use self::sweep::execute_sweep;
pub use self::watch::execute_watch;
