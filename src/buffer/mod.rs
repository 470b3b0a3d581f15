mod buffer_pool_manager;
mod frame_header;
mod lru_k_replacer;

pub use buffer_pool_manager::*;
pub use frame_header::*;
pub use lru_k_replacer::*;
