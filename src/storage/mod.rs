//! Process-lifetime state. Nothing here is persisted; downloaded files are
//! the only thing written to disk.

pub mod sessions;

pub use sessions::SessionStore;
