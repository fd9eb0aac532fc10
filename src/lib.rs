pub mod fetch;
pub mod loader;
pub mod output;
pub mod projector;
pub mod traffic;
