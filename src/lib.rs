pub mod audio;
pub mod common;
pub mod configs;
pub mod gateway;
pub mod player;
pub mod server;
pub mod sources;

#[cfg(test)]
pub mod testing;
