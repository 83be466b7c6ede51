pub mod app;
pub mod config;
pub mod controller;
pub mod display;
pub mod input;
pub mod link;
pub mod port;
pub mod protocol;
