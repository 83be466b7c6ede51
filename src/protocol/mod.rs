pub mod codec;
pub mod frame;
pub mod patterns;
pub mod pulses;
pub mod receiver;
pub mod remote;
pub mod state;
pub mod status;
