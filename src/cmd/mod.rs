pub mod channels;
pub mod resolve;
