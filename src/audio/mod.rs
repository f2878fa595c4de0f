pub mod analysis;
pub mod decode;
pub mod engine;
pub mod window;
