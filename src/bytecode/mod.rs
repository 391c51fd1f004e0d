pub mod compile;
pub mod compile_error;
pub mod dictionary;
pub mod disasm;
pub mod encode;
pub mod image;
pub mod symbols;
pub mod word;

pub use compile_error::CompileError;
pub use image::CodeImage;
