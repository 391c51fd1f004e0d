pub mod primitives;
pub mod word_stream;
