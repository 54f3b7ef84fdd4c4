pub mod resource;
pub mod bytes;
pub mod crypt;
pub mod bitstream;
pub mod decompress;
pub mod picstream;
pub mod directory;
pub mod resource2;
pub mod resource3;
pub mod cache;
