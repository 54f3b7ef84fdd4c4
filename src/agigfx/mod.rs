pub mod palette;
pub mod context;
pub mod picture;
pub mod agi256;
pub mod view;
pub mod util;
