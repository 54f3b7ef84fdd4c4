pub mod agires;
pub mod agiscript;
pub mod agigfx;
pub mod agisnd;
pub mod game;
