pub mod backdrop;
pub mod camera;
pub mod globe;
pub mod meteors;
pub mod pointer;
pub mod starfield;
