pub mod average;
pub mod color;
pub mod frame;
pub mod grid;
pub mod palette;
