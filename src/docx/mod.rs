pub mod checkbox;
pub mod grid;
pub mod package;
pub mod tree;
pub mod xml;
