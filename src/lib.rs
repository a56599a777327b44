pub mod config;
pub mod editor;
pub mod markup;
pub mod render;
pub mod theme;
