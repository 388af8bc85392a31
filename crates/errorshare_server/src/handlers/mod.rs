pub mod create;
pub mod extract;
pub mod get;
pub mod html;
