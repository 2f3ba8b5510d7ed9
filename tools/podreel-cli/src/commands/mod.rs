pub mod check;
pub mod init;
pub mod render;
pub mod timeline;
pub mod validate;
