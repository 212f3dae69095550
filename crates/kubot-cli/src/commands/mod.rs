pub mod exec;
pub mod index;
pub mod init;
