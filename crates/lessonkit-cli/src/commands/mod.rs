pub mod init;
pub mod play;
pub mod report;
pub mod token;
pub mod validate;
