pub mod answers;
pub mod chat;
pub mod history;
pub mod prompt;
pub mod storage;
pub mod studio;
pub mod theme;
pub mod upload;
pub mod wire;
