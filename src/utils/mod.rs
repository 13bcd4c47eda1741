pub mod cmd;
pub mod drive;
pub mod mountable;
