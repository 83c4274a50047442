pub mod apply;
pub mod common;
pub mod export;
pub mod history;
pub mod lifecycle;
pub mod list;
pub mod new;
pub mod rename;
pub mod show;
pub mod visibility;
