pub mod fee;
pub mod oracle;
pub mod state;
pub mod swap;
pub mod tick;
