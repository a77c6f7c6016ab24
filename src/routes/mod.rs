pub mod disasters;
pub mod health;
pub mod tasks;
