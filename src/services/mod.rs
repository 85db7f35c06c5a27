pub mod activity;
pub mod ai;
pub mod export;
pub mod notifications;
