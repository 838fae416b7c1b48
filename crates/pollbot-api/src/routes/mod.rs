pub mod events;
pub mod health;
pub mod login;
pub mod vote;
