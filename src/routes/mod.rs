pub mod admin;
pub mod ai;
pub mod application;
pub mod ats;
pub mod auth;
pub mod batch;
pub mod billing;
pub mod notification;
pub mod plan;
pub mod user;
