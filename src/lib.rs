pub mod auth;
pub mod config;
pub mod menu;
pub mod profile;
pub mod shopee;
pub mod web;
pub mod workflow;
