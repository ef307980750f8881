//! Blogicum - a server-rendered blogging platform
//!
//! Users publish posts with optional category, location and image, comment
//! on each other's posts and keep a public profile. Staff manage the
//! taxonomy and moderate content through a small JSON admin API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
