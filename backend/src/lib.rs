//! Web backend for the TCCON CAR portal: site operational status, site
//! metadata and release flags, and data QC reports.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod html;
pub mod locks;
pub mod services;
pub mod state;
