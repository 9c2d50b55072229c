//! Data model shared by the TCCON portal server and its command line tools.

pub mod model;
pub mod requests;
pub mod sites;
