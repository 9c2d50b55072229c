pub mod doi;
pub mod qc;
pub mod release_flag;
pub mod reviewers;
pub mod site_info;
pub mod status;
