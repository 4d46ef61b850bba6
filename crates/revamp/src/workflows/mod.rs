pub mod assist;
pub mod membership;
