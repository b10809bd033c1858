//! Attribute extractors: semantic values out of raw UTF-8 text.

pub mod area;
pub mod company;
pub mod dates;
pub mod location;
pub mod quantities;

pub use area::find_largest_area;
pub use company::{find_companies, find_developer};
pub use dates::find_decision_date;
pub use location::extract_location;
pub use quantities::{find_capacity_mw, find_capacity_mwh};
