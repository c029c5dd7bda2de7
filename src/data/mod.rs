pub mod catalog;
pub mod category;
pub mod overpass;
pub mod store;
