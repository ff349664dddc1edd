pub mod id;
pub mod query;
pub mod slug;
pub mod track;
