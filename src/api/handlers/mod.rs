pub mod documents;
pub mod root;
pub mod ws;
