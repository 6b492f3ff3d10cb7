pub mod auth;
pub mod documents;
pub mod export;
pub mod leave;
pub mod numbering;
pub mod people;
pub mod progress;
pub mod review;
pub mod schema;
pub mod seed;
pub mod template;
