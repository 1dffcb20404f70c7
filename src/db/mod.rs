pub mod chat_db;
pub mod schema;
