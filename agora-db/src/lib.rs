//! Storage for the forum: users, sessions, posts, threaded comments and
//! likes, kept in SQLite.

pub mod client;
mod record;
