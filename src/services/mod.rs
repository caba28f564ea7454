//! Domain logic shared by the public and admin handlers. Every function takes the repository
//! as `&dyn Repository`, so the same code runs over Postgres and the in-memory store.

pub mod navigation;
pub mod pages;
pub mod tables;
pub mod tree;
