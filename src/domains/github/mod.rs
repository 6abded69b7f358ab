pub mod client;

pub use client::{NewCommentParams, ReviewClient, ReviewEvent};
