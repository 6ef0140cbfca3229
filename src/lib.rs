//! Threaded comments with local persistence and cross-context synchronization.
//!
//! The forest lives in memory inside a [`usecase::comments::CommentStore`], is saved as
//! flat records through a [`usecase::contracts::CommentRepository`], and other contexts
//! are told to reload through a [`usecase::contracts::SyncChannel`].

pub mod config;
pub mod domain;
pub mod repository;
pub mod sync;
pub mod telemetry;
pub mod usecase;
