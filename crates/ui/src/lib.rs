#![deny(unsafe_code)]

//! Desktop front end for Gėminis built with GPUI and gpui-component.

/// Window shell and global actions.
pub mod app;
/// Chat view and its children.
pub mod chat;
pub mod theme;
