//! Reading PDFs and classifying their pages.

pub mod classify;
pub mod text;
