//! Pen-type classification library - shared modules for all binaries.

pub mod annotate;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod knn;
pub mod lexicon;
pub mod models;
pub mod normalize;
pub mod pca;
pub mod pipeline;
pub mod progress;
pub mod safety;
pub mod similarity;
pub mod store;
pub mod tree;
pub mod vectorize;
