/// Image resources embedded in filters.
pub mod image;
/// Fetching and decoding image pixels.
pub mod loader;
