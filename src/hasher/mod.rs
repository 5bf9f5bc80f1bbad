pub mod partial;

pub use partial::partial_hash;
