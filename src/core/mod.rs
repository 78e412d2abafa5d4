pub mod bit_coder;
pub mod material;
pub mod scene;
pub mod shared;
pub mod texture;
