//! Asset loading for the Lumen engine.
//!
//! The rendering core consumes flat vertex/index arrays and raw SPIR-V
//! words; this crate is the seam where file formats are parsed.

pub mod error;
pub mod obj;
pub mod spirv;

pub use error::{AssetError, Result};
pub use obj::MeshData;
pub use spirv::load_spirv;
