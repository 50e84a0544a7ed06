//! H3D and CGFX asset container formats.
//!
//! Concrete record layouts for the two CTR container families, built on
//! the `ctr-serial` engine. The engine owns pointers, sections and
//! relocation; this crate owns what the records mean:
//!
//! - [`gfx`] - the CGFX container (self-relative pointers, counts first)
//! - [`h3d`] - the H3D container (absolute pointers, counts last)
//! - [`dict`] - named record collections
//! - [`texture`] - texture records and hardware pixel formats
//! - [`lut`] - fragment-lighting lookup tables
//! - [`metadata`] - polymorphic user-data blocks
//! - [`model`] / [`material`] - H3D model subset
//! - [`pica`] - the GPU command stream codec used by LUT samplers

pub mod dict;
pub mod error;
pub mod gfx;
pub mod h3d;
pub mod lut;
pub mod material;
pub mod math;
pub mod metadata;
pub mod model;
pub mod pica;
pub mod texture;

pub use dict::Dict;
pub use error::FormatError;
pub use gfx::{Gfx, CGFX_REVISION, GFX_OPTIONS};
pub use h3d::{H3d, H3D_OPTIONS, H3D_REVISION};
pub use lut::{GfxLut, GfxLutSampler, H3dLut, H3dLutSampler};
pub use material::{H3dMaterial, TextureMapper};
pub use math::Mat3x4;
pub use metadata::{GfxMetaData, MetaColors, MetaFloats, MetaIntegers, MetaStrings, StringFormat};
pub use model::H3dModel;
pub use texture::{GfxTexture, GfxTextureCube, GfxTextureImage, H3dTexture, PixelFormat};
