//! Release catalog for RetroArch core packs.
//!
//! Talks to the libretro buildbot: lists the stable release directories,
//! composes per-version download URLs and checks availability with
//! metadata-only requests. Listing failures are soft — the caller sees an
//! empty catalog, not an error.

mod catalog;
mod version;

pub use catalog::{
    BASE_URL, CORES_ARCHIVE, CORE_INFO_BUNDLE_URL, PLATFORM_SEGMENT, VersionCatalog, VersionInfo,
};
pub use version::ReleaseVersion;
