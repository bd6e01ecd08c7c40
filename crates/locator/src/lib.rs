//! RetroArch installation discovery for Steam Deck.
//!
//! Finds cores directories on internal storage and mounted SD cards,
//! validates candidate paths, and probes host facts (Steam Deck
//! detection, writability, free space, decompressor availability) the
//! frontend surfaces before starting an update.

mod locate;
mod probes;

pub use locate::{InstallLocator, Installation, LocationKind};
pub use probes::{free_space, has_seven_zip, is_steam_deck, validate_write_permissions};

/// Returns the user's home directory, `/tmp` as a last resort.
pub(crate) fn home_dir() -> std::path::PathBuf {
    std::env::var("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("/tmp"))
}
