//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `vaultnote_core` linkage and
//!   storage bootstrap independently from any UI shell.
//! - Keep output deterministic for quick local sanity checks.

use vaultnote_core::db::migrations::latest_version;
use vaultnote_core::db::open_db_in_memory;

fn main() {
    println!("vaultnote_core version={}", vaultnote_core::core_version());
    match open_db_in_memory() {
        Ok(_) => println!("vaultnote_core schema_version={}", latest_version()),
        Err(err) => {
            eprintln!("vaultnote_core bootstrap failed: {err}");
            std::process::exit(1);
        }
    }
}
