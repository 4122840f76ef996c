pub mod copy;
pub mod guard;
pub mod hasher;
pub mod walk;

pub use copy::{copy_with_retries, migrate_storage_root, remove_dir_safe, remove_file_safe};
pub use guard::{assert_within, normalize_path, path_key, sanitize_component};
pub use hasher::{sha256_file, sha256_string};
pub use walk::walk_files;
