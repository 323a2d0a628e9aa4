pub mod hash;
pub mod json_file;

pub use hash::{
    hash_files, is_content_addressed_name, is_sha1_hex, sha1_bytes, sha1_file, HashStore,
    SHA1_HEX_LEN,
};
pub use json_file::{
    backup_corrupt, deep_merge, load_json, write_json_atomic, write_json_merged, JsonLoad,
};
