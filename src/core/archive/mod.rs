pub mod export;
pub mod import;
pub mod layout;

pub use export::{export_resource, export_unidentified, export_version, export_world, ExportOptions};
pub use import::{import_bundle, ImportReport};
