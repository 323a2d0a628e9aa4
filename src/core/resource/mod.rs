pub mod catalog;
pub mod index;
pub mod model;

pub use catalog::ResourceCatalog;
pub use index::ResourceIndex;
pub use model::{LocalResourceStub, Resource, ResourceKind};
