mod artifact;

pub use artifact::MavenCoordinate;

/// Default repository for legacy library entries without a `url`.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
