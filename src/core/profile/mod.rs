pub mod model;
pub mod store;

pub use model::{
    AuthenticationEntry, ExtraConfig, GameProfile, LaunchProfiles, ProfileType, SelectedUser,
    Settings, DEFAULT_JAVA_ARGS,
};
pub use store::{ProfileStore, LOGIN_MICROSOFT, LOGIN_OFFLINE, LOGIN_YGGDRASIL};
