mod auth;
mod manifest;

pub use auth::TokenManager;
pub use manifest::MANIFEST_FILE;
pub use manifest::ManifestManager;
pub use manifest::RunManifest;
pub use manifest::TrackRecord;
