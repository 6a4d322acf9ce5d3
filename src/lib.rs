pub mod config;
pub mod error;
pub mod events;
pub mod immich {
    pub mod assets;
    pub mod client;
    pub mod query;
}
pub mod slideshow;
pub mod subscription;
pub mod tasks {
    pub mod refresh;
    pub mod rotation;
}
