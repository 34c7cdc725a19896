//! Configuration types and loading.

mod settings;

pub use settings::{
    GuidanceConfig, RegistryConfig, StalenessConfig, StoreConfig, WardenConfig,
};
