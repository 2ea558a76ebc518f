pub mod settings;

pub use settings::{generate_default_config, LibvirtSettings, PxeSettings, Settings, StorageSettings};
