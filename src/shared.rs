pub mod backend;
pub mod command;
pub mod ctx;
pub mod error;
pub mod net_id;
pub mod peer_id;
pub mod postcard_utils;
pub mod replication_config;
pub mod scene;
pub mod state_codec;
pub mod sync_tick;
pub mod visibility;
