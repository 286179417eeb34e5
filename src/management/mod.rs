mod catalog;
mod ledger;
mod startup;
mod store;

pub use catalog::{
    ArtistCatalog, CATALOG_FILE, IdResolver, STALE_AFTER_DAYS, hsv_to_rgb, pack_rgb,
    parse_timestamp, vibrant_color,
};
pub use ledger::{NotificationLedger, partition_file_name, partition_year};
pub use startup::{STARTUP_FILE, StartupMarker};
pub use store::{DEFAULT_CACHE_TTL, JsonStore, StoreError};
