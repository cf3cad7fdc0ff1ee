pub mod health;
pub mod lookup;
pub mod refresh;

pub use health::{AppStartTime, HealthApi, health_routes};
pub use lookup::{BANNER, LookupApi, lookup_routes};
pub use refresh::{RefreshApi, refresh_routes};
