//! API Constants and endpoint helpers for the ArcGIS REST API

use std::time::Duration;

/// Response format requested on every call
pub const FORMAT_PARAM: (&str, &str) = ("f", "json");

/// Token issuance path, relative to the portal URL
pub const DEFAULT_TOKEN_PATH: &str = "/arcgis/sharing/rest/generateToken";

/// Referer sent with `client=referer` token requests
pub const DEFAULT_REFERER: &str = "http://localhost:8000";

/// Timeout for token, listing and metadata calls
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for layer queries
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifetime requested for proactively refreshed tokens, in minutes
pub const DEFAULT_TOKEN_LIFETIME_MINUTES: u32 = 60;

/// Tokens are treated as expired this many minutes before their real expiry
pub const DEFAULT_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Record cap emitted when the caller does not ask for a specific count
pub const DEFAULT_MAX_RECORD_COUNT: u32 = 1000;

pub const DEFAULT_WHERE: &str = "1=1";
pub const DEFAULT_OUT_FIELDS: &str = "*";

/// Service type assumed when a listing entry carries none
pub const DEFAULT_SERVICE_TYPE: &str = "MapServer";

pub const USER_AGENT: &str = "arcgis-cli/0.1";

/// Query parameter names
pub mod params {
    pub const WHERE: &str = "where";
    pub const OUT_FIELDS: &str = "outFields";
    pub const RETURN_GEOMETRY: &str = "returnGeometry";
    pub const RETURN_IDS_ONLY: &str = "returnIdsOnly";
    pub const RETURN_COUNT_ONLY: &str = "returnCountOnly";
    pub const RETURN_DISTINCT_VALUES: &str = "returnDistinctValues";
    pub const RETURN_EXTENT_ONLY: &str = "returnExtentOnly";
    pub const RESULT_RECORD_COUNT: &str = "resultRecordCount";
    pub const MAX_RECORD_COUNT: &str = "maxRecordCount";
    pub const OBJECT_IDS: &str = "objectIds";
    pub const GEOMETRY: &str = "geometry";
    pub const GEOMETRY_TYPE: &str = "geometryType";
    pub const SPATIAL_REL: &str = "spatialRel";
    pub const ORDER_BY_FIELDS: &str = "orderByFields";
    pub const GROUP_BY_FIELDS: &str = "groupByFieldsForStatistics";
    pub const OUT_STATISTICS: &str = "outStatistics";
    pub const RESULT_OFFSET: &str = "resultOffset";
    pub const TOKEN: &str = "token";
}

/// Join a base URL and a relative path with exactly one slash
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

/// Build the token issuance URL
pub fn token_endpoint(portal_url: &str, token_path: &str) -> String {
    join_url(portal_url, token_path)
}

/// Build a folder listing URL; the empty folder is the root listing
pub fn folder_endpoint(server_url: &str, folder: &str) -> String {
    join_url(server_url, folder)
}

/// Relative `[folder/]name/type` path of a service
pub fn service_path(folder: &str, name: &str, service_type: &str) -> String {
    if folder.is_empty() {
        format!("{}/{}", name, service_type)
    } else {
        format!("{}/{}/{}", folder, name, service_type)
    }
}
