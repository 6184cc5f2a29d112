//! AniList OAuth constants
//!
//! Public client configuration for the implicit grant. The client id
//! identifies the registered Hisame application and is not a secret; the
//! provider has the matching redirect target (`/callback` on the port below)
//! registered against it, which is why no `redirect_uri` is sent.

use std::time::Duration;

/// Hisame's AniList client id
pub const CLIENT_ID: &str = "18776";

/// AniList authorization endpoint
pub const AUTHORIZE_ENDPOINT: &str = "https://anilist.co/api/v2/oauth/authorize";

/// Implicit grant: the provider returns the access token in the redirect fragment
pub const RESPONSE_TYPE: &str = "token";

/// Fixed local port the provider redirects the browser to
pub const CALLBACK_PORT: u16 = 19331;

/// Redirect target serving the fragment-extraction page
pub const CALLBACK_PATH: &str = "/callback";

/// Endpoint the callback page POSTs the extracted token to
pub const TOKEN_PATH: &str = "/token";

/// Upper bound on graceful shutdown of the callback server
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Directory name used under the per-user data directory
pub const APP_DIR_NAME: &str = "hisame";

/// File name of the persisted bearer token
pub const TOKEN_FILE_NAME: &str = "token";
