use skiff_protocol::{LoginRequest, login_uri};
use skiff_transport::{Reply, post_json_once};
use tracing::debug;

/// Exchanges credentials for an access token.
///
/// One JSON POST, no retries; a transport-level failure comes back as a
/// 400-style reply so the caller always gets a [`Reply`]. Parse the body as
/// [`skiff_protocol::LoginReply`] on success.
pub async fn login(host: &str, login: &str, password: &str) -> Reply {
    let uri = login_uri(host);
    debug!(%uri, login, "logging in");
    let request = LoginRequest {
        login: login.to_string(),
        password: password.to_string(),
    };
    post_json_once(&uri, &request).await
}
