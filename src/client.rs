use reqwest::{
    header::{HeaderValue, ACCEPT},
    Client, Method, StatusCode,
};
use tracing::{info, warn};

use crate::{
    accessory::{Accessory, AccessoryRecord, TogglePayload},
    config::Config,
    error::{HomebridgeError, Result},
    session::{ApiResponse, RequestOptions, Session},
};

pub const ACCESSORIES_ENDPOINT: &str = "api/accessories";
pub const RESET_CACHE_ENDPOINT: &str = "api/server/reset-cached-accessories";

/// Accessory discovery and outlet control for one bridge.
///
/// Holds the accessory list from construction or the last
/// [`refresh_accessories`](Self::refresh_accessories); listing outlets never
/// goes back to the bridge on its own.
#[derive(Debug)]
pub struct HomebridgeClient {
    session: Session,
    accessories: Vec<AccessoryRecord>,
}

impl HomebridgeClient {
    /// Authenticates and takes the initial accessory snapshot.
    pub async fn connect(config: Config) -> Result<Self> {
        Self::from_session(Session::new(config)?).await
    }

    /// Same as [`connect`](Self::connect) with a caller-built HTTP client.
    pub async fn connect_with(config: Config, http: Client) -> Result<Self> {
        Self::from_session(Session::with_client(config, http)).await
    }

    async fn from_session(mut session: Session) -> Result<Self> {
        session.authenticate().await?;

        let mut client = Self {
            session,
            accessories: Vec::new(),
        };
        client.refresh_accessories().await?;
        Ok(client)
    }

    pub fn is_available(&self) -> bool {
        self.session.is_available()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The current accessory snapshot, in bridge order.
    pub fn accessories(&self) -> &[AccessoryRecord] {
        &self.accessories
    }

    /// Raw pass-through to [`Session::request`].
    pub async fn request(
        &mut self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        self.session.request(method, endpoint, options).await
    }

    /// Re-fetches the accessory list and replaces the snapshot.
    ///
    /// A non-success status is an `UnexpectedStatus` error and leaves the
    /// previous snapshot in place.
    pub async fn refresh_accessories(&mut self) -> Result<&[AccessoryRecord]> {
        let response = self
            .session
            .request(Method::GET, ACCESSORIES_ENDPOINT, RequestOptions::default())
            .await?;

        if !response.is_success() {
            return Err(HomebridgeError::UnexpectedStatus {
                endpoint: ACCESSORIES_ENDPOINT.to_owned(),
                status: response.status(),
                body: response.text().into_owned(),
            });
        }

        self.accessories = response.json()?;
        info!(count = self.accessories.len(), "Fetched accessory list");
        Ok(&self.accessories)
    }

    /// Asks the bridge to drop its cached accessories. The response is
    /// returned unchecked.
    pub async fn reset_cached_accessories(&mut self) -> Result<ApiResponse> {
        let options = RequestOptions::default().header(ACCEPT, HeaderValue::from_static("*/*"));
        self.session
            .request(Method::PUT, RESET_CACHE_ENDPOINT, options)
            .await
    }

    /// Outlets from the current snapshot, in bridge order.
    pub fn outlets(&self) -> Vec<Accessory> {
        self.accessories
            .iter()
            .filter(|r| r.is_outlet())
            .map(|r| {
                let outlet = Accessory::from(r);
                info!(name = %outlet.name, is_on = outlet.is_on, "Discovered outlet");
                outlet
            })
            .collect()
    }

    /// First outlet whose display name matches `name`, ignoring case.
    pub fn find_outlet(&self, name: &str) -> Option<Accessory> {
        self.accessories
            .iter()
            .filter(|r| r.is_outlet())
            .map(Accessory::from)
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Writes `payload` to the accessory.
    ///
    /// `Ok(true)` only for `200 OK`; any other status is `Ok(false)`. Only
    /// transport failures are errors.
    pub async fn toggle_outlet(
        &mut self,
        unique_id: &str,
        payload: &TogglePayload,
    ) -> Result<bool> {
        let endpoint = accessory_endpoint(unique_id);
        let response = self
            .session
            .request(Method::PUT, &endpoint, RequestOptions::json(payload)?)
            .await?;

        if response.status() != StatusCode::OK {
            warn!(
                unique_id = %unique_id,
                status = %response.status(),
                text = %response.text(),
                "Received non-success response toggling outlet"
            );
            return Ok(false);
        }

        info!(unique_id = %unique_id, value = payload.value, "Outlet toggled");
        Ok(true)
    }
}

/// `api/accessories/{unique_id}` with the id percent-encoded as one segment.
fn accessory_endpoint(unique_id: &str) -> String {
    format!("{ACCESSORIES_ENDPOINT}/{}", urlencoding::encode(unique_id))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
