use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, LoginRequest, MeResponse, PublicUser, RegisterRequest};
use crate::auth::jwt::Claims;
use crate::auth::role::Role;
use crate::client::store::TokenStore;
use crate::shops::dto::{
    CreateShopRequest, DeleteResponse, Shop, ShopFilters, ShopPage, ShopResponse, ShopsResponse,
    UpdateShopRequest,
};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a failure status; `message` is the body's
    /// own wording, suitable for showing to the user verbatim.
    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("request failed")]
    Transport(#[from] reqwest::Error),

    #[error("token storage failed")]
    Storage(#[from] std::io::Error),
}

/// Client-side authentication context plus the API surface behind it.
///
/// `init` resumes a previous session from the token store; every other
/// method assumes `init` has run. The session fails closed: any problem
/// while resuming leaves it logged out rather than half-authenticated.
pub struct Session {
    http: Client,
    base_url: String,
    store: TokenStore,
    token: Option<String>,
    user: Option<PublicUser>,
}

impl Session {
    /// Build a session against `base_url` (including the `/api` prefix,
    /// e.g. `http://localhost:5000/api`) and try to resume from the store.
    ///
    /// A stored token that is missing, unreadable, expired or rejected by
    /// the server yields a logged-out session; expired and rejected tokens
    /// are also purged from the store.
    pub async fn init(base_url: impl Into<String>, store: TokenStore) -> Session {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let mut session = Session {
            http: Client::new(),
            base_url,
            store,
            token: None,
            user: None,
        };

        let token = match session.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => return session,
            Err(e) => {
                warn!(error = %e, "could not read stored token");
                return session;
            }
        };

        let now = OffsetDateTime::now_utc().unix_timestamp();
        match decode_unverified(&token) {
            Some(claims) if !is_expired(&claims, now) => {}
            _ => {
                debug!("stored token expired or undecodable");
                if let Err(e) = session.store.clear() {
                    warn!(error = %e, "failed to clear stored token");
                }
                return session;
            }
        }

        // The local check only filters obviously dead tokens; the server
        // has the final say.
        session.token = Some(token);
        match session.fetch_me().await {
            Ok(user) => {
                debug!(user_id = %user.id, "session resumed");
                session.user = Some(user);
            }
            Err(e) => {
                warn!(error = %e, "stored token rejected, logging out");
                session.token = None;
                if let Err(e) = session.store.clear() {
                    warn!(error = %e, "failed to clear stored token");
                }
            }
        }
        session
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_merchant(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.role == Role::Merchant)
    }

    pub fn current_user(&self) -> Option<&PublicUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .request(Method::POST, "/auth/login")
            .json(&body)
            .send()
            .await?;
        let auth: AuthResponse = read_json(response).await?;
        self.adopt(auth)
    }

    pub async fn register(&mut self, details: RegisterRequest) -> Result<PublicUser, ClientError> {
        let response = self
            .request(Method::POST, "/auth/register")
            .json(&details)
            .send()
            .await?;
        let auth: AuthResponse = read_json(response).await?;
        self.adopt(auth)
    }

    /// Drop the identity and the stored token. Memory is cleared even if the
    /// store cannot be.
    pub fn logout(&mut self) {
        self.token = None;
        self.user = None;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear stored token");
        }
    }

    pub async fn search_shops(&self, filters: &ShopFilters) -> Result<ShopPage, ClientError> {
        let response = self
            .request(Method::GET, "/shops")
            .query(filters)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn shop(&self, id: Uuid) -> Result<Shop, ClientError> {
        let response = self
            .request(Method::GET, &format!("/shops/{id}"))
            .send()
            .await?;
        let body: ShopResponse = read_json(response).await?;
        Ok(body.shop)
    }

    pub async fn my_shops(&self) -> Result<Vec<Shop>, ClientError> {
        let response = self
            .request(Method::GET, "/shops/me/myshops")
            .send()
            .await?;
        let body: ShopsResponse = read_json(response).await?;
        Ok(body.shops)
    }

    pub async fn create_shop(&self, shop: &CreateShopRequest) -> Result<Shop, ClientError> {
        let response = self
            .request(Method::POST, "/shops")
            .json(shop)
            .send()
            .await?;
        let body: ShopResponse = read_json(response).await?;
        Ok(body.shop)
    }

    pub async fn update_shop(
        &self,
        id: Uuid,
        patch: &UpdateShopRequest,
    ) -> Result<Shop, ClientError> {
        let response = self
            .request(Method::PUT, &format!("/shops/{id}"))
            .json(patch)
            .send()
            .await?;
        let body: ShopResponse = read_json(response).await?;
        Ok(body.shop)
    }

    pub async fn delete_shop(&self, id: Uuid) -> Result<String, ClientError> {
        let response = self
            .request(Method::DELETE, &format!("/shops/{id}"))
            .send()
            .await?;
        let body: DeleteResponse = read_json(response).await?;
        Ok(body.message)
    }

    async fn fetch_me(&self) -> Result<PublicUser, ClientError> {
        let response = self.request(Method::GET, "/auth/me").send().await?;
        let body: MeResponse = read_json(response).await?;
        Ok(body.user)
    }

    fn adopt(&mut self, auth: AuthResponse) -> Result<PublicUser, ClientError> {
        self.store.save(&auth.token)?;
        self.token = Some(auth.token);
        self.user = Some(auth.user.clone());
        Ok(auth.user)
    }

    /// Every call goes through here so the bearer header is attached
    /// uniformly whenever a token is held.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder
    }
}

/// Read the claims without checking the signature. Only the server can
/// verify a token; this exists so the client can discard one that is
/// plainly expired before making a doomed request.
fn decode_unverified(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

fn is_expired(claims: &Claims, now: i64) -> bool {
    claims.exp as i64 <= now
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json::<T>().await?)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Api {
            status,
            message: extract_message(status, &body),
        })
    }
}

/// Pull the display message out of an error body. The server writes
/// `{"error": ...}`; a couple of endpoints use `{"message": ...}`. Anything
/// else falls back to the status line.
fn extract_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}
