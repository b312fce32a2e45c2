/*!
 * # Authentication and Authorization Module
 *
 * Supplier-portal authentication:
 *
 * - argon2 password hashes and a registration password policy
 * - HS256 access tokens bound to a session row
 * - rotating refresh tokens stored as SHA-256 digests, with reuse detection
 * - TOTP second factor with single-use backup codes
 * - per email+ip login throttling and persistent lockout
 *
 * Authorization is role based; every permission is additionally scoped by the
 * regions a supplier has been granted. Admins see every region.
 */

use crate::{
    config::AppConfig,
    db::DbPool,
    entities::{
        refresh_token::{self, Entity as RefreshToken},
        session::{self, Entity as Session},
        supplier::{self, join_list, Entity as Supplier},
        supplier_mfa::{self, Entity as SupplierMfa},
        types::{Region, SupplierRole, SupplierStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit::{AuditEntry, AuditLogger},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::Engine as _;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

pub mod mfa;
pub mod password_policy;
pub mod permissions;
pub mod rate_limit;
pub mod rbac;

pub use mfa::{MfaError, Totp, TotpConfig};
pub use password_policy::{PasswordPolicy, PasswordPolicyError};
pub use permissions::consts::*;
pub use permissions::{format_permission, is_permission_implied};
pub use rate_limit::{AuthRateLimitConfig, AuthRateLimiter};
pub use rbac::{permissions_for_role, role_allows, ROLES};

/// Claim structure for access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub regions: Vec<String>,
    /// Session the token is bound to
    pub sid: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated supplier extracted from a validated access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub supplier_id: Uuid,
    pub email: String,
    pub role: SupplierRole,
    pub regions: Vec<Region>,
    pub permissions: Vec<String>,
    pub session_id: Uuid,
}

impl AuthUser {
    pub fn from_claims(claims: &Claims) -> Result<Self, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid authentication token".to_string());
        let role = SupplierRole::from_str(&claims.role).map_err(|_| invalid())?;
        let regions = claims
            .regions
            .iter()
            .map(|r| Region::from_str(r).map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            supplier_id: Uuid::parse_str(&claims.sub).map_err(|_| invalid())?,
            email: claims.email.clone(),
            role,
            regions,
            permissions: permissions_for_role(role),
            session_id: Uuid::parse_str(&claims.sid).map_err(|_| invalid())?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == SupplierRole::Admin
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions
            .iter()
            .any(|granted| is_permission_implied(granted, permission))
    }

    pub fn can_access_region(&self, region: Region) -> bool {
        self.is_admin() || self.regions.contains(&region)
    }

    /// Regions this user may read, `None` meaning unrestricted.
    pub fn region_scope(&self) -> Option<Vec<Region>> {
        if self.is_admin() {
            None
        } else {
            Some(self.regions.clone())
        }
    }

    /// Fails with `Forbidden` unless the permission is held, in `region` when given.
    pub fn require(&self, permission: &str, region: Option<Region>) -> Result<(), ServiceError> {
        if !self.has_permission(permission) {
            return Err(ServiceError::Forbidden(format!(
                "missing permission {}",
                permission
            )));
        }
        if let Some(region) = region {
            if !self.can_access_region(region) {
                return Err(ServiceError::Forbidden(format!(
                    "no access to region {}",
                    region
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_ttl: ChronoDuration,
    pub refresh_token_ttl: ChronoDuration,
    pub max_failed_logins: i32,
    pub lockout_duration: ChronoDuration,
}

impl From<&AppConfig> for AuthConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.jwt_secret.clone(),
            jwt_issuer: config.auth_issuer.clone(),
            jwt_audience: config.auth_audience.clone(),
            access_token_ttl: ChronoDuration::seconds(config.access_token_ttl_secs),
            refresh_token_ttl: ChronoDuration::seconds(config.refresh_token_ttl_secs),
            max_failed_logins: config.max_failed_logins,
            lockout_duration: ChronoDuration::minutes(config.lockout_minutes),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterSupplierRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub company_name: String,
    #[validate(length(min = 1, max = 200))]
    pub contact_name: String,
    #[validate(length(min = 1))]
    pub regions: Vec<Region>,
    #[serde(default)]
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
}

/// Where a login or refresh came from
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        Self {
            ip_address,
            user_agent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub supplier: supplier::Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct MfaSetup {
    pub secret: String,
    pub otpauth_uri: String,
    /// Shown once; only digests are stored
    pub backup_codes: Vec<String>,
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// SHA-256 hex digest used to store refresh tokens
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn invalid_credentials() -> ServiceError {
    ServiceError::AuthError("Invalid credentials".to_string())
}

fn mfa_error(err: MfaError) -> ServiceError {
    match err {
        MfaError::SetupRequired | MfaError::MfaNotEnabled => {
            ServiceError::InvalidOperation(err.to_string())
        }
        _ => ServiceError::AuthError(err.to_string()),
    }
}

/// Authentication service that handles accounts, sessions and tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    audit: Arc<AuditLogger>,
    rate_limiter: Arc<AuthRateLimiter>,
    totp: Totp,
    password_policy: PasswordPolicy,
}

impl AuthService {
    pub fn new(
        config: AuthConfig,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        audit: Arc<AuditLogger>,
        rate_limiter: Arc<AuthRateLimiter>,
    ) -> Self {
        Self {
            config,
            db_pool,
            event_sender,
            audit,
            rate_limiter,
            totp: Totp::default(),
            password_policy: PasswordPolicy::default(),
        }
    }

    pub fn totp(&self) -> &Totp {
        &self.totp
    }

    /// Self-service registration. Accounts start `PENDING` with the `SUPPLIER`
    /// role until an administrator activates them.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register_supplier(
        &self,
        request: RegisterSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        self.password_policy
            .validate(&request.password, Some(&email))
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = self.db_pool.as_ref();
        let existing = Supplier::find()
            .filter(supplier::Column::Email.eq(email.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "supplier {} already registered",
                email
            )));
        }

        let now = Utc::now();
        let supplier = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(hash_password(&request.password)?),
            company_name: Set(request.company_name.trim().to_string()),
            contact_name: Set(request.contact_name.trim().to_string()),
            role: Set(SupplierRole::Supplier.as_str().to_string()),
            status: Set(SupplierStatus::Pending.as_str().to_string()),
            regions: Set(join_list(request.regions.iter().map(Region::as_str))),
            certifications: Set(join_list(&request.certifications)),
            mfa_enabled: Set(false),
            failed_login_attempts: Set(0),
            locked_until: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(supplier_id = %supplier.id, "supplier registered");
        self.event_sender
            .send_or_log(Event::SupplierRegistered(supplier.id))
            .await;
        self.audit
            .log(
                AuditEntry::new("supplier.register", "supplier")
                    .actor(supplier.id)
                    .resource(supplier.id),
            )
            .await;
        Ok(supplier)
    }

    /// Admin operation: activate a pending supplier, optionally changing role
    /// and region grants.
    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn activate_supplier(
        &self,
        actor: &AuthUser,
        supplier_id: Uuid,
        role: Option<SupplierRole>,
        regions: Option<Vec<Region>>,
    ) -> Result<supplier::Model, ServiceError> {
        actor.require(SUPPLIERS_MANAGE, None)?;
        let supplier = self.get_supplier(supplier_id).await?;

        let mut active: supplier::ActiveModel = supplier.into();
        active.status = Set(SupplierStatus::Active.as_str().to_string());
        if let Some(role) = role {
            active.role = Set(role.as_str().to_string());
        }
        if let Some(regions) = regions {
            if regions.is_empty() {
                return Err(ServiceError::ValidationError(
                    "at least one region is required".to_string(),
                ));
            }
            active.regions = Set(join_list(regions.iter().map(Region::as_str)));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(self.db_pool.as_ref()).await?;

        self.audit
            .log(
                AuditEntry::new("supplier.activate", "supplier")
                    .actor(actor.supplier_id)
                    .resource(supplier_id)
                    .details(serde_json::json!({ "role": updated.role })),
            )
            .await;
        Ok(updated)
    }

    /// Admin operation: suspend a supplier and revoke every live session.
    #[instrument(skip(self, actor), fields(actor = %actor.supplier_id))]
    pub async fn suspend_supplier(
        &self,
        actor: &AuthUser,
        supplier_id: Uuid,
    ) -> Result<supplier::Model, ServiceError> {
        actor.require(SUPPLIERS_MANAGE, None)?;
        let supplier = self.get_supplier(supplier_id).await?;

        let updated = self
            .db_pool
            .transaction::<_, supplier::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let mut active: supplier::ActiveModel = supplier.into();
                    active.status = Set(SupplierStatus::Suspended.as_str().to_string());
                    active.updated_at = Set(now);
                    let updated = active.update(txn).await?;

                    Session::update_many()
                        .col_expr(session::Column::Revoked, Expr::value(true))
                        .filter(session::Column::SupplierId.eq(supplier_id))
                        .exec(txn)
                        .await?;
                    RefreshToken::update_many()
                        .col_expr(refresh_token::Column::Revoked, Expr::value(true))
                        .filter(refresh_token::Column::SupplierId.eq(supplier_id))
                        .exec(txn)
                        .await?;
                    Ok(updated)
                })
            })
            .await?;

        self.audit
            .log(
                AuditEntry::new("supplier.suspend", "supplier")
                    .actor(actor.supplier_id)
                    .resource(supplier_id),
            )
            .await;
        Ok(updated)
    }

    pub async fn get_supplier(&self, supplier_id: Uuid) -> Result<supplier::Model, ServiceError> {
        Supplier::find_by_id(supplier_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("supplier {} not found", supplier_id)))
    }

    pub async fn list_suppliers(
        &self,
        actor: &AuthUser,
        status: Option<SupplierStatus>,
    ) -> Result<Vec<supplier::Model>, ServiceError> {
        actor.require(SUPPLIERS_MANAGE, None)?;
        let mut query = Supplier::find();
        if let Some(status) = status {
            query = query.filter(supplier::Column::Status.eq(status.as_str()));
        }
        Ok(query.all(self.db_pool.as_ref()).await?)
    }

    /// Verify credentials (and second factor when enabled), then open a
    /// session with a fresh token pair.
    #[instrument(skip(self, request, context), fields(email = %request.email))]
    pub async fn login(
        &self,
        request: LoginRequest,
        context: ClientContext,
    ) -> Result<LoginResponse, ServiceError> {
        let email = request.email.trim().to_lowercase();
        let rate_key = AuthRateLimiter::key(
            &email,
            context.ip_address.as_deref().unwrap_or("unknown"),
        );
        self.rate_limiter.check(&rate_key).await?;

        let db = self.db_pool.as_ref();
        let now = Utc::now();

        let supplier = match Supplier::find()
            .filter(supplier::Column::Email.eq(email.clone()))
            .one(db)
            .await?
        {
            Some(supplier) => supplier,
            None => {
                self.audit
                    .log(
                        AuditEntry::new("auth.login", "supplier")
                            .failure()
                            .ip(context.ip_address.clone())
                            .details(serde_json::json!({ "reason": "unknown_email" })),
                    )
                    .await;
                return Err(invalid_credentials());
            }
        };

        if let Some(until) = supplier.locked_until.filter(|until| *until > now) {
            return Err(ServiceError::AccountLocked(until));
        }

        if !verify_password(&request.password, &supplier.password_hash) {
            return Err(self.record_failed_login(supplier, &context, "bad_password").await);
        }

        if supplier.status()? != SupplierStatus::Active {
            return Err(ServiceError::Forbidden(format!(
                "account is {}",
                supplier.status
            )));
        }

        if supplier.mfa_enabled {
            let code = match request.mfa_code.as_deref().map(str::trim) {
                Some(code) if !code.is_empty() => code.to_string(),
                _ => return Err(ServiceError::MfaRequired),
            };
            if let Err(e) = self.verify_second_factor(supplier.id, &code).await {
                let err = self.record_failed_login(supplier, &context, "bad_mfa_code").await;
                return Err(match err {
                    ServiceError::AccountLocked(_) => err,
                    _ => e,
                });
            }
        }

        let role = supplier.role()?;
        let regions = supplier.region_list()?;
        let refresh_ttl = self.config.refresh_token_ttl;
        let ctx = context.clone();

        let (supplier, session, refresh_token) = self
            .db_pool
            .transaction::<_, (supplier::Model, session::Model, String), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let mut active: supplier::ActiveModel = supplier.into();
                        active.failed_login_attempts = Set(0);
                        active.locked_until = Set(None);
                        active.last_login_at = Set(Some(now));
                        active.updated_at = Set(now);
                        let supplier = active.update(txn).await?;

                        let session = session::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            supplier_id: Set(supplier.id),
                            ip_address: Set(ctx.ip_address),
                            user_agent: Set(ctx.user_agent),
                            revoked: Set(false),
                            created_at: Set(now),
                            expires_at: Set(now + refresh_ttl),
                            last_seen_at: Set(now),
                        }
                        .insert(txn)
                        .await?;

                        let token = generate_refresh_token();
                        insert_refresh_token(txn, &session, &token, now + refresh_ttl).await?;
                        Ok((supplier, session, token))
                    })
                },
            )
            .await?;

        self.rate_limiter.record_success(&rate_key).await;
        let tokens = self.issue_tokens(&supplier, role, &regions, session.id, refresh_token)?;

        info!(supplier_id = %supplier.id, session_id = %session.id, "supplier logged in");
        self.event_sender
            .send_or_log(Event::SupplierLoggedIn {
                supplier_id: supplier.id,
                session_id: session.id,
            })
            .await;
        self.audit
            .log(
                AuditEntry::new("auth.login", "supplier")
                    .actor(supplier.id)
                    .resource(supplier.id)
                    .ip(context.ip_address),
            )
            .await;

        Ok(LoginResponse { tokens, supplier })
    }

    /// Count a failed attempt, locking the account once the limit is reached.
    /// Returns the error the caller should surface.
    async fn record_failed_login(
        &self,
        supplier: supplier::Model,
        context: &ClientContext,
        reason: &str,
    ) -> ServiceError {
        let now = Utc::now();
        let attempts = supplier.failed_login_attempts + 1;
        let locked_until = (attempts >= self.config.max_failed_logins)
            .then(|| now + self.config.lockout_duration);
        let supplier_id = supplier.id;

        let mut active: supplier::ActiveModel = supplier.into();
        active.failed_login_attempts = Set(if locked_until.is_some() { 0 } else { attempts });
        if locked_until.is_some() {
            active.locked_until = Set(locked_until);
        }
        active.updated_at = Set(now);
        if let Err(e) = active.update(self.db_pool.as_ref()).await {
            return ServiceError::DatabaseError(e);
        }

        self.audit
            .log(
                AuditEntry::new("auth.login", "supplier")
                    .actor(supplier_id)
                    .resource(supplier_id)
                    .failure()
                    .ip(context.ip_address.clone())
                    .details(serde_json::json!({ "reason": reason, "attempts": attempts })),
            )
            .await;

        match locked_until {
            Some(until) => {
                warn!(supplier_id = %supplier_id, %until, "supplier locked after failed logins");
                metrics::counter!("flexvolt_auth.lockouts", 1);
                self.event_sender
                    .send_or_log(Event::SupplierLocked { supplier_id, until })
                    .await;
                ServiceError::AccountLocked(until)
            }
            None => invalid_credentials(),
        }
    }

    fn issue_tokens(
        &self,
        supplier: &supplier::Model,
        role: SupplierRole,
        regions: &[Region],
        session_id: Uuid,
        refresh_token: String,
    ) -> Result<TokenPair, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: supplier.id.to_string(),
            email: supplier.email.clone(),
            role: role.as_str().to_string(),
            regions: regions.iter().map(|r| r.as_str().to_string()).collect(),
            sid: session_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.config.access_token_ttl).timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::JwtError(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_ttl.num_seconds(),
            refresh_expires_in: self.config.refresh_token_ttl.num_seconds(),
            session_id,
        })
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("Token has expired".to_string())
            }
            _ => ServiceError::Unauthorized("Invalid authentication token".to_string()),
        })
    }

    /// Validate an access token and check that its session is still live.
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let claims = self.decode_token(token)?;
        let user = AuthUser::from_claims(&claims)?;

        let session = Session::find_by_id(user.session_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Session not found".to_string()))?;
        if session.revoked || session.expires_at <= Utc::now() {
            return Err(ServiceError::Unauthorized(
                "Session expired or revoked".to_string(),
            ));
        }
        Ok(user)
    }

    /// Rotate a refresh token. Presenting a token that was already used or
    /// revoked revokes the whole session.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ServiceError> {
        let db = self.db_pool.as_ref();
        let now = Utc::now();

        let stored = RefreshToken::find()
            .filter(refresh_token::Column::TokenHash.eq(hash_token(refresh_token)))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid refresh token".to_string()))?;

        if stored.used || stored.revoked {
            return Err(self.handle_refresh_reuse(&stored).await);
        }
        if stored.expires_at <= now {
            return Err(ServiceError::Unauthorized(
                "Refresh token has expired".to_string(),
            ));
        }

        let session = Session::find_by_id(stored.session_id)
            .one(db)
            .await?
            .filter(|s| !s.revoked && s.expires_at > now)
            .ok_or_else(|| ServiceError::Unauthorized("Session expired or revoked".to_string()))?;

        let supplier = self.get_supplier(stored.supplier_id).await?;
        if supplier.status()? != SupplierStatus::Active {
            return Err(ServiceError::Forbidden(format!(
                "account is {}",
                supplier.status
            )));
        }
        let role = supplier.role()?;
        let regions = supplier.region_list()?;
        let refresh_ttl = self.config.refresh_token_ttl;
        let stored_id = stored.id;

        let rotated = self
            .db_pool
            .transaction::<_, Option<String>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let claimed = RefreshToken::update_many()
                        .col_expr(refresh_token::Column::Used, Expr::value(true))
                        .filter(refresh_token::Column::Id.eq(stored_id))
                        .filter(refresh_token::Column::Used.eq(false))
                        .exec(txn)
                        .await?;
                    if claimed.rows_affected == 0 {
                        return Ok(None);
                    }

                    let token = generate_refresh_token();
                    insert_refresh_token(txn, &session, &token, now + refresh_ttl).await?;

                    let mut active: session::ActiveModel = session.into();
                    active.last_seen_at = Set(now);
                    active.update(txn).await?;
                    Ok(Some(token))
                })
            })
            .await?;

        let token = match rotated {
            Some(token) => token,
            None => return Err(self.handle_refresh_reuse(&stored).await),
        };

        self.issue_tokens(&supplier, role, &regions, stored.session_id, token)
    }

    async fn handle_refresh_reuse(&self, stored: &refresh_token::Model) -> ServiceError {
        warn!(
            supplier_id = %stored.supplier_id,
            session_id = %stored.session_id,
            "refresh token reuse detected, revoking session"
        );
        metrics::counter!("flexvolt_auth.refresh_reuse", 1);
        if let Err(e) = self.revoke_session(stored.session_id).await {
            return e;
        }
        self.audit
            .log(
                AuditEntry::new("auth.refresh_reuse", "session")
                    .actor(stored.supplier_id)
                    .resource(stored.session_id)
                    .failure(),
            )
            .await;
        ServiceError::Unauthorized("Refresh token reuse detected".to_string())
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<(), ServiceError> {
        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    Session::update_many()
                        .col_expr(session::Column::Revoked, Expr::value(true))
                        .filter(session::Column::Id.eq(session_id))
                        .exec(txn)
                        .await?;
                    RefreshToken::update_many()
                        .col_expr(refresh_token::Column::Revoked, Expr::value(true))
                        .filter(refresh_token::Column::SessionId.eq(session_id))
                        .exec(txn)
                        .await?;
                    Ok(())
                })
            })
            .await?;
        Ok(())
    }

    /// End the caller's session and invalidate its refresh tokens.
    #[instrument(skip(self, user), fields(supplier_id = %user.supplier_id))]
    pub async fn logout(&self, user: &AuthUser) -> Result<(), ServiceError> {
        self.revoke_session(user.session_id).await?;
        self.audit
            .log(
                AuditEntry::new("auth.logout", "session")
                    .actor(user.supplier_id)
                    .resource(user.session_id),
            )
            .await;
        Ok(())
    }

    /// Start MFA enrolment. The secret is stored disabled until confirmed.
    #[instrument(skip(self, user), fields(supplier_id = %user.supplier_id))]
    pub async fn setup_mfa(&self, user: &AuthUser) -> Result<MfaSetup, ServiceError> {
        let db = self.db_pool.as_ref();
        let existing = SupplierMfa::find_by_id(user.supplier_id).one(db).await?;
        if existing.as_ref().map_or(false, |m| m.enabled) {
            return Err(ServiceError::Conflict("MFA already enabled".to_string()));
        }

        let secret = self.totp.generate_secret();
        let backup_codes = self.totp.generate_backup_codes();
        let hashed = backup_codes
            .iter()
            .map(|c| mfa::hash_backup_code(c))
            .collect::<Vec<_>>()
            .join(",");
        let now = Utc::now();

        match existing {
            Some(row) => {
                let mut active: supplier_mfa::ActiveModel = row.into();
                active.secret = Set(secret.clone());
                active.backup_codes = Set(hashed);
                active.last_used_step = Set(None);
                active.updated_at = Set(now);
                active.update(db).await?;
            }
            None => {
                supplier_mfa::ActiveModel {
                    supplier_id: Set(user.supplier_id),
                    secret: Set(secret.clone()),
                    enabled: Set(false),
                    backup_codes: Set(hashed),
                    last_used_step: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(db)
                .await?;
            }
        }

        Ok(MfaSetup {
            otpauth_uri: self.totp.provisioning_uri(&secret, &user.email),
            secret,
            backup_codes,
        })
    }

    /// Enable MFA once the user proves possession of the secret.
    #[instrument(skip(self, user, code), fields(supplier_id = %user.supplier_id))]
    pub async fn confirm_mfa(&self, user: &AuthUser, code: &str) -> Result<(), ServiceError> {
        let mfa = SupplierMfa::find_by_id(user.supplier_id)
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(|| mfa_error(MfaError::SetupRequired))?;
        if mfa.enabled {
            return Err(ServiceError::Conflict("MFA already enabled".to_string()));
        }

        let step = self
            .totp
            .verify(&mfa.secret, code, Utc::now().timestamp(), mfa.last_used_step)
            .map_err(mfa_error)?;
        let supplier = self.get_supplier(user.supplier_id).await?;

        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let mut active: supplier_mfa::ActiveModel = mfa.into();
                    active.enabled = Set(true);
                    active.last_used_step = Set(Some(step));
                    active.updated_at = Set(now);
                    active.update(txn).await?;

                    let mut supplier: supplier::ActiveModel = supplier.into();
                    supplier.mfa_enabled = Set(true);
                    supplier.updated_at = Set(now);
                    supplier.update(txn).await?;
                    Ok(())
                })
            })
            .await?;

        self.audit
            .log(
                AuditEntry::new("auth.mfa_enabled", "supplier")
                    .actor(user.supplier_id)
                    .resource(user.supplier_id),
            )
            .await;
        Ok(())
    }

    #[instrument(skip(self, user, code), fields(supplier_id = %user.supplier_id))]
    pub async fn disable_mfa(&self, user: &AuthUser, code: &str) -> Result<(), ServiceError> {
        self.verify_second_factor(user.supplier_id, code).await?;
        let supplier = self.get_supplier(user.supplier_id).await?;
        let supplier_id = user.supplier_id;

        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    SupplierMfa::delete_by_id(supplier_id).exec(txn).await?;
                    let mut supplier: supplier::ActiveModel = supplier.into();
                    supplier.mfa_enabled = Set(false);
                    supplier.updated_at = Set(Utc::now());
                    supplier.update(txn).await?;
                    Ok(())
                })
            })
            .await?;

        self.audit
            .log(
                AuditEntry::new("auth.mfa_disabled", "supplier")
                    .actor(user.supplier_id)
                    .resource(user.supplier_id),
            )
            .await;
        Ok(())
    }

    /// Accept a TOTP code or consume a backup code for an enabled factor.
    async fn verify_second_factor(&self, supplier_id: Uuid, code: &str) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let mfa = SupplierMfa::find_by_id(supplier_id)
            .one(db)
            .await?
            .filter(|m| m.enabled)
            .ok_or_else(|| mfa_error(MfaError::MfaNotEnabled))?;

        match self
            .totp
            .verify(&mfa.secret, code, Utc::now().timestamp(), mfa.last_used_step)
        {
            Ok(step) => {
                let mut active: supplier_mfa::ActiveModel = mfa.into();
                active.last_used_step = Set(Some(step));
                active.updated_at = Set(Utc::now());
                active.update(db).await?;
                Ok(())
            }
            Err(MfaError::InvalidTotpCode) => {
                let remaining = mfa::consume_backup_code(&mfa.backup_codes, code)
                    .ok_or_else(|| mfa_error(MfaError::InvalidTotpCode))?;
                info!(supplier_id = %supplier_id, "backup code consumed");
                let mut active: supplier_mfa::ActiveModel = mfa.into();
                active.backup_codes = Set(remaining);
                active.updated_at = Set(Utc::now());
                active.update(db).await?;
                Ok(())
            }
            Err(e) => Err(mfa_error(e)),
        }
    }
}

async fn insert_refresh_token<C: sea_orm::ConnectionTrait>(
    conn: &C,
    session: &session::Model,
    token: &str,
    expires_at: chrono::DateTime<Utc>,
) -> Result<refresh_token::Model, ServiceError> {
    Ok(refresh_token::ActiveModel {
        id: Set(Uuid::new_v4()),
        session_id: Set(session.id),
        supplier_id: Set(session.supplier_id),
        token_hash: Set(hash_token(token)),
        used: Set(false),
        revoked: Set(false),
        created_at: Set(Utc::now()),
        expires_at: Set(expires_at),
    }
    .insert(conn)
    .await?)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolves the bearer token into an [`AuthUser`] request extension. Expects an
/// `Arc<AuthService>` extension installed by the router.
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, ServiceError> {
    let auth_service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| {
            ServiceError::InternalError("Authentication service not available".to_string())
        })?;

    let token = bearer_token(request.headers())
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".to_string()))?;
    let user = auth_service.authenticate(&token).await?;
    tracing::Span::current().record("supplier_id", tracing::field::display(user.supplier_id));
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))?;

    if !user.has_permission(&required_permission) {
        return Err(ServiceError::Forbidden(format!(
            "missing permission {}",
            required_permission
        )));
    }

    Ok(next.run(request).await)
}

pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(role: SupplierRole, regions: Vec<Region>) -> AuthUser {
        AuthUser {
            supplier_id: Uuid::new_v4(),
            email: "ops@flexvolt.io".to_string(),
            role,
            regions,
            permissions: permissions_for_role(role),
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn permissions_are_scoped_by_region() {
        let manager = user(SupplierRole::WarehouseManager, vec![Region::UsWest]);
        assert!(manager.require(INVENTORY_UPDATE, Some(Region::UsWest)).is_ok());
        assert_matches!(
            manager.require(INVENTORY_UPDATE, Some(Region::Japan)),
            Err(ServiceError::Forbidden(_))
        );

        let admin = user(SupplierRole::Admin, vec![]);
        assert!(admin.require(INVENTORY_UPDATE, Some(Region::Japan)).is_ok());
        assert_eq!(admin.region_scope(), None);
    }

    #[test]
    fn viewer_cannot_update_inventory() {
        let viewer = user(SupplierRole::Viewer, vec![Region::EuGermany]);
        assert!(viewer.require(INVENTORY_READ, Some(Region::EuGermany)).is_ok());
        assert_matches!(
            viewer.require(INVENTORY_UPDATE, Some(Region::EuGermany)),
            Err(ServiceError::Forbidden(_))
        );
    }

    #[test]
    fn claims_round_trip_into_auth_user() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "buyer@example.com".to_string(),
            role: "SUPPLIER".to_string(),
            regions: vec!["JAPAN".to_string(), "AUSTRALIA".to_string()],
            sid: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: 0,
            exp: 0,
            nbf: 0,
            iss: "flexvolt-ops".to_string(),
            aud: "flexvolt-supplier-portal".to_string(),
        };
        let user = AuthUser::from_claims(&claims).unwrap();
        assert_eq!(user.role, SupplierRole::Supplier);
        assert_eq!(user.regions, vec![Region::Japan, Region::Australia]);
        assert!(user.has_permission(ORDERS_CREATE));

        let bad = Claims {
            role: "ROOT".to_string(),
            ..claims
        };
        assert_matches!(AuthUser::from_claims(&bad), Err(ServiceError::Unauthorized(_)));
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("Volt-Cell#2048x").unwrap();
        assert!(verify_password("Volt-Cell#2048x", &hash));
        assert!(!verify_password("Volt-Cell#2048y", &hash));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
        headers.insert(header::AUTHORIZATION, "Basic xyz".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn refresh_tokens_are_hashed() {
        let token = generate_refresh_token();
        assert_eq!(hash_token(&token).len(), 64);
        assert_ne!(hash_token(&token), token);
        assert_ne!(generate_refresh_token(), token);
    }
}
