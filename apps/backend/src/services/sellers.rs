use botica_core::validation::normalize_email;
use botica_core::{NewSeller, Page, PageRequest, ProfileUpdate, Seller, SellerUpdate};
use botica_db::mapping::{policy, seller_row};
use botica_db::upsert::upsert_local;
use botica_db::{SellerRecord, Table};
use botica_sync::rows;
use tracing::{debug, info, warn};

use crate::auth::{hash_password, verify_password, AuthError, Claims, LoginOutcome};
use crate::backend::Backend;
use crate::error::ApiResult;

impl Backend {
    pub async fn register_seller(&self, new: &NewSeller) -> ApiResult<Seller> {
        new.validate()?;
        let record = SellerRecord {
            name: new.name.clone(),
            last_name: new.last_name.clone(),
            national_id: new.national_id.clone(),
            email: new.email.clone(),
            password_hash: hash_password(&new.password)?,
        };
        let seller = self.db.sellers().register(record).await?;
        info!(seller_id = seller.id, "Seller registered");
        self.agent.push_seller(seller.clone());
        Ok(seller)
    }

    pub async fn update_seller(&self, id: i64, update: &SellerUpdate) -> ApiResult<Seller> {
        update.validate()?;
        let seller = self.db.sellers().update(id, update).await?;
        self.agent.push_seller(seller.clone());
        Ok(seller)
    }

    /// Self-service edit. A new password needs the current one; it is
    /// stored in the same transaction as the fields.
    pub async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> ApiResult<Seller> {
        update.validate()?;
        let password_hash = match (&update.new_password, &update.current_password) {
            (Some(new_password), Some(current)) => {
                let seller = self.db.sellers().get(id).await?;
                if !verify_password(current, &seller.password_hash) {
                    return Err(AuthError::WrongCurrentPassword.into());
                }
                Some(hash_password(new_password)?)
            }
            _ => None,
        };
        let seller = self
            .db
            .sellers()
            .update_profile(id, &update.fields, password_hash.as_deref())
            .await?;
        self.agent.push_seller(seller.clone());
        Ok(seller)
    }

    pub async fn delete_seller(&self, id: i64) -> ApiResult<()> {
        Ok(self.db.sellers().soft_delete(id).await?)
    }

    pub async fn get_seller(&self, id: i64) -> ApiResult<Seller> {
        Ok(self.db.sellers().get(id).await?)
    }

    pub async fn list_sellers(&self, req: &PageRequest) -> ApiResult<Page<Seller>> {
        Ok(self.db.sellers().paginated(req).await?)
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Checks credentials and issues a session token, or a pending token
    /// when the seller has MFA enabled.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginOutcome> {
        let seller = match self.find_login_seller(email).await? {
            Some(seller) if verify_password(password, &seller.password_hash) => seller,
            _ => {
                debug!("Login rejected");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if seller.mfa_enabled {
            info!(seller_id = seller.id, "Login awaiting second factor");
            return Ok(LoginOutcome::MfaRequired {
                pending_token: self.tokens.issue_mfa_pending(&seller)?,
            });
        }

        info!(seller_id = seller.id, "Seller logged in");
        Ok(LoginOutcome::Authenticated {
            token: self.tokens.issue_session(&seller)?,
            seller: seller.summary(),
        })
    }

    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        Ok(self.tokens.validate_token(token)?)
    }

    /// Remote first when available; a remote hit is cached locally by
    /// national id. The local store answers otherwise.
    async fn find_login_seller(&self, email: &str) -> ApiResult<Option<Seller>> {
        let email = normalize_email(email);
        let remote = self.agent.remote();
        if remote.is_configured() {
            match remote.check().await {
                Ok(pool) => match rows::seller_by_email(pool, &email).await {
                    Ok(Some(found)) => self.cache_seller(&found).await,
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Remote seller lookup failed"),
                },
                Err(e) => debug!(error = %e, "Remote unavailable for login"),
            }
        }
        Ok(self.db.sellers().find_by_email(&email).await?)
    }

    async fn cache_seller(&self, seller: &Seller) {
        let cached = async {
            let mut conn = self.db.pool().acquire().await?;
            upsert_local(&mut conn, Table::Sellers, &[seller_row(seller)], &policy::sellers()).await
        }
        .await;
        if let Err(e) = cached {
            warn!(national_id = %seller.national_id, error = %e, "Could not cache remote seller");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::LoginOutcome;
    use crate::backend::tests::{new_seller, offline_backend, test_config};
    use crate::backend::Backend;
    use crate::error::ErrorCode;
    use botica_core::{ProfileUpdate, SellerUpdate};
    use botica_db::mapping::seller_row;
    use botica_db::upsert::{upsert_local, ConflictPolicy};
    use botica_db::{Database, DbConfig, Table};
    use botica_sync::{Pusher, RemoteStore};

    #[tokio::test]
    async fn test_login_issues_a_session_token() {
        let backend = offline_backend().await;
        let seller = backend.register_seller(&new_seller("1020", "Ana@Botica.co")).await.unwrap();
        assert_eq!(seller.email, "ana@botica.co");

        let outcome = backend.login("ANA@botica.co ", "clave-123").await.unwrap();
        let LoginOutcome::Authenticated { token, seller: summary } = outcome else {
            panic!("expected a session");
        };
        assert_eq!(summary.id, seller.id);
        let claims = backend.validate_token(&token).unwrap();
        assert_eq!(claims.user_id, seller.id);
        assert_eq!(claims.national_id, "1020");
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_the_same() {
        let backend = offline_backend().await;
        backend.register_seller(&new_seller("1020", "ana@botica.co")).await.unwrap();

        let unknown = backend.login("nadie@botica.co", "clave-123").await.unwrap_err();
        let wrong = backend.login("ana@botica.co", "otra").await.unwrap_err();
        assert_eq!(unknown.code, ErrorCode::AuthFailed);
        assert_eq!(wrong.code, ErrorCode::AuthFailed);
        assert_eq!(unknown.message, wrong.message);
    }

    #[tokio::test]
    async fn test_mfa_seller_gets_a_pending_token() {
        let backend = offline_backend().await;
        let seller = backend.register_seller(&new_seller("1020", "ana@botica.co")).await.unwrap();
        enable_mfa(&backend, seller.id).await;

        let outcome = backend.login("ana@botica.co", "clave-123").await.unwrap();
        let LoginOutcome::MfaRequired { pending_token } = outcome else {
            panic!("expected a pending token");
        };
        assert!(backend.validate_token(&pending_token).is_err());
        assert!(backend.tokens.validate_mfa_pending(&pending_token).is_ok());
    }

    async fn enable_mfa(backend: &Backend, id: i64) {
        let mut seller = backend.get_seller(id).await.unwrap();
        seller.mfa_enabled = true;
        let mut conn = backend.database().pool().acquire().await.unwrap();
        upsert_local(
            &mut conn,
            Table::Sellers,
            &[seller_row(&seller)],
            &ConflictPolicy::update(&["national_id"], &["mfa_enabled"]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_password_change_requires_the_current_password() {
        let backend = offline_backend().await;
        let seller = backend.register_seller(&new_seller("1020", "ana@botica.co")).await.unwrap();
        let fields = SellerUpdate {
            name: "Ana Maria".to_string(),
            last_name: "Rojas".to_string(),
            national_id: "1020".to_string(),
            email: "ana@botica.co".to_string(),
        };

        let wrong = ProfileUpdate {
            fields: fields.clone(),
            current_password: Some("nope".to_string()),
            new_password: Some("nueva-456".to_string()),
        };
        assert_eq!(backend.update_profile(seller.id, &wrong).await.unwrap_err().code, ErrorCode::AuthFailed);

        let missing = ProfileUpdate {
            fields: fields.clone(),
            current_password: None,
            new_password: Some("nueva-456".to_string()),
        };
        assert_eq!(backend.update_profile(seller.id, &missing).await.unwrap_err().code, ErrorCode::Validation);

        let right = ProfileUpdate {
            fields,
            current_password: Some("clave-123".to_string()),
            new_password: Some("nueva-456".to_string()),
        };
        let updated = backend.update_profile(seller.id, &right).await.unwrap();
        assert_eq!(updated.name, "Ana Maria");
        assert!(backend.login("ana@botica.co", "nueva-456").await.is_ok());
        assert!(backend.login("ana@botica.co", "clave-123").await.is_err());
    }

    #[tokio::test]
    async fn test_rejected_profile_update_keeps_the_old_password() {
        let backend = offline_backend().await;
        let ana = backend.register_seller(&new_seller("1020", "ana@botica.co")).await.unwrap();
        backend.register_seller(&new_seller("3040", "luis@botica.co")).await.unwrap();

        let taken_email = ProfileUpdate {
            fields: SellerUpdate {
                name: "Ana".to_string(),
                last_name: "Rojas".to_string(),
                national_id: "1020".to_string(),
                email: "luis@botica.co".to_string(),
            },
            current_password: Some("clave-123".to_string()),
            new_password: Some("otra-clave".to_string()),
        };
        let err = backend.update_profile(ana.id, &taken_email).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateKey);

        assert!(backend.login("ana@botica.co", "clave-123").await.is_ok());
        assert!(backend.login("ana@botica.co", "otra-clave").await.is_err());
    }

    #[tokio::test]
    async fn test_remote_seller_is_cached_on_login() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/remote.db?mode=rwc", dir.path().display());
        let remote = RemoteStore::connect(Some(&url), std::time::Duration::from_secs(2)).await;

        // Another till registered the seller and pushed it.
        let other = offline_backend().await;
        let seller = other.register_seller(&new_seller("5566", "luis@botica.co")).await.unwrap();
        Pusher::new(other.database().clone(), remote.clone()).push_seller(&seller).await.unwrap();

        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let backend = Backend::with_stores(test_config(), db, remote);
        assert!(backend.database().sellers().find_by_national_id("5566").await.unwrap().is_none());

        assert!(backend.login("luis@botica.co", "clave-123").await.is_ok());
        let cached = backend.database().sellers().find_by_national_id("5566").await.unwrap().unwrap();
        assert_eq!(cached.email, "luis@botica.co");
    }
}
