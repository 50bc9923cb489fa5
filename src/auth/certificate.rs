//! Certificate strategy (priority 40)
//!
//! Validation itself lives behind [`CertificateAuthProvider`]; without a
//! provider the strategy abstains.

use std::sync::Arc;

use async_trait::async_trait;

use super::result::AuthorizationResult;
use super::strategy::{
    AuthContext, AuthRequest, AuthStrategy, CertificateAuthProvider, PRIORITY_CERTIFICATE,
};

pub struct CertificateStrategy {
    provider: Option<Arc<dyn CertificateAuthProvider>>,
}

impl CertificateStrategy {
    pub fn new(provider: Option<Arc<dyn CertificateAuthProvider>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AuthStrategy for CertificateStrategy {
    fn name(&self) -> &'static str {
        "certificate"
    }

    fn priority(&self) -> u8 {
        PRIORITY_CERTIFICATE
    }

    fn can_handle(&self, request: &AuthRequest, _ctx: &AuthContext<'_>) -> bool {
        self.provider.is_some() && request.certificate.is_some()
    }

    async fn authorize(
        &self,
        request: &AuthRequest,
        _ctx: &AuthContext<'_>,
    ) -> Option<AuthorizationResult> {
        let provider = self.provider.as_ref()?;
        let certificate = request.certificate.as_deref()?;
        provider.validate_certificate(certificate).await
    }
}
