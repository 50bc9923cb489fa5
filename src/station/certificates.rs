//! Certificate management contract
//!
//! The cryptography itself (CSR generation, chain verification, hashing) is
//! external; the station drives it through this trait when the CSMS sends
//! CertificateSigned / InstallCertificate / DeleteCertificate, or asks for a
//! SignCertificate via TriggerMessage.

use async_trait::async_trait;
use parking_lot::Mutex;

use rust_ocpp::v2_0_1::datatypes::certificate_hash_data_type::CertificateHashDataType;
use rust_ocpp::v2_0_1::enumerations::certificate_signing_use_enum_type::CertificateSigningUseEnumType;
use rust_ocpp::v2_0_1::enumerations::install_certificate_use_enum_type::InstallCertificateUseEnumType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Accepted,
    Failed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Accepted,
    Failed,
    NotFound,
}

#[async_trait]
pub trait CertificateManager: Send + Sync {
    /// Produce a CSR for the station identity.
    async fn generate_csr(&self, station_id: &str) -> Result<String, String>;

    /// A CSMS-signed certificate chain arrived. Returns acceptance; an
    /// accepted ChargingStationCertificate makes the station reconnect.
    async fn certificate_signed(
        &self,
        certificate_chain: &str,
        certificate_type: Option<CertificateSigningUseEnumType>,
    ) -> bool;

    async fn install_certificate(
        &self,
        certificate: &str,
        certificate_type: InstallCertificateUseEnumType,
    ) -> InstallOutcome;

    async fn delete_certificate(&self, hash_data: &CertificateHashDataType) -> DeleteOutcome;
}

/// In-memory manager: accepts well-formed PEM blobs and tracks installed
/// certificates by serial number.
#[derive(Default)]
pub struct InMemoryCertificateManager {
    installed: Mutex<Vec<String>>,
}

impl InMemoryCertificateManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn looks_like_pem(blob: &str) -> bool {
        blob.contains("-----BEGIN CERTIFICATE-----")
    }
}

#[async_trait]
impl CertificateManager for InMemoryCertificateManager {
    async fn generate_csr(&self, station_id: &str) -> Result<String, String> {
        // Placeholder CSR body; real key material comes from the external
        // crypto collaborator.
        Ok(format!(
            "-----BEGIN CERTIFICATE REQUEST-----\nCN={station_id}\n-----END CERTIFICATE REQUEST-----"
        ))
    }

    async fn certificate_signed(
        &self,
        certificate_chain: &str,
        _certificate_type: Option<CertificateSigningUseEnumType>,
    ) -> bool {
        Self::looks_like_pem(certificate_chain)
    }

    async fn install_certificate(
        &self,
        certificate: &str,
        _certificate_type: InstallCertificateUseEnumType,
    ) -> InstallOutcome {
        if Self::looks_like_pem(certificate) {
            self.installed.lock().push(certificate.to_string());
            InstallOutcome::Accepted
        } else {
            InstallOutcome::Rejected
        }
    }

    async fn delete_certificate(&self, hash_data: &CertificateHashDataType) -> DeleteOutcome {
        let mut installed = self.installed.lock();
        let before = installed.len();
        installed.retain(|cert| !cert.contains(&hash_data.serial_number));
        if installed.len() < before {
            DeleteOutcome::Accepted
        } else {
            DeleteOutcome::NotFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ocpp::v2_0_1::enumerations::hash_algorithm_enum_type::HashAlgorithmEnumType;

    #[tokio::test]
    async fn install_and_delete_roundtrip() {
        let manager = InMemoryCertificateManager::new();
        let outcome = manager
            .install_certificate(
                "-----BEGIN CERTIFICATE-----\nserial-42\n-----END CERTIFICATE-----",
                InstallCertificateUseEnumType::CSMSRootCertificate,
            )
            .await;
        assert_eq!(outcome, InstallOutcome::Accepted);

        let hash = CertificateHashDataType {
            hash_algorithm: HashAlgorithmEnumType::SHA256,
            issuer_name_hash: "x".into(),
            issuer_key_hash: "y".into(),
            serial_number: "serial-42".into(),
        };
        assert_eq!(manager.delete_certificate(&hash).await, DeleteOutcome::Accepted);
        assert_eq!(manager.delete_certificate(&hash).await, DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn garbage_certificates_are_rejected() {
        let manager = InMemoryCertificateManager::new();
        assert_eq!(
            manager
                .install_certificate("not a pem", InstallCertificateUseEnumType::CSMSRootCertificate)
                .await,
            InstallOutcome::Rejected
        );
        assert!(!manager.certificate_signed("junk", None).await);
    }
}
