use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;

use resident_registry::audit::MemoryAuditTrail;
use resident_registry::auth::{
    CredentialBootstrap, MemoryAccountDirectory, ResidentAccount, ResidentId, SessionStore,
};
use resident_registry::config::AppConfig;
use resident_registry::error::AppError;
use resident_registry::requests::{
    DocumentIssuer, DocumentNumber, DocumentRequest, IssuerError, MemoryDocumentArchive,
    MemoryRequestStore, RequestWorkflowEngine, StoredFile,
};
use resident_registry::verify::{MemoryTokenStore, VerificationGateway};

pub(crate) type Engine =
    RequestWorkflowEngine<MemoryRequestStore, MemoryDocumentArchive, MemoryAuditTrail>;
pub(crate) type Bootstrap = CredentialBootstrap<MemoryAccountDirectory, MemoryAuditTrail>;
pub(crate) type Gateway = VerificationGateway<
    MemoryTokenStore,
    MemoryAccountDirectory,
    MemoryDocumentArchive,
    MemoryAuditTrail,
>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Composition root over the in-memory reference stores. Durable storage is
/// an external collaborator; swapping it in means replacing these stores.
pub(crate) struct Registry {
    pub(crate) directory: Arc<MemoryAccountDirectory>,
    pub(crate) sessions: Arc<SessionStore>,
    pub(crate) trail: Arc<MemoryAuditTrail>,
    pub(crate) engine: Arc<Engine>,
    pub(crate) bootstrap: Arc<Bootstrap>,
    pub(crate) gateway: Arc<Gateway>,
}

pub(crate) fn build_registry(config: &AppConfig) -> Result<Registry, AppError> {
    let issuer = Arc::new(FileSystemIssuer::new(config.issuance.spool_dir.clone())?);
    build_registry_with_issuer(config, issuer)
}

pub(crate) fn build_registry_with_issuer(
    config: &AppConfig,
    issuer: Arc<dyn DocumentIssuer>,
) -> Result<Registry, AppError> {
    let directory = Arc::new(MemoryAccountDirectory::default());
    let sessions = Arc::new(SessionStore::default());
    let trail = Arc::new(MemoryAuditTrail::default());
    let requests = Arc::new(MemoryRequestStore::default());
    let archive = Arc::new(MemoryDocumentArchive::default());
    let tokens = Arc::new(MemoryTokenStore::default());

    let engine = Arc::new(RequestWorkflowEngine::new(
        requests,
        archive.clone(),
        trail.clone(),
        issuer,
        sessions.clone(),
    ));
    let bootstrap = Arc::new(CredentialBootstrap::new(
        directory.clone(),
        sessions.clone(),
        trail.clone(),
    ));
    let gateway = Arc::new(VerificationGateway::new(
        tokens,
        directory.clone(),
        archive,
        trail.clone(),
        sessions.clone(),
        config.verification.lookup_limit,
        config.verification.lookup_window,
    ));

    Ok(Registry {
        directory,
        sessions,
        trail,
        engine,
        bootstrap,
        gateway,
    })
}

/// Sample resident records, matching what staff-side intake would create.
pub(crate) fn seed_demo_accounts(directory: &MemoryAccountDirectory) -> ResidentId {
    let maria = ResidentAccount {
        resident_id: ResidentId("res-0001".to_string()),
        contact: "09171234567".to_string(),
        full_name: "Maria Santos".to_string(),
        address: "12 Mabini St, Poblacion".to_string(),
        birthdate: NaiveDate::from_ymd_opt(1990, 5, 1).expect("valid seed date"),
        password_hash: None,
        has_password: false,
        active: true,
    };
    let jose = ResidentAccount {
        resident_id: ResidentId("res-0002".to_string()),
        contact: "09182223333".to_string(),
        full_name: "Jose Ramirez".to_string(),
        address: "45 Rizal Ave, Poblacion".to_string(),
        birthdate: NaiveDate::from_ymd_opt(1987, 11, 23).expect("valid seed date"),
        password_hash: None,
        has_password: false,
        active: true,
    };

    let maria_id = maria.resident_id.clone();
    directory.seed(maria);
    directory.seed(jose);
    maria_id
}

/// Stand-in for the external rendering service: writes a minimal PDF into
/// the spool directory and reports its path.
pub(crate) struct FileSystemIssuer {
    spool_dir: PathBuf,
}

impl FileSystemIssuer {
    pub(crate) fn new(spool_dir: PathBuf) -> Result<Self, AppError> {
        fs::create_dir_all(&spool_dir)?;
        Ok(Self { spool_dir })
    }
}

impl DocumentIssuer for FileSystemIssuer {
    fn issue(
        &self,
        request: &DocumentRequest,
        number: &DocumentNumber,
    ) -> Result<StoredFile, IssuerError> {
        let path = self.spool_dir.join(format!("{}.pdf", number.0));
        let body = minimal_pdf(&format!(
            "{} | {} | resident {}",
            number.0,
            request.kind.label(),
            request.resident.0
        ));
        fs::write(&path, body).map_err(|err| IssuerError::Storage(err.to_string()))?;
        Ok(StoredFile {
            location: path.to_string_lossy().into_owned(),
        })
    }
}

/// Single-page PDF with one line of text; enough for scanners and viewers.
fn minimal_pdf(text: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text.replace(['(', ')'], "-"));
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::new();
    for (index, object) in objects.drain(..).enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", index + 1, object));
    }
    let xref_offset = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1));
    for offset in &offsets {
        out.push_str(&format!("{offset:010} 00000 n \n"));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        offsets.len() + 1,
        xref_offset
    ));
    out.into_bytes()
}
