use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::model::{Reservation, Status};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct MailError(pub String);

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mail error: {}", self.0)
    }
}

impl std::error::Error for MailError {}

/// Mail transport. The dispatcher renders templates and hands finished
/// messages to one of these; failures never reach the write path.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// SMTP relay transport. Builds a fresh transport per message and sends on
/// the blocking pool.
pub struct SmtpMailer {
    server: String,
    port: u16,
    credentials: Option<Credentials>,
    from: String,
}

impl SmtpMailer {
    pub fn new(server: String, port: u16, username: Option<String>, password: Option<String>, from: String) -> Self {
        let credentials = match (username, password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user, pass)),
            _ => None,
        };
        Self { server, port, credentials, from }
    }

    fn build_transport(&self) -> Result<SmtpTransport, MailError> {
        let builder = SmtpTransport::relay(&self.server)
            .map_err(|e| MailError(format!("SMTP relay error: {e}")))?
            .port(self.port);
        let builder = match &self.credentials {
            Some(c) => builder.credentials(c.clone()),
            None => builder,
        };
        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.parse().map_err(|e| MailError(format!("invalid from address: {e}")))?)
            .to(to.parse().map_err(|e| MailError(format!("invalid to address: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| MailError(format!("failed to build message: {e}")))?;

        let transport = self.build_transport()?;
        tokio::task::spawn_blocking(move || {
            transport
                .send(&message)
                .map(|_| ())
                .map_err(|e| MailError(format!("failed to send: {e}")))
        })
        .await
        .map_err(|e| MailError(format!("send task failed: {e}")))?
    }
}

/// Log-only transport for development and tests; the default when SMTP is
/// unconfigured.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), MailError> {
        info!(%to, %subject, "mail (log-only transport)");
        Ok(())
    }
}

/// Work unit for the dispatcher. Carries a snapshot of the already-committed
/// reservation so rendering never races with later updates.
#[derive(Debug, Clone)]
pub enum NotifyTask {
    Created(Reservation),
    Decision(Reservation),
}

/// Handle the engine uses to enqueue notifications. Never blocks: a full or
/// closed channel drops the task with a warning — a lost notification must
/// not fail a committed write.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<NotifyTask>,
}

impl NotifyHandle {
    /// A handle wired to nothing, for tests that don't observe mail.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self { tx }
    }

    pub fn enqueue(&self, task: NotifyTask) {
        if let Err(e) = self.tx.try_send(task) {
            warn!("notification dropped: {e}");
            metrics::counter!(crate::observability::MAIL_DROPPED_TOTAL).increment(1);
        }
    }
}

/// Spawn the background dispatcher and return the handle to feed it.
pub fn spawn_dispatcher(mailer: Arc<dyn Mailer>, public_url: String) -> NotifyHandle {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    tokio::spawn(dispatcher_loop(mailer, public_url, rx));
    NotifyHandle { tx }
}

async fn dispatcher_loop(
    mailer: Arc<dyn Mailer>,
    public_url: String,
    mut rx: mpsc::Receiver<NotifyTask>,
) {
    while let Some(task) = rx.recv().await {
        let (to, subject, html) = match &task {
            NotifyTask::Created(r) => {
                let (subject, html) = template::created(r, &public_url);
                (r.email.clone(), subject, html)
            }
            NotifyTask::Decision(r) => {
                let (subject, html) = template::decision(r, &public_url);
                (r.email.clone(), subject, html)
            }
        };
        match mailer.send(&to, &subject, &html).await {
            Ok(()) => {
                info!(%to, %subject, "notification sent");
                metrics::counter!(crate::observability::MAIL_SENT_TOTAL).increment(1);
            }
            Err(e) => {
                // Best effort only: log and move on, the reservation write
                // already committed.
                error!(%to, "notification failed: {e}");
                metrics::counter!(crate::observability::MAIL_FAILED_TOTAL).increment(1);
            }
        }
    }
}

pub mod template {
    use super::*;

    fn interval_text(r: &Reservation) -> String {
        let start = r.date_start.format("%d/%m/%Y");
        if r.date_end == r.date_start {
            start.to_string()
        } else {
            format!("{} a {}", start, r.date_end.format("%d/%m/%Y"))
        }
    }

    fn details_list(r: &Reservation) -> String {
        let mut items = format!(
            "<ul>\
             <li><strong>ID:</strong> {}</li>\
             <li><strong>Instituição:</strong> {}</li>\
             <li><strong>Data do evento:</strong> {}</li>\
             <li><strong>Período:</strong> {}</li>\
             <li><strong>Finalidade:</strong> {}</li>",
            r.id,
            r.institution,
            interval_text(r),
            r.period,
            r.purpose,
        );
        if let Some(by) = &r.decided_by {
            items.push_str(&format!("<li><strong>Decisão registrada por:</strong> {by}"));
            if let Some(email) = &r.decided_by_email {
                items.push_str(&format!(" ({email})"));
            }
            items.push_str("</li>");
        }
        items.push_str("</ul>");
        items
    }

    fn footer(public_url: &str) -> String {
        format!(
            "<p>Este e-mail é automático. Em caso de dúvidas, entre em contato pelos canais oficiais.</p>\
             <p>Atenciosamente,<br><strong>Sistema de Agendamento do Auditório</strong></p>\
             <p><a href=\"{public_url}\">Acessar a plataforma de agendamento</a></p>"
        )
    }

    /// "We received your request" — sent right after a successful submit.
    pub fn created(r: &Reservation, public_url: &str) -> (String, String) {
        let subject = format!("Recebemos sua solicitação de uso do auditório (#{})", r.id);
        let html = format!(
            "<p>Prezado(a) {},</p>\
             <p>Recebemos sua <strong>solicitação de uso do auditório</strong>.</p>\
             <p><strong>Dados da solicitação:</strong></p>{}\
             <p>Sua solicitação será analisada pela equipe responsável.</p>{}",
            r.responsible,
            details_list(r),
            footer(public_url),
        );
        (subject, html)
    }

    /// Decision notification. Subject and body branch on the resulting
    /// status; the match is exhaustive so an unrecognized status cannot
    /// fall through silently.
    pub fn decision(r: &Reservation, public_url: &str) -> (String, String) {
        let reason_block = match &r.decision_reason {
            Some(reason) => format!("<p><strong>Motivo informado:</strong> {reason}</p>"),
            None => String::new(),
        };
        let (subject, body) = match r.status {
            Status::Aprovada => (
                format!("Sua reserva de auditório foi APROVADA (#{})", r.id),
                "<p>Sua solicitação de uso do auditório foi <strong>APROVADA</strong>.</p>\
                 <p><strong>Orientações gerais:</strong></p>\
                 <ul>\
                 <li>Chegar com antecedência mínima de 30 minutos para teste de som e imagem.</li>\
                 <li>Trazer apresentações em pen drive e, se possível, também em PDF.</li>\
                 <li>Comunicar previamente necessidades específicas de montagem ou equipamento.</li>\
                 <li>Manter o ambiente organizado ao término do evento.</li>\
                 </ul>"
                    .to_string(),
            ),
            Status::Negada => (
                format!("Sua solicitação de auditório foi NEGADA (#{})", r.id),
                format!(
                    "<p>Sua solicitação de uso do auditório foi <strong>NEGADA</strong>.</p>{reason_block}"
                ),
            ),
            Status::Cancelada => (
                format!("Sua reserva de auditório foi CANCELADA (#{})", r.id),
                format!(
                    "<p>Sua <strong>reserva</strong> de uso do auditório foi <strong>CANCELADA</strong>.</p>{reason_block}"
                ),
            ),
            Status::Pendente => (
                format!("Atualização na sua solicitação de auditório (#{})", r.id),
                "<p>Houve uma atualização no status da sua solicitação.</p>".to_string(),
            ),
        };
        let html = format!(
            "<p>Prezado(a) {},</p>{}\
             <p><strong>Dados da solicitação:</strong></p>{}{}",
            r.responsible,
            body,
            details_list(r),
            footer(public_url),
        );
        (subject, html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Period, RequestType};
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex;

    fn reservation(status: Status) -> Reservation {
        Reservation {
            id: 11,
            date_start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            date_end: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            period: Period::Tarde,
            request_type: RequestType::Externa,
            institution: "Defesa Civil".into(),
            responsible: "Ana".into(),
            email: "ana@example.org".into(),
            phone: "27 99999-0000".into(),
            purpose: "Treinamento".into(),
            notes: None,
            attachment_url: None,
            status,
            decided_by: Some("Chefe".into()),
            decided_by_email: Some("chefe@example.org".into()),
            decision_reason: Some("Agenda institucional".into()),
            decided_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), MailError> {
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _to: &str, _subject: &str, _html: &str) -> Result<(), MailError> {
            Err(MailError("relay refused".into()))
        }
    }

    #[test]
    fn created_template_mentions_id_and_interval() {
        let r = reservation(Status::Pendente);
        let (subject, html) = template::created(&r, "http://localhost:3000");
        assert!(subject.contains("#11"));
        assert!(html.contains("01/06/2025 a 03/06/2025"));
        assert!(html.contains("Defesa Civil"));
    }

    #[test]
    fn decision_template_branches_on_status() {
        let approved = reservation(Status::Aprovada);
        let (subject, html) = template::decision(&approved, "http://x");
        assert!(subject.contains("APROVADA"));
        assert!(html.contains("Orientações gerais"));

        let denied = reservation(Status::Negada);
        let (subject, html) = template::decision(&denied, "http://x");
        assert!(subject.contains("NEGADA"));
        assert!(html.contains("Agenda institucional"));

        let cancelled = reservation(Status::Cancelada);
        let (subject, _) = template::decision(&cancelled, "http://x");
        assert!(subject.contains("CANCELADA"));

        let pending = reservation(Status::Pendente);
        let (subject, _) = template::decision(&pending, "http://x");
        assert!(subject.contains("Atualização"));
    }

    #[test]
    fn single_day_interval_renders_once() {
        let mut r = reservation(Status::Pendente);
        r.date_end = r.date_start;
        let (_, html) = template::created(&r, "http://x");
        assert!(html.contains("01/06/2025"));
        assert!(!html.contains(" a 01/06/2025"));
    }

    #[tokio::test]
    async fn dispatcher_sends_to_requester() {
        let mailer = Arc::new(RecordingMailer { sent: Mutex::new(Vec::new()) });
        let handle = spawn_dispatcher(mailer.clone(), "http://x".into());

        handle.enqueue(NotifyTask::Created(reservation(Status::Pendente)));

        // Give the dispatcher a moment to drain.
        for _ in 0..50 {
            if !mailer.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ana@example.org");
        assert!(sent[0].1.contains("#11"));
    }

    #[tokio::test]
    async fn dispatcher_survives_mailer_failure() {
        let handle = spawn_dispatcher(Arc::new(FailingMailer), "http://x".into());
        handle.enqueue(NotifyTask::Decision(reservation(Status::Negada)));
        handle.enqueue(NotifyTask::Created(reservation(Status::Pendente)));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        // Still accepting work after failures.
        handle.enqueue(NotifyTask::Created(reservation(Status::Pendente)));
    }

    #[test]
    fn disconnected_handle_drops_silently() {
        let handle = NotifyHandle::disconnected();
        handle.enqueue(NotifyTask::Created(reservation(Status::Pendente)));
    }
}
