use anyhow::Context;
use derivative::Derivative;
use std::sync::OnceLock;

/// Address that alert notifications are sent from, unless configured otherwise.
pub const DEFAULT_FROM_ADDRESS: &str = "SafeSpace Alerts <alerts@safespace-app.com>";

/// An email which is ready to be handed to a delivery gateway.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<String>>,
    pub subject: String,
    pub html_body: String,
}

/// Acknowledgement of an email accepted by the delivery gateway.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SentEmail {
    pub id: String,
}

/// The delivery gateway boundary. Implementations own any provider specifics,
/// and report failures as errors whose message is recorded verbatim.
pub trait EmailSender: std::fmt::Debug + Send + Sync + 'static {
    /// Whether delivery credentials are configured at all.
    fn is_configured(&self) -> bool;

    fn send<'s>(
        &'s self,
        email: OutgoingEmail,
    ) -> impl std::future::Future<Output = anyhow::Result<SentEmail>> + Send + 's;

    /// A lightweight call which succeeds only if the gateway is reachable and
    /// accepts our credentials.
    fn probe<'s>(&'s self) -> impl std::future::Future<Output = anyhow::Result<()>> + Send + 's;
}

/// Sends emails using resend. The resend client is created on first use and
/// then shared by every subsequent call.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ResendSender {
    #[derivative(Debug = "ignore")]
    api_key: String,
    from_address: String,
    reply_to_address: Option<String>,
    #[derivative(Debug = "ignore")]
    http_client: reqwest::Client,
    #[derivative(Debug = "ignore")]
    resend_client: OnceLock<resend_rs::Resend>,
}

impl ResendSender {
    fn client(&self) -> &resend_rs::Resend {
        self.resend_client.get_or_init(|| {
            tracing::debug!("initializing resend client");
            resend_rs::Resend::with_client(&self.api_key, self.http_client.clone())
        })
    }

    async fn send(&self, email: OutgoingEmail) -> anyhow::Result<SentEmail> {
        let OutgoingEmail {
            to,
            cc,
            subject,
            html_body,
        } = email;

        let Self {
            from_address,
            reply_to_address,
            ..
        } = self;

        let mut resend_req = resend_rs::types::CreateEmailBaseOptions::new(
            from_address.as_str(),
            to.iter().map(String::as_str),
            subject.as_str(),
        )
        .with_html(html_body.as_str());

        for address in cc.iter().flatten() {
            resend_req = resend_req.with_cc(address.as_str());
        }
        if let Some(reply_to) = reply_to_address {
            resend_req = resend_req.with_reply(reply_to.as_str());
        }

        // Failures are not retried here: each dispatch makes exactly one
        // delivery attempt, and callers re-dispatch if they want another.
        // The provider's message is returned as-is, since it's what gets recorded.
        let response = match self.client().emails.send(resend_req).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(to = ?to, error = ?err, "calling resend API failed");
                return Err(anyhow::anyhow!("{err}"));
            }
        };

        tracing::debug!(to = ?to, email_id = %response.id, "successfully sent alert email");

        Ok(SentEmail {
            id: response.id.to_string(),
        })
    }

    async fn probe(&self) -> anyhow::Result<()> {
        self.client()
            .domains
            .list()
            .await
            .context("listing resend domains")?;

        tracing::debug!("resend probe succeeded");
        Ok(())
    }
}

#[derive(Debug)]
pub enum Sender {
    /// No delivery credentials are configured.
    Disabled,
    Resend(ResendSender),
}

impl Sender {
    pub fn resend(
        api_key: &str,
        from_address: String,
        reply_to_address: Option<String>,
        http_client: reqwest::Client,
    ) -> Sender {
        Sender::Resend(ResendSender {
            api_key: api_key.to_string(),
            from_address,
            reply_to_address,
            http_client,
            resend_client: OnceLock::new(),
        })
    }

    /// Returns a resend sender if `api_key` is present and non-empty, and a
    /// disabled sender otherwise.
    pub fn from_api_key(
        api_key: Option<&str>,
        from_address: String,
        reply_to_address: Option<String>,
        http_client: reqwest::Client,
    ) -> Sender {
        match api_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(api_key) => Sender::resend(api_key, from_address, reply_to_address, http_client),
            None => Sender::Disabled,
        }
    }
}

impl EmailSender for Sender {
    fn is_configured(&self) -> bool {
        matches!(self, Sender::Resend(_))
    }

    async fn send<'s>(&'s self, email: OutgoingEmail) -> anyhow::Result<SentEmail> {
        match self {
            Sender::Disabled => {
                tracing::warn!(
                    to = ?email.to,
                    subject = %email.subject,
                    "skipping sending alert email (disabled)"
                );
                anyhow::bail!("email delivery is not configured");
            }
            Sender::Resend(resend) => resend.send(email).await,
        }
    }

    async fn probe<'s>(&'s self) -> anyhow::Result<()> {
        match self {
            Sender::Disabled => anyhow::bail!("email delivery is not configured"),
            Sender::Resend(resend) => resend.probe().await,
        }
    }
}
