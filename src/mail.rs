use async_trait::async_trait;
use tracing::info;

/// Outbound email seam. The flows only need templated dispatch; the concrete
/// transport lives behind this trait so a send failure is an ordinary error
/// the caller can compensate for, never a crash.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_templated(
        &self,
        to: &str,
        template: &str,
        subject: &str,
        vars: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Development transport: writes the message to the log instead of sending.
pub struct LogMailer {
    pub from: String,
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_templated(
        &self,
        to: &str,
        template: &str,
        subject: &str,
        vars: serde_json::Value,
    ) -> anyhow::Result<()> {
        info!(from = %self.from, %to, template, subject, vars = %vars, "email dispatched");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Mailer that always fails, for exercising the clear-on-failure paths.
    pub struct FailMailer;

    #[async_trait]
    impl Mailer for FailMailer {
        async fn send_templated(
            &self,
            _to: &str,
            _template: &str,
            _subject: &str,
            _vars: serde_json::Value,
        ) -> anyhow::Result<()> {
            anyhow::bail!("smtp transport unavailable")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer {
            from: "warden <no-reply@warden.dev>".into(),
        };
        let result = mailer
            .send_templated(
                "a@b.com",
                "welcome",
                "Welcome!",
                serde_json::json!({ "firstName": "A" }),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn fail_mailer_surfaces_a_catchable_error() {
        let result = testing::FailMailer
            .send_templated("a@b.com", "password_reset", "Reset", serde_json::json!({}))
            .await;
        assert!(result.is_err());
    }
}
