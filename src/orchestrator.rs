use log::{error, info, warn};
use reqwest::Method;

use crate::alertmanager::{
    silence_url, silences_url, CreatedSilence, HttpGateway, SilenceMatcher,
};
use crate::config::SilenceAction;
use crate::context::{RenderContext, SilenceWindow};
use crate::error::Result;
use crate::fingerprint::SilenceFingerprint;
use crate::template::TemplateRenderer;

/// Applies one action to every configured Alertmanager, one target at a time.
pub struct Orchestrator {
    gateway: HttpGateway,
    renderer: TemplateRenderer,
    context: RenderContext,
    fingerprint: SilenceFingerprint,
    targets: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        gateway: HttpGateway,
        renderer: TemplateRenderer,
        context: RenderContext,
        fingerprint: SilenceFingerprint,
        targets: Vec<String>,
    ) -> Self {
        Self {
            gateway,
            renderer,
            context,
            fingerprint,
            targets,
        }
    }

    /// A failed create aborts the run; delete problems are logged and skipped.
    pub async fn run(&self, action: SilenceAction) -> Result<()> {
        for target in &self.targets {
            match action {
                SilenceAction::Create { duration_secs } => {
                    self.create(target, duration_secs).await?;
                }
                SilenceAction::Delete => {
                    self.delete(target).await;
                }
            }
        }
        Ok(())
    }

    pub async fn create(&self, target: &str, duration_secs: u64) -> Result<String> {
        let window = SilenceWindow::from_now(duration_secs);
        let context = self.context.with_window(&window);
        let payload = self.renderer.render_payload(&context)?;

        let response = self
            .gateway
            .send(Method::POST, &silences_url(target), Some(payload))
            .await?;
        response.require_json()?;

        let created: CreatedSilence = response.json()?;
        info!("Silence added with ID {}", created.silence_id);
        Ok(created.silence_id)
    }

    /// Returns how many matching silences were deleted on `target`.
    pub async fn delete(&self, target: &str) -> usize {
        let ids = SilenceMatcher::new(&self.gateway, &self.fingerprint)
            .find(target)
            .await;

        if ids.is_empty() {
            warn!("Can't find matching silences on {target}, probably they're already expired?");
            return 0;
        }

        let mut deleted = 0;
        for id in ids {
            info!("Deleting silence with ID {id}");
            match self
                .gateway
                .send(Method::DELETE, &silence_url(target, &id), None)
                .await
            {
                Ok(_) => deleted += 1,
                Err(err) => error!("Deleting silence {id} on {target} failed:\n{err}"),
            }
        }
        deleted
    }
}
