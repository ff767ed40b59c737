/// Turns one host event into its side effects.
///
/// For every event, in order: update the digest (and write it on idle), hand
/// the event to telemetry, play a voice line, show a notification. Each step
/// is settled on its own, so a failure in one never suppresses another, and
/// nothing is ever propagated back to the host.
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::AssetCache;
use crate::catalog::{detail_for, pick, Catalog};
use crate::config::Config;
use crate::digest::{DigestRecorder, DigestState};
use crate::effect::{Effect, EffectRunner};
use crate::event::{DaemonEvent, HostEvent};
use crate::outcome::{settle, Outcome, Step};
use crate::telemetry::{TelemetryForwarder, TelemetryTransport};

pub struct Dispatcher {
    config: Config,
    catalog: Catalog,
    cache: AssetCache,
    runner: Arc<dyn EffectRunner>,
    digest: DigestRecorder,
    telemetry: TelemetryForwarder,
    rng: StdRng,
}

impl Dispatcher {
    pub fn new(
        config: Config,
        catalog: Catalog,
        cache: AssetCache,
        runner: Arc<dyn EffectRunner>,
        transport: Arc<dyn TelemetryTransport>,
        rng: StdRng,
    ) -> Self {
        let digest = DigestRecorder::new(config.digest.clone());
        let telemetry = TelemetryForwarder::new(config.telemetry.clone(), transport);
        Self {
            config,
            catalog,
            cache,
            runner,
            digest,
            telemetry,
            rng,
        }
    }

    /// The profile actually in use after falling back from unknown names.
    pub fn profile(&self) -> &str {
        self.catalog.resolve_profile(Some(self.config.sound.profile.as_str()))
    }

    pub fn digest_state(&self) -> &DigestState {
        self.digest.state()
    }

    /// Handles one event. The returned outcomes are already logged.
    pub fn handle(&mut self, event: &HostEvent) -> Vec<Outcome> {
        let mut outcomes = Vec::new();

        self.digest.record(event);
        if self.digest.flushes_on(event) {
            outcomes.extend(self.digest.flush(&event.event_type, self.runner.as_ref()));
        }
        outcomes.extend(self.telemetry.forward(event));
        outcomes.extend(self.play_sound(event));
        outcomes.extend(self.show_notification(event));
        outcomes
    }

    /// Drains `events` until a shutdown arrives, then runs the exit flush and
    /// returns its reason. Returns `None` if every sender is gone first.
    /// Events still queued behind the shutdown are not handled.
    pub async fn run(&mut self, events: &mut mpsc::Receiver<DaemonEvent>) -> Option<String> {
        while let Some(evt) = events.recv().await {
            match evt {
                DaemonEvent::Host(event) => {
                    self.handle(&event);
                }
                DaemonEvent::DigestRequested(reason) => {
                    self.request_digest(&reason);
                }
                DaemonEvent::Shutdown(reason) => {
                    tracing::info!("Shutting down ({reason})");
                    self.shutdown(&reason);
                    return Some(reason);
                }
            }
        }
        None
    }

    /// Writes a digest on explicit request.
    pub fn request_digest(&mut self, reason: &str) -> Vec<Outcome> {
        self.digest.flush(reason, self.runner.as_ref())
    }

    /// Final flush before exit; later calls are no-ops.
    pub fn shutdown(&mut self, reason: &str) -> Vec<Outcome> {
        self.digest.flush_on_exit(reason, self.runner.as_ref())
    }

    fn play_sound(&mut self, event: &HostEvent) -> Option<Outcome> {
        if !self.config.sound.enabled {
            return None;
        }
        let candidates = self
            .catalog
            .resolve_effects(Some(self.config.sound.profile.as_str()), &event.event_type);
        let file = pick(candidates, &mut self.rng)?;

        // Provisioning may have been partial; a missing line is simply skipped.
        if !self.cache.contains(file) {
            tracing::debug!("{file} not in sound cache, skipping");
            return None;
        }
        let effect = Effect::PlaySound {
            path: self.cache.path_for(file),
        };
        Some(settle(Step::Sound, self.runner.run(&effect)))
    }

    fn show_notification(&mut self, event: &HostEvent) -> Option<Outcome> {
        if !self.config.notifications.enabled {
            return None;
        }
        let templates = self
            .catalog
            .resolve_notices(Some(self.config.sound.profile.as_str()), &event.event_type);
        let template = pick(templates, &mut self.rng)?;
        let (title, body) =
            template.render(&detail_for(event), self.config.notifications.max_length);
        Some(settle(
            Step::Notification,
            self.runner.run(&Effect::Notify { title, body }),
        ))
    }
}
