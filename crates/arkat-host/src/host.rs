//! Host runtime: readiness → configuration → frame replay → overlay lifecycle
//!
//! Frames are processed on their own task. Spawn requests and lifecycle
//! signals travel over a single channel to the host task, which is the only
//! place the overlay manager is touched.

use anyhow::Result;
use arkat_core::{
    DirAssetStore, LogNotifier, Notifier, SessionConfigurator, SpawnRequest,
    TrackingUpdateProcessor,
};
use arkat_overlay::OverlayLifecycleManager;
use arkat_session::{CancellationToken, ReadinessWaiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::Config;
use crate::script::ScriptEntry;
use crate::sim::{HeadlessBackend, ScriptedSession, SimulatedReadiness};

/// Signals delivered to the host task
#[derive(Debug, Clone, PartialEq)]
enum HostSignal {
    Spawn(SpawnRequest),
    Background,
    Destroy,
}

/// What happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub configured: bool,
    pub frames: u64,
    pub spawned: usize,
    pub spawn_failures: usize,
    pub backgrounded: usize,
    pub destroyed: bool,
}

/// Run the full pipeline until the script ends, a destroy signal arrives, or
/// `cancel` fires
pub async fn run(
    config: &Config,
    script: Vec<ScriptEntry>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    config.validate()?;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let assets = DirAssetStore::new(&config.assets.path);
    let configurator = SessionConfigurator::new(assets.clone(), config.registry_limits())
        .with_focus_mode(config.tracking.focus_mode);
    let spec = config.target_spec();
    let mut session = ScriptedSession::default();
    let mut summary = RunSummary::default();

    let waiter = ReadinessWaiter::new(config.poll_interval());
    let probe = SimulatedReadiness::new(config.session.ready_after_polls);
    debug!(
        interval_ms = waiter.interval().as_millis() as u64,
        "Waiting for scene readiness"
    );
    let configured = waiter
        .await_then(probe, cancel.clone(), |ready| {
            debug!(polls = ready.polls, "Configuring tracking session");
            configurator.configure_reporting(&mut session, &spec, notifier.as_ref())
        })
        .await
        .flatten();

    let Some(configured) = configured else {
        info!("AR overlay inactive for this session");
        return Ok(summary);
    };
    summary.configured = true;
    if let Some(accepted) = session.config() {
        debug!(
            plane_finding = ?accepted.plane_finding,
            update_mode = ?accepted.update_mode,
            "Session accepted configuration"
        );
    }
    for target in configured.registry().iter() {
        debug!(
            index = %target.index(),
            name = target.name(),
            width_m = target.physical_width_m(),
            "Watching reference target"
        );
    }

    let frame_cancel = cancel.child_token();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let frames = tokio::spawn(replay_frames(
        TrackingUpdateProcessor::for_session(&configured),
        script,
        config.frame_interval(),
        tx,
        frame_cancel.clone(),
    ));

    let mut manager = OverlayLifecycleManager::new(
        HeadlessBackend::new(assets),
        config.overlay.clone(),
        notifier.clone(),
    );
    debug!(
        media = %manager.settings().media,
        looping = manager.settings().looping,
        "Overlay manager ready"
    );

    loop {
        let signal = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutdown requested");
                break;
            }
            signal = rx.recv() => signal,
        };

        match signal {
            Some(HostSignal::Spawn(request)) => match manager.spawn(&request).await {
                Ok(_) => summary.spawned += 1,
                Err(_) => summary.spawn_failures += 1,
            },
            Some(HostSignal::Background) => {
                manager.on_host_background();
                summary.backgrounded += 1;
            }
            Some(HostSignal::Destroy) => break,
            None => {
                debug!("Replay finished");
                break;
            }
        }
    }

    frame_cancel.cancel();
    manager.on_host_destroy();
    summary.destroyed = manager.is_destroyed();
    summary.frames = frames.await?;

    Ok(summary)
}

/// Feed scripted frames through the processor at a fixed rate
async fn replay_frames(
    mut processor: TrackingUpdateProcessor,
    script: Vec<ScriptEntry>,
    interval: Duration,
    tx: mpsc::UnboundedSender<HostSignal>,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);

    for entry in script {
        let signal_sent = match entry {
            ScriptEntry::Frame { events } => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                processor
                    .on_frame(&events)
                    .into_iter()
                    .all(|request| tx.send(HostSignal::Spawn(request)).is_ok())
            }
            ScriptEntry::Background => tx.send(HostSignal::Background).is_ok(),
            ScriptEntry::Destroy => {
                let _ = tx.send(HostSignal::Destroy);
                break;
            }
        };
        if !signal_sent {
            break;
        }
    }

    processor.frames_processed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    fn fixture(dir: &TempDir) -> Config {
        let card = GrayImage::from_fn(320, 320, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Luma([15])
            } else {
                Luma([235])
            }
        });
        card.save(dir.path().join("card.png")).unwrap();
        std::fs::write(dir.path().join("oiia.mp4"), b"video").unwrap();

        let mut config = Config::default();
        config.assets.path = dir.path().display().to_string();
        config.target.image = "card.png".to_string();
        config
    }

    const CARD_SCRIPT: &str = r#"
{"type":"frame","events":[{"index":0,"state":"not_tracking"}]}
{"type":"frame","events":[{"index":0,"state":"last_known_pose"}]}
{"type":"frame","events":[{"index":0,"state":"full_tracking","center_pose":{"translation":[0.0,0.0,-0.4]}}]}
{"type":"frame","events":[{"index":0,"state":"full_tracking","center_pose":{"translation":[0.1,0.0,-0.4]}}]}
{"type":"background"}
{"type":"destroy"}
"#;

    #[tokio::test(start_paused = true)]
    async fn test_card_session_spawns_once() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir);
        let script = parse_script(CARD_SCRIPT).unwrap();

        let summary = run(&config, script, CancellationToken::new()).await.unwrap();

        assert_eq!(
            summary,
            RunSummary {
                configured: true,
                frames: 4,
                spawned: 1,
                spawn_failures: 0,
                backgrounded: 1,
                destroyed: true,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_image_disables_feature() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture(&dir);
        std::fs::write(dir.path().join("card.jpg"), b"not an image").unwrap();
        config.target.image = "card.jpg".to_string();
        let script = parse_script(CARD_SCRIPT).unwrap();

        let summary = run(&config, script, CancellationToken::new()).await.unwrap();

        assert!(!summary.configured);
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.spawned, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_media_counts_failure() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir);
        std::fs::remove_file(dir.path().join("oiia.mp4")).unwrap();
        let script = parse_script(CARD_SCRIPT).unwrap();

        let summary = run(&config, script, CancellationToken::new()).await.unwrap();

        assert!(summary.configured);
        assert_eq!(summary.spawned, 0);
        assert_eq!(summary.spawn_failures, 1);
        assert!(summary.destroyed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_frame_interval_fails_before_configuring() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture(&dir);
        config.replay.frame_interval_ms = 0;
        let script = parse_script(CARD_SCRIPT).unwrap();

        let err = run(&config, script, CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("frame_interval_ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_ready_skips_configuration() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture(&dir);
        config.session.ready_after_polls = u32::MAX;
        let script = parse_script(CARD_SCRIPT).unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            trigger.cancel();
        });

        let summary = run(&config, script, cancel).await.unwrap();

        assert_eq!(summary, RunSummary::default());
    }
}
