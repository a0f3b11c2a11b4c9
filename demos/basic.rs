use std::sync::Arc;

use heromedia::capability::Viewport;
use heromedia::{
    EngineConfig, MediaError, MediaEvent, PlaybackSession, SessionDirective, SignalSet, SourceCatalog,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("heromedia=debug")))
        .init();

    // A desktop browser on a fast link that cannot decode the top asset.
    let signals = SignalSet {
        viewport: Some(Viewport {
            width: 1920,
            height: 1080,
        }),
        effective_type: Some("4g".into()),
        device_memory_gb: Some(8.0),
        webm_playable: Some(true),
        ..SignalSet::default()
    };

    let (mut session, mut directives) = PlaybackSession::new(
        Arc::new(signals),
        SourceCatalog::landing_default(),
        EngineConfig::standard(),
    )?;
    session.start()?;

    let mut failures_left = 2;
    while let Some(directive) = directives.recv().await {
        match directive {
            SessionDirective::Load { source, preload } => {
                println!("load {} ({}, preload={})", source.uri, source.mime_type, preload.as_str());
                session.on_media_event(MediaEvent::LoadStart)?;
                if failures_left > 0 {
                    failures_left -= 1;
                    session.on_media_event(MediaEvent::Error(MediaError::from_element(
                        4,
                        "MEDIA_ERR_SRC_NOT_SUPPORTED",
                    )))?;
                } else {
                    session.on_media_event(MediaEvent::CanPlay)?;
                    break;
                }
            }
            SessionDirective::ShowStaticFallback => {
                println!("static fallback");
                break;
            }
            SessionDirective::DisableVideo => {
                println!("video disabled");
                break;
            }
        }
    }

    println!(
        "phase={:?} tier={} failures={:?}",
        session.phase(),
        session.recovery_state().current_tier.as_str(),
        session.history().summary()
    );
    session.close();
    Ok(())
}
