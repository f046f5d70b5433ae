//! Narrative Player - Headless story player
//!
//! Loads an experience document and plays one story from its beginning (or
//! from a saved session) to its end, logging every element as it plays.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use narrative_player::application::ports::outbound::{
    ExperienceFetchers, SessionState, SessionStorePort,
};
use narrative_player::application::services::{
    ConditionEvaluator, NavigationController, StoryReasonerFactory,
};
use narrative_player::domain::value_objects::{NarrativeElementId, StoryId};
use narrative_player::infrastructure::{
    ChannelObserver, InMemoryExperienceRepository, JsonFileSessionStore, JsonLogicEvaluator,
    ObjectDataResolver, PlayerConfig, PlayerEvent,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "narrative_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Narrative Player");

    // Load configuration
    let config = PlayerConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Experience: {}", config.experience_path.display());
    tracing::info!("  Max steps: {}", config.max_steps);

    let repository = Arc::new(InMemoryExperienceRepository::from_file(&config.experience_path).await?);
    let story_id = match &config.story_id {
        Some(id) => StoryId::from(id.as_str()),
        None => repository
            .first_story_id()
            .cloned()
            .context("Experience contains no stories")?,
    };

    let fetchers = ExperienceFetchers::from_source(repository);
    let evaluator = ConditionEvaluator::new(
        Arc::new(ObjectDataResolver::default()),
        Arc::new(JsonLogicEvaluator::new()),
    );
    let factory = StoryReasonerFactory::new(fetchers.clone(), evaluator.clone());

    // Engine notifications are drained and logged between steps
    let (observer, mut events) = ChannelObserver::channel();

    let mut controller =
        NavigationController::new(factory, fetchers, evaluator, Arc::new(observer))
            .with_max_walk_steps(config.max_steps)
            .with_variable_overrides(config.story_variables.clone());

    if let (true, Some(dir)) = (config.save_session, &config.session_dir) {
        let store = JsonFileSessionStore::open(dir, &story_id).await?;
        if store.session_state().await == SessionState::Existing {
            // Nobody to ask headlessly; always pick up where the last run stopped
            store.set_session_state(SessionState::Resume).await?;
        }
        tracing::info!("  Session: {}", store.path().display());
        controller = controller.with_session_store(Arc::new(store));
    }

    controller.start(story_id.clone(), BTreeMap::new()).await?;
    if let Some(target) = &config.jump_to {
        controller.jump_to(&NarrativeElementId::from(target.as_str())).await?;
    }

    tokio::select! {
        result = play(&mut controller, &mut events, config.max_steps) => {
            tracing::info!(outcome = ?result?, "Playback stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping playback");
        }
    }

    drain_events(&mut events);
    tracing::info!(story_id = %story_id, "Playback finished");

    Ok(())
}

/// Why `play` stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Ended,
    /// A step reported an error instead of moving on
    Stalled,
    StepLimit,
    /// No element was playing
    Idle,
}

/// Step the story until it ends, stalls, or `max_steps` have played
async fn play(
    controller: &mut NavigationController,
    events: &mut mpsc::UnboundedReceiver<PlayerEvent>,
    max_steps: usize,
) -> anyhow::Result<Playback> {
    drain_events(events);
    for _ in 0..max_steps {
        if controller.has_ended() {
            return Ok(Playback::Ended);
        }
        let Some(before) = controller.current_element().map(|e| e.id.clone()) else {
            tracing::warn!("Nothing is playing");
            return Ok(Playback::Idle);
        };

        controller.next().await?;

        // Observer calls are synchronous, so this step's events are all queued
        if drain_events(events) && !controller.has_ended() {
            tracing::warn!(element_id = %before, "Story cannot progress past element");
            return Ok(Playback::Stalled);
        }
    }
    if controller.has_ended() {
        return Ok(Playback::Ended);
    }
    tracing::warn!(max_steps, "Step limit reached before the story ended");
    Ok(Playback::StepLimit)
}

/// Log every queued event; `true` when one of them was an error
fn drain_events(events: &mut mpsc::UnboundedReceiver<PlayerEvent>) -> bool {
    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        failed |= matches!(event, PlayerEvent::Error { .. });
        log_event(&event);
    }
    failed
}

fn log_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::NarrativeElementChanged { element } => {
            tracing::info!(element_id = %element.id, "Now playing: {}", element.name)
        }
        PlayerEvent::StoryEnd => tracing::info!("Story ended"),
        PlayerEvent::Error { kind, message } => tracing::warn!(kind = %kind, "{}", message),
        PlayerEvent::WalkComplete { linear_path } if !linear_path.is_empty() => {
            tracing::info!(elements = linear_path.len(), "Story is linear")
        }
        other => match serde_json::to_string(other) {
            Ok(json) => tracing::debug!("Player event: {}", json),
            Err(e) => tracing::debug!("Unserialisable player event: {}", e),
        },
    }
}
