//! Story Reasoner - The per-story state machine
//!
//! A reasoner walks one story's graph a step at a time. Each step returns the
//! events it produced, in order. When the current element hosts a nested
//! story, the reasoner owns a child reasoner for it and forwards the child's
//! events upward unchanged; the child's own `StoryEnd` is consumed here and
//! the parent carries on from the element that hosted the sub-story.
//!
//! Misuse (stepping before `start`, after the story ended, or while a step is
//! still resolving) fails with a [`ReasonerFault`]. Reasoning problems never
//! fail a call: they come back as [`ReasonerEvent::Error`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::application::ports::outbound::VariableError;
use crate::application::services::{ConditionEvaluator, ReasonerFactory};
use crate::domain::entities::{Link, LinkKind, NarrativeElement, Story};
use crate::domain::events::{ReasonerError, ReasonerErrorKind, ReasonerEvent};
use crate::domain::value_objects::{NarrativeElementId, PathHistory, ReasonerId, StoryId};

/// Programmer misuse of a reasoner
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReasonerFault {
    #[error("Story {0} has already been started")]
    AlreadyStarted(StoryId),
    #[error("Story {0} has not been started")]
    NotStarted(StoryId),
    #[error("Story {0} has already ended")]
    AlreadyEnded(StoryId),
    #[error("Story {0} is still resolving its previous step")]
    Busy(StoryId),
    #[error("Narrative element {0} is not part of this story")]
    UnknownElement(NarrativeElementId),
}

pub struct StoryReasoner {
    id: ReasonerId,
    story: Story,
    elements: HashMap<NarrativeElementId, NarrativeElement>,
    current: Option<NarrativeElementId>,
    started: bool,
    ended: bool,
    resolving: bool,
    sub_reasoner: Option<Box<StoryReasoner>>,
    evaluator: ConditionEvaluator,
    factory: Arc<dyn ReasonerFactory>,
}

impl std::fmt::Debug for StoryReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryReasoner")
            .field("id", &self.id)
            .field("story", &self.story.id)
            .field("current", &self.current)
            .field("started", &self.started)
            .field("ended", &self.ended)
            .field("resolving", &self.resolving)
            .field("sub_reasoner", &self.sub_reasoner)
            .finish()
    }
}

impl StoryReasoner {
    pub fn new(
        story: Story,
        elements: Vec<NarrativeElement>,
        evaluator: ConditionEvaluator,
        factory: Arc<dyn ReasonerFactory>,
    ) -> Self {
        Self {
            id: ReasonerId::new(),
            story,
            elements: elements.into_iter().map(|e| (e.id.clone(), e)).collect(),
            current: None,
            started: false,
            ended: false,
            resolving: false,
            sub_reasoner: None,
            evaluator,
            factory,
        }
    }

    pub fn id(&self) -> ReasonerId {
        self.id
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn story_id(&self) -> &StoryId {
        &self.story.id
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    /// Whether `id` belongs to this level (not to a nested story)
    pub fn contains(&self, id: &NarrativeElementId) -> bool {
        self.elements.contains_key(id)
    }

    pub fn element(&self, id: &NarrativeElementId) -> Option<&NarrativeElement> {
        self.elements.get(id)
    }

    /// Current element of this level; a sub-story host while a child is active
    pub fn current_element(&self) -> Option<&NarrativeElement> {
        self.current.as_ref().and_then(|id| self.elements.get(id))
    }

    pub fn sub_reasoner(&self) -> Option<&StoryReasoner> {
        self.sub_reasoner.as_deref()
    }

    /// The innermost active level
    pub fn deepest(&self) -> &StoryReasoner {
        let mut level = self;
        while let Some(child) = level.sub_reasoner.as_deref() {
            level = child;
        }
        level
    }

    /// The element actually playing, however deeply nested
    pub fn playing_element(&self) -> Option<&NarrativeElement> {
        self.deepest().current_element()
    }

    /// Current element ids from this level down to the innermost one
    pub fn active_chain(&self) -> Vec<NarrativeElementId> {
        let mut chain = Vec::new();
        let mut level = Some(self);
        while let Some(reasoner) = level {
            if let Some(current) = &reasoner.current {
                chain.push(current.clone());
            }
            level = reasoner.sub_reasoner.as_deref();
        }
        chain
    }

    /// Story ids from this level down to the innermost one
    pub fn active_stories(&self) -> Vec<StoryId> {
        let mut stories = vec![self.story.id.clone()];
        let mut level = self.sub_reasoner.as_deref();
        while let Some(reasoner) = level {
            stories.push(reasoner.story.id.clone());
            level = reasoner.sub_reasoner.as_deref();
        }
        stories
    }

    /// The level of the live tree that owns `id`
    pub fn sub_reasoner_containing(&self, id: &NarrativeElementId) -> Option<&StoryReasoner> {
        if self.contains(id) {
            return Some(self);
        }
        self.sub_reasoner.as_deref()?.sub_reasoner_containing(id)
    }

    pub fn sub_reasoner_containing_mut(
        &mut self,
        id: &NarrativeElementId,
    ) -> Option<&mut StoryReasoner> {
        if self.contains(id) {
            return Some(self);
        }
        self.sub_reasoner.as_deref_mut()?.sub_reasoner_containing_mut(id)
    }

    /// Any element of the live tree
    pub fn find_element(&self, id: &NarrativeElementId) -> Option<&NarrativeElement> {
        self.sub_reasoner_containing(id)?.element(id)
    }

    /// Enter the story and choose a beginning
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<Vec<ReasonerEvent>, ReasonerFault> {
        self.start_deferred()?;
        info!(story_id = %self.story.id, "Starting story");

        self.resolving = true;
        let events = self.select_beginning().await;
        self.resolving = false;
        Ok(events)
    }

    /// Mark the story started without choosing a beginning; the caller
    /// chooses one later or forces an element.
    pub fn start_deferred(&mut self) -> Result<(), ReasonerFault> {
        if self.started {
            return Err(ReasonerFault::AlreadyStarted(self.story.id.clone()));
        }
        self.started = true;
        Ok(())
    }

    /// Re-run beginning selection. Re-opens a story that had ended.
    #[instrument(skip(self))]
    pub async fn choose_beginning(&mut self) -> Result<Vec<ReasonerEvent>, ReasonerFault> {
        if !self.started {
            return Err(ReasonerFault::NotStarted(self.story.id.clone()));
        }
        if self.resolving {
            return Err(ReasonerFault::Busy(self.story.id.clone()));
        }

        self.resolving = true;
        self.ended = false;
        self.sub_reasoner = None;
        let events = self.select_beginning().await;
        self.resolving = false;
        Ok(events)
    }

    /// Follow the best link out of the playing element
    #[instrument(skip(self))]
    pub async fn next(&mut self) -> Result<Vec<ReasonerEvent>, ReasonerFault> {
        self.ensure_can_step()?;

        self.resolving = true;
        let events = self.advance().await;
        self.resolving = false;
        Ok(events)
    }

    /// Follow a caller-chosen link out of the playing element
    #[instrument(skip(self, link), fields(link_type = %link.link_type))]
    pub async fn follow_link(&mut self, link: Link) -> Result<Vec<ReasonerEvent>, ReasonerFault> {
        self.ensure_can_step()?;

        self.resolving = true;
        let events = self.follow_at_deepest(link).await;
        self.resolving = false;
        Ok(events)
    }

    /// Force `id` as this level's current element without consulting rules
    /// or producing events. Any active child is dropped and an ended story
    /// is re-opened.
    pub fn set_current_narrative_element(
        &mut self,
        id: &NarrativeElementId,
    ) -> Result<&NarrativeElement, ReasonerFault> {
        if !self.contains(id) {
            return Err(ReasonerFault::UnknownElement(id.clone()));
        }
        self.started = true;
        self.ended = false;
        self.sub_reasoner = None;
        self.current = Some(id.clone());
        self.elements
            .get(id)
            .ok_or_else(|| ReasonerFault::UnknownElement(id.clone()))
    }

    /// Force the tree onto `target`, building sub-story levels as needed.
    ///
    /// Rules are not consulted. Returns the element, or `None` when no story
    /// reachable from this one contains it.
    pub async fn walk_to(&mut self, target: &NarrativeElementId) -> Option<NarrativeElement> {
        let mut visited = HashSet::from([self.story.id.clone()]);
        self.force_walk(target, &mut visited).await
    }

    /// Force the tree through every id of a recorded history, in order
    pub async fn replay_history(
        &mut self,
        history: &PathHistory,
    ) -> Result<NarrativeElement, ReasonerError> {
        let mut last = None;
        for id in history.iter() {
            match self.walk_to(id).await {
                Some(element) => last = Some(element),
                None => {
                    return Err(ReasonerError::new(
                        ReasonerErrorKind::HistoryReplayFailed,
                        format!("element {id} is not reachable from story {}", self.story.id),
                    ))
                }
            }
        }
        last.ok_or_else(|| {
            ReasonerError::new(ReasonerErrorKind::HistoryReplayFailed, "path history is empty")
        })
    }

    /// Ranked links passing from the playing element; mutates nothing
    pub async fn valid_links(&self) -> Vec<Link> {
        match self.playing_element() {
            Some(element) => self.ranked_links(element).await,
            None => Vec::new(),
        }
    }

    /// Ranked links passing from any element of the live tree
    pub async fn valid_links_from(&self, id: &NarrativeElementId) -> Vec<Link> {
        match self.find_element(id) {
            Some(element) => self.ranked_links(element).await,
            None => Vec::new(),
        }
    }

    /// Beginnings of `story` that currently pass, best first
    pub async fn valid_beginnings_for(&self, story: &Story) -> Vec<NarrativeElementId> {
        self.evaluator
            .rank(&story.beginnings)
            .await
            .into_iter()
            .map(|b| b.narrative_element_id.clone())
            .collect()
    }

    /// The beginning `story` would start from now
    pub async fn beginning_for(&self, story: &Story) -> Option<NarrativeElementId> {
        self.valid_beginnings_for(story).await.into_iter().next()
    }

    /// The element to step back to from this level's current element: the
    /// latest earlier history entry belonging to this level, else an element
    /// of this level linking to the current one.
    pub fn find_previous_node_id(&self, history: &PathHistory) -> Option<NarrativeElementId> {
        let current = self.current.as_ref()?;
        let from_history = history
            .iter()
            .rev()
            .skip(1)
            .find(|id| *id != current && self.contains(id))
            .cloned();

        from_history.or_else(|| {
            self.story
                .narrative_element_ids
                .iter()
                .filter_map(|id| self.elements.get(id))
                .find(|element| element.link_targets().any(|t| t == current))
                .map(|element| element.id.clone())
        })
    }

    pub async fn set_variable_value(&self, name: &str, value: Value) -> Result<(), VariableError> {
        self.evaluator.resolver().set(name, value).await
    }

    pub async fn get_variable_value(&self, name: &str) -> Result<Option<Value>, VariableError> {
        self.evaluator.resolver().get(name).await
    }

    fn ensure_can_step(&self) -> Result<(), ReasonerFault> {
        if !self.started {
            return Err(ReasonerFault::NotStarted(self.story.id.clone()));
        }
        if self.ended {
            return Err(ReasonerFault::AlreadyEnded(self.story.id.clone()));
        }
        if self.resolving {
            return Err(ReasonerFault::Busy(self.story.id.clone()));
        }
        Ok(())
    }

    fn fault(&self, kind: ReasonerErrorKind, message: String) -> ReasonerEvent {
        warn!(story_id = %self.story.id, kind = %kind, "{}", message);
        ReasonerEvent::error(kind, message)
    }

    async fn ranked_links(&self, element: &NarrativeElement) -> Vec<Link> {
        self.evaluator
            .rank(&element.links)
            .await
            .into_iter()
            .cloned()
            .collect()
    }

    fn advance(&mut self) -> BoxFuture<'_, Vec<ReasonerEvent>> {
        async move {
            if let Some(child) = self.sub_reasoner.as_deref_mut() {
                let events = child.advance().await;
                return self.absorb(events).await;
            }
            self.progress().await
        }
        .boxed()
    }

    fn follow_at_deepest(&mut self, link: Link) -> BoxFuture<'_, Vec<ReasonerEvent>> {
        async move {
            if let Some(child) = self.sub_reasoner.as_deref_mut() {
                let events = child.follow_at_deepest(link).await;
                return self.absorb(events).await;
            }
            self.follow(link).await
        }
        .boxed()
    }

    /// Evaluate this level's current links and follow the winner
    async fn progress(&mut self) -> Vec<ReasonerEvent> {
        let Some(current) = self.current_element() else {
            return vec![self.fault(
                ReasonerErrorKind::NoValidLinks,
                format!("story {} has no current narrative element", self.story.id),
            )];
        };
        let current_id = current.id.clone();
        let links = current.links.clone();

        let ranked: Vec<Link> = self.evaluator.rank(&links).await.into_iter().cloned().collect();
        let Some(winner) = ranked.first().cloned() else {
            return vec![self.fault(
                ReasonerErrorKind::NoValidLinks,
                format!("no links from narrative element {current_id} passed"),
            )];
        };

        let mut events = Vec::new();
        if ranked.len() > 1 {
            debug!(element_id = %current_id, links = ranked.len(), "Choice of links");
            events.push(ReasonerEvent::ChoiceOfLinks(ranked));
        }
        events.extend(self.follow(winner).await);
        events
    }

    async fn follow(&mut self, link: Link) -> Vec<ReasonerEvent> {
        match link.link_type {
            LinkKind::EndStory => {
                info!(story_id = %self.story.id, "Story ended");
                self.sub_reasoner = None;
                self.ended = true;
                vec![ReasonerEvent::StoryEnd]
            }
            LinkKind::ChooseBeginning => self.select_beginning().await,
            LinkKind::ToElement | LinkKind::ToSubStory => match link.target_narrative_element_id {
                Some(target) => self.enter(target).await,
                None => vec![self.fault(
                    ReasonerErrorKind::LinkTargetNotFound,
                    format!("{} link has no target", link.link_type),
                )],
            },
            LinkKind::Unrecognized(kind) => vec![self.fault(
                ReasonerErrorKind::UnrecognizedLink,
                format!("unrecognised link type {kind}"),
            )],
        }
    }

    async fn select_beginning(&mut self) -> Vec<ReasonerEvent> {
        let (target, passing) = {
            let ranked = self.evaluator.rank(&self.story.beginnings).await;
            match ranked.first() {
                Some(beginning) => (beginning.narrative_element_id.clone(), ranked.len()),
                None => {
                    return vec![self.fault(
                        ReasonerErrorKind::NoValidBeginning,
                        format!("no beginnings of story {} passed", self.story.id),
                    )]
                }
            }
        };

        let mut events = Vec::new();
        if passing > 1 {
            debug!(story_id = %self.story.id, beginnings = passing, "Choice of beginnings");
            events.push(ReasonerEvent::ChoiceOfBeginnings(passing));
        }
        events.extend(self.enter(target).await);
        events
    }

    fn enter(&mut self, target: NarrativeElementId) -> BoxFuture<'_, Vec<ReasonerEvent>> {
        async move {
            let Some(element) = self.elements.get(&target).cloned() else {
                return vec![self.fault(
                    ReasonerErrorKind::LinkTargetNotFound,
                    format!("narrative element {target} is not in story {}", self.story.id),
                )];
            };

            self.sub_reasoner = None;
            self.current = Some(target);
            match element.sub_story_id().cloned() {
                Some(story_id) => self.enter_sub_story(&story_id).await,
                None => {
                    debug!(element_id = %element.id, name = %element.name, "Narrative element changed");
                    vec![ReasonerEvent::NarrativeElementChanged(element)]
                }
            }
        }
        .boxed()
    }

    async fn enter_sub_story(&mut self, story_id: &StoryId) -> Vec<ReasonerEvent> {
        let mut child = match self.factory.build(story_id).await {
            Ok(child) => child,
            Err(e) => {
                return vec![self.fault(
                    ReasonerErrorKind::SubStoryFetchFailed,
                    format!("could not build sub-story {story_id}: {e}"),
                )]
            }
        };

        debug!(story_id = %story_id, "Entering sub-story");
        child.started = true;
        let events = child.select_beginning().await;
        self.sub_reasoner = Some(Box::new(child));
        self.absorb(events).await
    }

    /// Forward a child's events; on its `StoryEnd` drop it and carry on here
    async fn absorb(&mut self, child_events: Vec<ReasonerEvent>) -> Vec<ReasonerEvent> {
        let mut forwarded = Vec::with_capacity(child_events.len());
        let mut child_ended = false;
        for event in child_events {
            match event {
                ReasonerEvent::StoryEnd => child_ended = true,
                other => forwarded.push(other),
            }
        }

        if child_ended {
            debug!(story_id = %self.story.id, "Sub-story ended; resuming parent");
            self.sub_reasoner = None;
            forwarded.extend(self.progress().await);
        }
        forwarded
    }

    fn force_walk<'a>(
        &'a mut self,
        target: &'a NarrativeElementId,
        visited: &'a mut HashSet<StoryId>,
    ) -> BoxFuture<'a, Option<NarrativeElement>> {
        async move {
            self.started = true;
            if let Some(element) = self.elements.get(target).cloned() {
                if element.sub_story_id().is_none() {
                    self.ended = false;
                    self.sub_reasoner = None;
                    self.current = Some(target.clone());
                    return Some(element);
                }
            }

            if let Some(child) = self.sub_reasoner.as_deref_mut() {
                visited.insert(child.story.id.clone());
                if let Some(found) = child.force_walk(target, visited).await {
                    self.ended = false;
                    return Some(found);
                }
            }

            let hosts: Vec<(NarrativeElementId, StoryId)> = self
                .story
                .narrative_element_ids
                .iter()
                .filter_map(|id| self.elements.get(id))
                .filter_map(|e| e.sub_story_id().map(|s| (e.id.clone(), s.clone())))
                .collect();

            for (host_id, story_id) in hosts {
                if !visited.insert(story_id.clone()) {
                    continue;
                }
                let mut child = match self.factory.build(&story_id).await {
                    Ok(child) => child,
                    Err(e) => {
                        debug!(story_id = %story_id, error = %e, "Skipping sub-story during forced walk");
                        continue;
                    }
                };
                if let Some(found) = child.force_walk(target, visited).await {
                    self.ended = false;
                    self.current = Some(host_id);
                    self.sub_reasoner = Some(Box::new(child));
                    return Some(found);
                }
            }
            None
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::test_fixtures::{changed_ids, history, ids, leaf, rig, Rig};
    use crate::domain::entities::{Experience, NarrativeElement};
    use serde_json::json;

    async fn reasoner(rig: &Rig, story: &str) -> StoryReasoner {
        rig.factory.build(&story.into()).await.expect("story should build")
    }

    fn linear() -> Experience {
        Experience::new()
            .with_story(
                Story::new("s", "Linear")
                    .with_beginning("a", true)
                    .with_element("a")
                    .with_element("b"),
            )
            .with_element(leaf("a", vec![Link::to_element("b", true)]))
            .with_element(leaf("b", vec![Link::end_story(true)]))
    }

    #[tokio::test]
    async fn test_start_emits_first_element_then_next_follows_link() {
        let rig = rig(linear(), json!({}));
        let mut reasoner = reasoner(&rig, "s").await;

        let events = reasoner.start().await.expect("start");
        assert_eq!(changed_ids(&events), vec!["a"]);

        let events = reasoner.next().await.expect("next");
        assert_eq!(changed_ids(&events), vec!["b"]);
        assert_eq!(reasoner.current_element().map(|e| e.id.as_str()), Some("b"));
    }

    #[tokio::test]
    async fn test_end_story_then_next_fails() {
        let rig = rig(linear(), json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");
        reasoner.next().await.expect("next");

        let events = reasoner.next().await.expect("next");
        assert_eq!(events, vec![ReasonerEvent::StoryEnd]);
        assert!(reasoner.has_ended());
        assert!(matches!(reasoner.next().await, Err(ReasonerFault::AlreadyEnded(_))));
    }

    #[tokio::test]
    async fn test_state_guards() {
        let rig = rig(linear(), json!({}));
        let mut reasoner = reasoner(&rig, "s").await;

        assert!(matches!(reasoner.next().await, Err(ReasonerFault::NotStarted(_))));
        assert!(matches!(reasoner.choose_beginning().await, Err(ReasonerFault::NotStarted(_))));
        reasoner.start().await.expect("start");
        assert!(matches!(reasoner.start().await, Err(ReasonerFault::AlreadyStarted(_))));
    }

    #[tokio::test]
    async fn test_busy_reasoner_rejects_steps() {
        let rig = rig(linear(), json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");

        // A step whose future was dropped mid-selection leaves the flag set
        reasoner.resolving = true;
        assert!(matches!(reasoner.next().await, Err(ReasonerFault::Busy(_))));
        assert!(matches!(reasoner.choose_beginning().await, Err(ReasonerFault::Busy(_))));
    }

    #[tokio::test]
    async fn test_first_passing_beginning_wins() {
        let experience = Experience::new()
            .with_story(
                Story::new("s", "Beginnings")
                    .with_beginning("a", false)
                    .with_beginning("b", true)
                    .with_beginning("c", true)
                    .with_element("a")
                    .with_element("b")
                    .with_element("c"),
            )
            .with_element(leaf("a", vec![]))
            .with_element(leaf("b", vec![]))
            .with_element(leaf("c", vec![]));
        let rig = rig(experience, json!({}));
        let mut reasoner = reasoner(&rig, "s").await;

        let events = reasoner.start().await.expect("start");
        assert_eq!(events[0], ReasonerEvent::ChoiceOfBeginnings(2));
        assert_eq!(changed_ids(&events), vec!["b"]);
    }

    #[tokio::test]
    async fn test_beginnings_use_variables() {
        let experience = Experience::new()
            .with_story(
                Story::new("s", "Variables")
                    .with_beginning("a", json!({"==": [{"var": "route"}, "left"]}))
                    .with_beginning("b", json!({"==": [{"var": "route"}, "right"]}))
                    .with_element("a")
                    .with_element("b"),
            )
            .with_element(leaf("a", vec![]))
            .with_element(leaf("b", vec![]));
        let rig = rig(experience, json!({"route": "right"}));
        let mut reasoner = reasoner(&rig, "s").await;

        let events = reasoner.start().await.expect("start");
        assert_eq!(changed_ids(&events), vec!["b"]);
    }

    #[tokio::test]
    async fn test_no_valid_beginning_is_an_error_event() {
        let experience = Experience::new()
            .with_story(Story::new("s", "Closed").with_beginning("a", false).with_element("a"))
            .with_element(leaf("a", vec![]));
        let rig = rig(experience, json!({}));
        let mut reasoner = reasoner(&rig, "s").await;

        let events = reasoner.start().await.expect("start");
        assert!(matches!(
            events.as_slice(),
            [ReasonerEvent::Error(e)] if e.kind == ReasonerErrorKind::NoValidBeginning
        ));
        assert!(reasoner.is_started());
    }

    #[tokio::test]
    async fn test_no_valid_links_is_an_error_event() {
        let experience = Experience::new()
            .with_story(Story::new("s", "Stuck").with_beginning("a", true).with_element("a"))
            .with_element(leaf("a", vec![Link::to_element("a", false)]));
        let rig = rig(experience, json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");

        let events = reasoner.next().await.expect("next");
        assert!(matches!(
            events.as_slice(),
            [ReasonerEvent::Error(e)] if e.kind == ReasonerErrorKind::NoValidLinks
        ));
        assert!(!reasoner.has_ended());
    }

    #[tokio::test]
    async fn test_fuzzy_links_prefer_true_then_highest_score() {
        let experience = Experience::new()
            .with_story(
                Story::new("s", "Fuzzy")
                    .with_beginning("a", true)
                    .with_element("a")
                    .with_element("b")
                    .with_element("c")
                    .with_element("d"),
            )
            .with_element(leaf(
                "a",
                vec![
                    Link::to_element("b", json!({"+": [0.2, 0.1]})),
                    Link::to_element("c", json!(0.7)),
                    Link::to_element("d", json!(false)),
                ],
            ))
            .with_element(leaf("b", vec![]))
            .with_element(leaf("c", vec![]))
            .with_element(leaf("d", vec![]));
        let rig = rig(experience, json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");

        let events = reasoner.next().await.expect("next");
        match &events[0] {
            ReasonerEvent::ChoiceOfLinks(links) => assert_eq!(links.len(), 2),
            other => panic!("expected a choice of links, got {other:?}"),
        }
        assert_eq!(changed_ids(&events), vec!["c"]);
    }

    #[tokio::test]
    async fn test_choose_beginning_link_loops_back() {
        let experience = Experience::new()
            .with_story(
                Story::new("s", "Loop")
                    .with_beginning("a", true)
                    .with_element("a")
                    .with_element("b"),
            )
            .with_element(leaf("a", vec![Link::to_element("b", true)]))
            .with_element(leaf("b", vec![Link::choose_beginning(true)]));
        let rig = rig(experience, json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");
        reasoner.next().await.expect("next");

        let events = reasoner.next().await.expect("next");
        assert_eq!(changed_ids(&events), vec!["a"]);
    }

    #[tokio::test]
    async fn test_unrecognised_link_and_missing_target() {
        let experience = Experience::new()
            .with_story(
                Story::new("s", "Broken")
                    .with_beginning("a", true)
                    .with_element("a")
                    .with_element("b"),
            )
            .with_element(leaf(
                "a",
                vec![Link::new(LinkKind::Unrecognized("WOBBLE".into()), true)],
            ))
            .with_element(leaf("b", vec![Link::to_element("nowhere", true)]));
        let rig = rig(experience, json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");

        let events = reasoner.next().await.expect("next");
        assert!(matches!(
            events.as_slice(),
            [ReasonerEvent::Error(e)] if e.kind == ReasonerErrorKind::UnrecognizedLink
        ));

        reasoner.set_current_narrative_element(&"b".into()).expect("b is known");
        let events = reasoner.next().await.expect("next");
        assert!(matches!(
            events.as_slice(),
            [ReasonerEvent::Error(e)] if e.kind == ReasonerErrorKind::LinkTargetNotFound
        ));
    }

    fn nested() -> Experience {
        Experience::new()
            .with_story(
                Story::new("top", "Top")
                    .with_beginning("a", true)
                    .with_element("a")
                    .with_element("host")
                    .with_element("b"),
            )
            .with_story(Story::new("inner", "Inner").with_beginning("x", true).with_element("x"))
            .with_element(leaf("a", vec![Link::to_element("host", true)]))
            .with_element(
                NarrativeElement::sub_story("host", "Host", "inner")
                    .with_link(Link::to_element("b", true)),
            )
            .with_element(leaf("b", vec![Link::end_story(true)]))
            .with_element(leaf("x", vec![Link::end_story(true)]))
    }

    #[tokio::test]
    async fn test_sub_story_is_transparent() {
        let rig = rig(nested(), json!({}));
        let mut reasoner = reasoner(&rig, "top").await;
        reasoner.start().await.expect("start");

        let events = reasoner.next().await.expect("next");
        assert_eq!(events.len(), 1);
        assert_eq!(changed_ids(&events), vec!["x"]);
        assert_eq!(reasoner.active_chain(), ids(&["host", "x"]));
        assert_eq!(
            reasoner.sub_reasoner_containing(&"x".into()).map(|r| r.story_id().as_str()),
            Some("inner")
        );

        // The inner story ends; the parent continues from the host element
        let events = reasoner.next().await.expect("next");
        assert_eq!(events.len(), 1);
        assert_eq!(changed_ids(&events), vec!["b"]);
        assert!(reasoner.sub_reasoner().is_none());
        assert!(!reasoner.has_ended());
    }

    #[tokio::test]
    async fn test_missing_sub_story_is_an_error_event() {
        let experience = Experience::new()
            .with_story(Story::new("top", "Top").with_beginning("host", true).with_element("host"))
            .with_element(NarrativeElement::sub_story("host", "Host", "missing"));
        let rig = rig(experience, json!({}));
        let mut reasoner = reasoner(&rig, "top").await;

        let events = reasoner.start().await.expect("start");
        assert!(matches!(
            events.as_slice(),
            [ReasonerEvent::Error(e)] if e.kind == ReasonerErrorKind::SubStoryFetchFailed
        ));
    }

    #[tokio::test]
    async fn test_valid_links_do_not_move_the_reasoner() {
        let rig = rig(linear(), json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");

        let links = reasoner.valid_links().await;
        assert_eq!(links.len(), 1);
        assert_eq!(reasoner.valid_links_from(&"b".into()).await[0].link_type, LinkKind::EndStory);
        assert_eq!(reasoner.current_element().map(|e| e.id.as_str()), Some("a"));
    }

    #[tokio::test]
    async fn test_walk_to_enters_sub_stories() {
        let rig = rig(nested(), json!({}));
        let mut reasoner = reasoner(&rig, "top").await;
        reasoner.start_deferred().expect("fresh reasoner");

        let found = reasoner.walk_to(&"x".into()).await.map(|e| e.id);
        assert_eq!(found, Some("x".into()));
        assert_eq!(reasoner.active_chain(), ids(&["host", "x"]));
        assert!(reasoner.walk_to(&"nowhere".into()).await.is_none());

        let events = reasoner.next().await.expect("next");
        assert_eq!(changed_ids(&events), vec!["b"]);
    }

    #[tokio::test]
    async fn test_replay_history_lands_on_last_entry() {
        let rig = rig(nested(), json!({}));
        let mut reasoner = reasoner(&rig, "top").await;
        reasoner.start_deferred().expect("fresh reasoner");

        let element = reasoner
            .replay_history(&history(&["a", "x", "b"])).await.expect("replay");
        assert_eq!(element.id.as_str(), "b");

        let err = reasoner
            .replay_history(&history(&["a", "ghost"])).await.expect_err("ghost is unknown");
        assert_eq!(err.kind, ReasonerErrorKind::HistoryReplayFailed);
    }

    #[tokio::test]
    async fn test_find_previous_node_id() {
        let rig = rig(linear(), json!({}));
        let mut reasoner = reasoner(&rig, "s").await;
        reasoner.start().await.expect("start");
        reasoner.next().await.expect("next");

        let visited = history(&["a", "b"]);
        assert_eq!(reasoner.find_previous_node_id(&visited), Some("a".into()));
        assert_eq!(reasoner.find_previous_node_id(&PathHistory::new()), Some("a".into()));
    }

    #[tokio::test]
    async fn test_follow_link_at_deepest_level() {
        let rig = rig(nested(), json!({}));
        let mut reasoner = reasoner(&rig, "top").await;
        reasoner.start().await.expect("start");
        reasoner.next().await.expect("next");

        let events = reasoner.follow_link(Link::end_story(true)).await.expect("follow");
        assert_eq!(changed_ids(&events), vec!["b"]);
    }

    #[tokio::test]
    async fn test_variables_pass_through() {
        let rig = rig(linear(), json!({}));
        let reasoner = reasoner(&rig, "s").await;
        reasoner.set_variable_value("player.name", json!("Ada")).await.expect("set");
        assert_eq!(
            reasoner.get_variable_value("player.name").await.expect("get"),
            Some(json!("Ada"))
        );
    }
}
