//! Navigation Controller - Drives a primary reasoner for a presentation layer
//!
//! The controller owns the primary reasoner, keeps the path history, and
//! handles everything that is not a plain step: resuming a session, jumping
//! to arbitrary elements, stepping back, and looking ahead at what can play
//! next. Jumps to elements outside the live reasoner tree use a private
//! shadow reasoner that only replaces the primary once it has reached its
//! target; a failed jump leaves the primary untouched.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::application::ports::outbound::{
    ExperienceFetchers, FetchError, NarrativeObserver, SessionError, SessionState,
    SessionStorePort, VariableError,
};
use crate::application::services::{
    ConditionEvaluator, InternalVariables, ReasonerFactory, ReasonerFault,
    RepresentationSelector, StoryPath, StoryPathWalker, StoryReasoner,
};
use crate::domain::entities::{NarrativeElement, Representation, Story, VariableDeclaration};
use crate::domain::events::{ReasonerError, ReasonerErrorKind, ReasonerEvent};
use crate::domain::value_objects::{internal, NarrativeElementId, PathHistory, StoryId};

/// Default bound on shadow and linearity walks
pub const DEFAULT_MAX_WALK_STEPS: usize = 500;

/// Nesting limit when resolving a sub-story host to a playable element
const MAX_NESTING: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("No story is playing")]
    NoReasoner,
    #[error(transparent)]
    Fault(#[from] ReasonerFault),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Variable(#[from] VariableError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A playable element reachable from the current one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextStep {
    /// The element the link points at; a sub-story host for nested targets
    pub target_id: NarrativeElementId,
    /// The element that would actually play
    pub element: NarrativeElement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub current: Option<NarrativeElement>,
    pub next: Option<NarrativeElement>,
}

/// A declared variable together with its current value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableStatus {
    pub declaration: VariableDeclaration,
    pub value: Option<Value>,
}

pub struct NavigationController {
    factory: Arc<dyn ReasonerFactory>,
    fetchers: ExperienceFetchers,
    evaluator: ConditionEvaluator,
    selector: RepresentationSelector,
    session: Option<Arc<dyn SessionStorePort>>,
    observer: Arc<dyn NarrativeObserver>,
    overrides: Vec<(String, String)>,
    max_walk_steps: usize,
    story_id: Option<StoryId>,
    reasoner: Option<StoryReasoner>,
    current: Option<NarrativeElement>,
    linear_path: StoryPath,
}

impl NavigationController {
    pub fn new(
        factory: Arc<dyn ReasonerFactory>,
        fetchers: ExperienceFetchers,
        evaluator: ConditionEvaluator,
        observer: Arc<dyn NarrativeObserver>,
    ) -> Self {
        let selector = RepresentationSelector::new(fetchers.clone(), evaluator.clone());
        Self {
            factory,
            fetchers,
            evaluator,
            selector,
            session: None,
            observer,
            overrides: Vec::new(),
            max_walk_steps: DEFAULT_MAX_WALK_STEPS,
            story_id: None,
            reasoner: None,
            current: None,
            linear_path: StoryPath::NonLinear,
        }
    }

    /// Persist variables and path history in `store`
    pub fn with_session_store(mut self, store: Arc<dyn SessionStorePort>) -> Self {
        self.session = Some(store);
        self
    }

    /// Externally supplied `name`/`value` pairs applied at every start
    pub fn with_variable_overrides(mut self, overrides: Vec<(String, String)>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_max_walk_steps(mut self, max_walk_steps: usize) -> Self {
        self.max_walk_steps = max_walk_steps;
        self
    }

    pub fn story_id(&self) -> Option<&StoryId> {
        self.story_id.as_ref()
    }

    pub fn reasoner(&self) -> Option<&StoryReasoner> {
        self.reasoner.as_ref()
    }

    pub fn current_element(&self) -> Option<&NarrativeElement> {
        self.current.as_ref()
    }

    /// Path of the story when it is linear
    pub fn linear_path(&self) -> &StoryPath {
        &self.linear_path
    }

    /// Whether the primary reasoner has reached the end of the story
    pub fn has_ended(&self) -> bool {
        self.reasoner.as_ref().map_or(false, StoryReasoner::has_ended)
    }

    // ---------------------------------------------------------------------
    // Session lifecycle
    // ---------------------------------------------------------------------

    /// Start playing `story_id`.
    ///
    /// A resumed or existing session starts from `initial_state` when given,
    /// else from the stored session. A new or restarted one starts from
    /// `initial_state` when given, else from the declared defaults.
    #[instrument(skip(self, initial_state))]
    pub async fn start(
        &mut self,
        story_id: StoryId,
        initial_state: BTreeMap<String, Value>,
    ) -> Result<(), ControllerError> {
        self.reset();
        self.story_id = Some(story_id.clone());
        let session_state = self.session_state().await;
        info!(story_id = %story_id, session_state = ?session_state, "Starting story");

        let variables = match session_state {
            SessionState::Resume | SessionState::Existing => {
                match (&self.session, initial_state.is_empty()) {
                    (Some(store), true) => store.fetch_state().await?,
                    _ => initial_state,
                }
            }
            SessionState::New | SessionState::Restart => {
                if initial_state.is_empty() {
                    let mut defaults = self.default_variable_state().await?;
                    defaults.insert(internal::PATH_HISTORY.to_string(), Value::Array(Vec::new()));
                    if let Some(store) = &self.session {
                        store.set_default_state(&defaults).await?;
                    }
                    defaults
                } else {
                    initial_state
                }
            }
        };
        self.set_variables(variables).await?;
        self.prepare_internal_variables(&story_id).await?;
        self.test_for_linearity(&story_id).await;

        let mut reasoner = self.factory.build(&story_id).await?;
        reasoner.start_deferred()?;
        self.reasoner = Some(reasoner);

        match (self.session.is_some(), session_state) {
            (true, SessionState::Resume) => self.resume_session().await,
            (true, SessionState::Existing) => {
                info!(story_id = %story_id, "Existing session found; waiting for resume or restart");
                Ok(())
            }
            _ => self.choose_beginning().await,
        }
    }

    /// Start the story from its best beginning
    pub async fn choose_beginning(&mut self) -> Result<(), ControllerError> {
        let reasoner = self.reasoner.as_mut().ok_or(ControllerError::NoReasoner)?;
        let events = reasoner.choose_beginning().await?;
        self.handle_events(events).await;
        Ok(())
    }

    /// Continue from the stored path history: jump when the last visited
    /// element is in the top-level story, otherwise replay the history.
    #[instrument(skip(self))]
    pub async fn resume_session(&mut self) -> Result<(), ControllerError> {
        let history = match &self.session {
            Some(store) => store.fetch_path_history().await?,
            None => None,
        };
        let Some(history) = history.filter(|h| !h.is_empty()) else {
            return self.choose_beginning().await;
        };
        let Some(last) = history.last().cloned() else {
            return self.choose_beginning().await;
        };

        let in_top_level = self
            .reasoner
            .as_ref()
            .map_or(false, |reasoner| reasoner.contains(&last));
        if in_top_level {
            self.jump_to(&last).await.map(|_| ())
        } else {
            self.replay_history(&history).await.map(|_| ())
        }
    }

    pub async fn session_state(&self) -> SessionState {
        match &self.session {
            Some(store) => store.session_state().await,
            None => SessionState::New,
        }
    }

    pub async fn set_session_state(&self, state: SessionState) -> Result<(), ControllerError> {
        if let Some(store) = &self.session {
            store.set_session_state(state).await?;
        }
        Ok(())
    }

    /// Forget the stored session and start afresh next time
    pub async fn delete_existing_session(&self) -> Result<(), ControllerError> {
        if let Some(store) = &self.session {
            store.clear().await?;
            store.set_session_state(SessionState::New).await?;
        }
        Ok(())
    }

    /// Drop the primary reasoner and everything known about the story
    pub fn reset(&mut self) {
        self.story_id = None;
        self.reasoner = None;
        self.current = None;
        self.linear_path = StoryPath::NonLinear;
    }

    // ---------------------------------------------------------------------
    // Stepping
    // ---------------------------------------------------------------------

    /// Follow the best link out of the playing element
    pub async fn next(&mut self) -> Result<(), ControllerError> {
        let reasoner = self.reasoner.as_mut().ok_or(ControllerError::NoReasoner)?;
        let events = reasoner.next().await?;
        self.handle_events(events).await;
        Ok(())
    }

    /// Move on from the playing element, e.g. after its content failed
    pub async fn force_reasoner_on(&mut self) -> Result<(), ControllerError> {
        self.next().await
    }

    /// Follow the current element's link to `target`.
    /// Returns `false` when the current element has no such link.
    pub async fn follow_link(&mut self, target: &NarrativeElementId) -> Result<bool, ControllerError> {
        let link = self.current.as_ref().and_then(|current| {
            current
                .links
                .iter()
                .find(|link| link.target_narrative_element_id.as_ref() == Some(target))
                .cloned()
        });
        let Some(link) = link else {
            debug!(target_id = %target, "No link from the current element to target");
            return Ok(false);
        };

        let reasoner = self.reasoner.as_mut().ok_or(ControllerError::NoReasoner)?;
        let events = reasoner.follow_link(link).await?;
        self.handle_events(events).await;
        Ok(true)
    }

    /// Show the current element again
    pub async fn repeat_step(&mut self) -> Result<(), ControllerError> {
        match (&self.reasoner, self.current.clone()) {
            (Some(_), Some(current)) => {
                self.handle_element_change(current, false).await;
                Ok(())
            }
            _ => {
                error!("Cannot resolve the current element to repeat");
                Err(ControllerError::NoReasoner)
            }
        }
    }

    /// Step back to the element played before the current one. With a
    /// single history entry this repeats the current element instead.
    #[instrument(skip(self))]
    pub async fn go_back_one_step(&mut self) -> Result<(), ControllerError> {
        let previous = self.previous_element_id().await?;
        let mut history = self.path_history().await?;
        if history.len() <= 1 {
            return self.repeat_step().await;
        }

        // Both are re-added when the jump lands
        history.pop();
        history.pop();
        self.evaluator
            .resolver()
            .set(internal::PATH_HISTORY, history.to_value())
            .await?;
        if let Some(store) = &self.session {
            store.set_variable(internal::PATH_HISTORY, history.to_value()).await?;
        }

        match previous {
            Some(id) => self.jump_to(&id).await.map(|_| ()),
            None => {
                error!("Cannot resolve the previous element to go back to");
                Ok(())
            }
        }
    }

    /// Id of the element before the current one: from the linear path when
    /// the story is linear, else from the level owning the current element,
    /// else from the path history.
    pub async fn previous_element_id(&self) -> Result<Option<NarrativeElementId>, ControllerError> {
        let Some(current) = self.current.as_ref().map(|c| c.id.clone()) else {
            return Ok(None);
        };
        let history = self.path_history().await?;

        let matching = if self.linear_path.is_linear() {
            self.linear_path.previous_of(&current).cloned()
        } else {
            self.reasoner
                .as_ref()
                .and_then(|reasoner| reasoner.sub_reasoner_containing(&current))
                .and_then(|level| level.find_previous_node_id(&history))
        };
        if matching.is_some() {
            return Ok(matching);
        }

        match history.previous() {
            Some(id) => match self.fetchers.narrative_elements.fetch_narrative_element(id).await {
                Ok(element) => Ok(Some(element.id)),
                Err(e) => {
                    debug!(element_id = %id, error = %e, "Previous history entry no longer exists");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Jumping
    // ---------------------------------------------------------------------

    /// Go to any element of the story.
    ///
    /// An element of the live reasoner tree is forced directly. Anything else
    /// is found by a shadow walk from the top-level story. Returns `false`
    /// when the walk failed; the primary reasoner is then unchanged and the
    /// failure has been reported to the observer.
    #[instrument(skip(self))]
    pub async fn jump_to(&mut self, target: &NarrativeElementId) -> Result<bool, ControllerError> {
        let target = match self.resolve_playable(target).await? {
            Some(element) => element.id,
            None => {
                self.report(ReasonerError::new(
                    ReasonerErrorKind::ShadowWalkExhausted,
                    format!("element {target} has no playable beginning"),
                ));
                return Ok(false);
            }
        };

        let reasoner = self.reasoner.as_mut().ok_or(ControllerError::NoReasoner)?;
        if let Some(level) = reasoner.sub_reasoner_containing_mut(&target) {
            let element = level.set_current_narrative_element(&target)?.clone();
            debug!(element_id = %target, "Jumped within the live reasoner tree");
            self.handle_element_change(element, false).await;
            return Ok(true);
        }
        self.jump_using_shadow_reasoner(&target).await
    }

    async fn jump_using_shadow_reasoner(
        &mut self,
        target: &NarrativeElementId,
    ) -> Result<bool, ControllerError> {
        let story_id = self.story_id.clone().ok_or(ControllerError::NoReasoner)?;
        let mut shadow = self.factory.build(&story_id).await?;
        let mut visited: HashSet<NarrativeElementId> = HashSet::new();

        let mut events = shadow.start().await?;
        for _ in 0..=self.max_walk_steps {
            for event in events {
                match event {
                    ReasonerEvent::NarrativeElementChanged(element) => {
                        if !visited.insert(element.id.clone()) {
                            self.report(ReasonerError::new(
                                ReasonerErrorKind::ShadowWalkLoop,
                                format!("shadow walk looped at {} without meeting {target}", element.id),
                            ));
                            return Ok(false);
                        }
                        if &element.id == target {
                            info!(element_id = %target, steps = visited.len(), "Shadow walk reached target");
                            self.reasoner = Some(shadow);
                            self.handle_element_change(element, false).await;
                            return Ok(true);
                        }
                    }
                    ReasonerEvent::StoryEnd => {
                        self.report(ReasonerError::new(
                            ReasonerErrorKind::ShadowWalkExhausted,
                            format!("shadow walk reached story end without meeting {target}"),
                        ));
                        return Ok(false);
                    }
                    ReasonerEvent::Error(e) => {
                        self.report(e);
                        return Ok(false);
                    }
                    ReasonerEvent::ChoiceOfBeginnings(_) | ReasonerEvent::ChoiceOfLinks(_) => {}
                }
            }
            events = shadow.next().await?;
        }

        self.report(ReasonerError::new(
            ReasonerErrorKind::ShadowWalkExhausted,
            format!("shadow walk gave up after {} steps without meeting {target}", self.max_walk_steps),
        ));
        Ok(false)
    }

    /// Rebuild the primary reasoner by forcing it through `history` exactly,
    /// without consulting any rule. Returns `false` when an entry could not
    /// be reached.
    #[instrument(skip(self, history), fields(entries = history.len()))]
    pub async fn replay_history(&mut self, history: &PathHistory) -> Result<bool, ControllerError> {
        let story_id = self.story_id.clone().ok_or(ControllerError::NoReasoner)?;
        let mut fresh = self.factory.build(&story_id).await?;
        fresh.start_deferred()?;

        match fresh.replay_history(history).await {
            Ok(element) => {
                info!(element_id = %element.id, "Path history replayed");
                self.reasoner = Some(fresh);
                self.observer.on_element_found(&element);
                self.handle_element_change(element, true).await;
                Ok(true)
            }
            Err(e) => {
                self.report(e);
                Ok(false)
            }
        }
    }

    /// Follow sub-story hosts down to the element that would actually play
    async fn resolve_playable(
        &self,
        id: &NarrativeElementId,
    ) -> Result<Option<NarrativeElement>, ControllerError> {
        let mut id = id.clone();
        for _ in 0..MAX_NESTING {
            let element = match self.reasoner.as_ref().and_then(|r| r.find_element(&id)) {
                Some(element) => element.clone(),
                None => self.fetchers.narrative_elements.fetch_narrative_element(&id).await?,
            };
            let Some(story_id) = element.sub_story_id() else {
                return Ok(Some(element));
            };
            let story = self.fetchers.stories.fetch_story(story_id).await?;
            match self.evaluator.select(&story.beginnings).await {
                Some(beginning) => id = beginning.narrative_element_id.clone(),
                None => return Ok(None),
            }
        }
        warn!(element_id = %id, "Sub-stories nest too deeply to resolve");
        Ok(None)
    }

    // ---------------------------------------------------------------------
    // Look-ahead
    // ---------------------------------------------------------------------

    /// Elements that could play after `from` (the current element when
    /// `None`), with sub-story targets resolved to their passing beginnings.
    /// Elements with nothing to show are left out. Nothing is mutated.
    pub async fn valid_next_steps(
        &self,
        from: Option<&NarrativeElementId>,
    ) -> Result<Vec<NextStep>, ControllerError> {
        let Some(reasoner) = self.reasoner.as_ref() else {
            return Ok(Vec::new());
        };
        let Some(from) = from.cloned().or_else(|| self.current.as_ref().map(|c| c.id.clone())) else {
            return Ok(Vec::new());
        };

        let mut candidates = Vec::new();
        for link in reasoner.valid_links_from(&from).await {
            let Some(target) = link.target_narrative_element_id else {
                continue;
            };
            let element = match reasoner.find_element(&target) {
                Some(element) => element.clone(),
                None => match self.fetchers.narrative_elements.fetch_narrative_element(&target).await {
                    Ok(element) => element,
                    Err(e) => {
                        debug!(element_id = %target, error = %e, "Skipping unknown link target");
                        continue;
                    }
                },
            };

            match element.sub_story_id() {
                None => candidates.push(NextStep {
                    target_id: element.id.clone(),
                    element,
                }),
                Some(story_id) => {
                    let story = match self.fetchers.stories.fetch_story(story_id).await {
                        Ok(story) => story,
                        Err(e) => {
                            error!(story_id = %story_id, error = %e, "Cannot fetch sub-story while finding next steps");
                            continue;
                        }
                    };
                    for beginning in reasoner.valid_beginnings_for(&story).await {
                        match self.fetchers.narrative_elements.fetch_narrative_element(&beginning).await {
                            Ok(start) => candidates.push(NextStep {
                                target_id: element.id.clone(),
                                element: start,
                            }),
                            Err(e) => debug!(element_id = %beginning, error = %e, "Skipping missing beginning"),
                        }
                    }
                }
            }
        }

        let mut steps = Vec::with_capacity(candidates.len());
        for step in candidates {
            match self.selector.for_element(&step.element).await {
                Ok(Some(_)) => steps.push(step),
                Ok(None) => warn!(element_id = %step.element.id, "No representations are currently valid"),
                Err(e) => warn!(element_id = %step.element.id, error = %e, "Cannot resolve representation"),
            }
        }
        Ok(steps)
    }

    /// Whether exactly one link passes from the playing element
    pub async fn has_unique_next_node(&self) -> bool {
        match &self.reasoner {
            Some(reasoner) => reasoner.valid_links().await.len() == 1,
            None => false,
        }
    }

    /// Ids of the elements that could follow `element_id`
    pub async fn next_element_ids(
        &self,
        element_id: &NarrativeElementId,
    ) -> Result<Vec<NarrativeElementId>, ControllerError> {
        let steps = self.valid_next_steps(Some(element_id)).await?;
        if !steps.is_empty() {
            let elements: Vec<NarrativeElement> = steps.iter().map(|s| s.element.clone()).collect();
            self.observer.on_next_elements(&elements);
        }
        Ok(steps.into_iter().map(|s| s.element.id).collect())
    }

    /// The current element and the first element that could follow it
    pub async fn status(&self) -> Result<ControllerStatus, ControllerError> {
        let next = self
            .valid_next_steps(None)
            .await?
            .into_iter()
            .next()
            .map(|step| step.element);
        Ok(ControllerStatus {
            current: self.current.clone(),
            next,
        })
    }

    /// What would be shown for `element_id`; sub-story hosts are resolved
    /// through their beginnings.
    pub async fn representation_for_element(
        &self,
        element_id: &NarrativeElementId,
    ) -> Result<Option<Representation>, ControllerError> {
        match self.resolve_playable(element_id).await? {
            Some(element) => Ok(self.selector.for_element(&element).await?),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Variables
    // ---------------------------------------------------------------------

    pub async fn set_variable_value(&self, name: &str, value: Value) -> Result<(), ControllerError> {
        info!(variable = %name, value = %value, "Setting variable");
        self.evaluator.resolver().set(name, value.clone()).await?;
        if let Some(store) = &self.session {
            store.set_variable(name, value.clone()).await?;
        }
        self.observer.on_variable_changed(name, &value);
        Ok(())
    }

    pub async fn get_variable_value(&self, name: &str) -> Result<Option<Value>, ControllerError> {
        Ok(self.evaluator.resolver().get(name).await?)
    }

    pub async fn set_variables(&self, variables: BTreeMap<String, Value>) -> Result<(), ControllerError> {
        for (name, value) in variables {
            self.set_variable_value(&name, value).await?;
        }
        Ok(())
    }

    /// The recorded path history
    pub async fn path_history(&self) -> Result<PathHistory, ControllerError> {
        let stored = self.evaluator.resolver().get(internal::PATH_HISTORY).await?;
        Ok(stored.map(|v| PathHistory::from_value(&v)).unwrap_or_default())
    }

    /// Declared defaults of the story and every story nested in it
    pub async fn default_variable_state(&self) -> Result<BTreeMap<String, Value>, ControllerError> {
        let mut defaults = BTreeMap::new();
        for story in self.all_stories().await? {
            for (name, declaration) in story.variables {
                defaults.insert(name, declaration.default_value);
            }
        }
        Ok(defaults)
    }

    /// Declared variables of every story, with their current values
    pub async fn variable_state(&self) -> Result<BTreeMap<String, VariableStatus>, ControllerError> {
        let mut state = BTreeMap::new();
        for story in self.all_stories().await? {
            for (name, declaration) in story.variables {
                let value = self.evaluator.resolver().get(&name).await?;
                state.insert(name, VariableStatus { declaration, value });
            }
        }
        Ok(state)
    }

    /// The playing story and every story nested in it, each once
    async fn all_stories(&self) -> Result<Vec<Story>, ControllerError> {
        let Some(root) = self.story_id.clone() else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::from([root.clone()]);
        let mut queue = VecDeque::from([root]);
        let mut stories = Vec::new();
        while let Some(story_id) = queue.pop_front() {
            let story = self.fetchers.stories.fetch_story(&story_id).await?;
            for element_id in &story.narrative_element_ids {
                let element = self
                    .fetchers
                    .narrative_elements
                    .fetch_narrative_element(element_id)
                    .await?;
                if let Some(sub_story) = element.sub_story_id() {
                    if seen.insert(sub_story.clone()) {
                        queue.push_back(sub_story.clone());
                    }
                }
            }
            stories.push(story);
        }
        Ok(stories)
    }

    async fn prepare_internal_variables(&self, story_id: &StoryId) -> Result<(), ControllerError> {
        let internals = InternalVariables::new(self.evaluator.resolver().clone());
        internals.set_all().await?;
        if self.overrides.is_empty() {
            return Ok(());
        }

        let declarations: BTreeMap<String, VariableDeclaration> = self
            .all_stories()
            .await?
            .into_iter()
            .flat_map(|story| story.variables)
            .collect();
        let applied = internals.apply_overrides(&self.overrides, &declarations).await?;
        debug!(story_id = %story_id, applied = ?applied, "Applied variable overrides");
        Ok(())
    }

    async fn test_for_linearity(&mut self, story_id: &StoryId) {
        let walker = StoryPathWalker::new(self.factory.clone(), self.fetchers.clone(), self.max_walk_steps);
        let path = match walker.parse_story(story_id).await {
            Ok(path @ StoryPath::Linear(_)) => {
                match path.story_item_list(&self.selector).await {
                    Ok(items) => StoryPath::Linear(items),
                    Err(e) => {
                        // Usually a representation with a false condition on the path
                        warn!(error = %e, "Cannot resolve linear path representations");
                        StoryPath::NonLinear
                    }
                }
            }
            Ok(StoryPath::NonLinear) => StoryPath::NonLinear,
            Err(e) => {
                warn!(error = %e, "Linearity walk failed");
                StoryPath::NonLinear
            }
        };
        info!(story_id = %story_id, linear = path.is_linear(), "Linearity walk complete");
        self.observer.on_walk_complete(&path.elements());
        self.linear_path = path;
    }

    // ---------------------------------------------------------------------
    // Event handling
    // ---------------------------------------------------------------------

    async fn handle_events(&mut self, events: Vec<ReasonerEvent>) {
        for event in events {
            match event {
                ReasonerEvent::NarrativeElementChanged(element) => {
                    self.handle_element_change(element, false).await
                }
                ReasonerEvent::StoryEnd => self.handle_story_end().await,
                ReasonerEvent::Error(e) => self.observer.on_error(&e),
                ReasonerEvent::ChoiceOfLinks(links) => self.observer.on_link_choice(&links),
                ReasonerEvent::ChoiceOfBeginnings(count) => {
                    debug!(beginnings = count, "Several beginnings passed")
                }
            }
        }
    }

    /// Record and announce a new playing element. History is not extended
    /// when resuming or when the element is already the latest entry.
    async fn handle_element_change(&mut self, element: NarrativeElement, resuming: bool) {
        info!(element_id = %element.id, name = %element.name, "Narrative element");

        let is_repeat = self.current.as_ref().map(|c| &c.id) == Some(&element.id);
        if !resuming && !is_repeat {
            if let Err(e) = self.append_to_history(&element.id).await {
                warn!(element_id = %element.id, error = %e, "Cannot record path history");
            }
        }

        self.current = Some(element.clone());
        self.observer.on_narrative_element_changed(&element);
    }

    async fn append_to_history(&self, id: &NarrativeElementId) -> Result<(), ControllerError> {
        let mut history = self.path_history().await?;
        if history.last() == Some(id) {
            return Ok(());
        }
        history.push(id.clone());
        self.evaluator
            .resolver()
            .set(internal::PATH_HISTORY, history.to_value())
            .await?;
        if let Some(store) = &self.session {
            store.append_to_history(id).await?;
        }
        Ok(())
    }

    async fn handle_story_end(&mut self) {
        info!(story_id = ?self.story_id, "Story ended");
        if let Err(e) = self.set_session_state(SessionState::New).await {
            warn!(error = %e, "Cannot reset session state");
        }
        self.observer.on_story_end();
    }

    fn report(&self, error: ReasonerError) {
        warn!(kind = %error.kind, "{}", error.message);
        self.observer.on_error(&error);
    }
}
