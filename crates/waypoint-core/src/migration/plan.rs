//! Migration plans.
//!
//! A plan is a graph of transitions keyed by source state. Every state a
//! transition reaches is tracked, even before it has an outgoing transition
//! of its own; the single state left without one is the plan's final state.
//!
//! Plans are built fluently:
//!
//! ```ignore
//! let mut plan = MigrationPlan::new("Blog");
//! plan.from("")
//!     .to::<CreateUsers>("users")?
//!     .to::<CreatePosts>("posts")?
//!     .to_state("1.0")?;
//! assert_eq!(plan.final_state()?.as_str(), "1.0");
//! ```

use super::error::MigrationError;
use super::kind::{MigrationKind, MigrationType};
use super::merge::MergeBuilder;
use super::state::State;
use super::transition::Transition;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// One state of the plan and its outgoing transition, if any.
#[derive(Debug, Clone)]
struct PlanEntry {
    state: State,
    transition: Option<Transition>,
}

/// A named migration plan.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    name: String,
    /// States in insertion order.
    entries: Vec<PlanEntry>,
    /// State to position in `entries`.
    index: HashMap<State, usize>,
    /// Fluent cursor, set by `from` and by every successful `to`.
    prev_state: Option<State>,
    /// Cached result of validation, cleared by every mutation.
    final_state: OnceLock<State>,
    post_migrations: Vec<MigrationKind>,
    initial_state: State,
    ignore_current_state: bool,
    known_kinds: Option<HashSet<MigrationKind>>,
}

impl MigrationPlan {
    /// Create an empty plan.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            index: HashMap::new(),
            prev_state: None,
            final_state: OnceLock::new(),
            post_migrations: Vec::new(),
            initial_state: State::initial(),
            ignore_current_state: false,
            known_kinds: None,
        }
    }

    /// Restrict the kinds accepted by `to_kind` to a known catalogue.
    ///
    /// Kinds added through the typed builders are always accepted and join
    /// the catalogue.
    pub fn with_known_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = MigrationKind>,
    {
        let known = self.known_kinds.get_or_insert_with(HashSet::new);
        known.extend(kinds);
        known.insert(MigrationKind::noop());
        self
    }

    /// Set the state a fresh installation starts from.
    pub fn with_initial_state(mut self, state: impl Into<State>) -> Self {
        self.set_initial_state(state);
        self
    }

    /// Set whether a persisted current state is ignored.
    pub fn with_ignore_current_state(mut self, ignore: bool) -> Self {
        self.ignore_current_state = ignore;
        self
    }

    /// Set the state a fresh installation starts from.
    pub fn set_initial_state(&mut self, state: impl Into<State>) {
        self.initial_state = state.into().trimmed();
        self.final_state = OnceLock::new();
    }

    /// Set whether a persisted current state is ignored.
    pub fn set_ignore_current_state(&mut self, ignore: bool) {
        self.ignore_current_state = ignore;
    }

    /// The plan name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The state a fresh installation starts from.
    pub fn initial_state(&self) -> &State {
        &self.initial_state
    }

    /// Whether upgraders always start from the initial state.
    pub fn ignore_current_state(&self) -> bool {
        self.ignore_current_state
    }

    /// Number of known states.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the plan has no transitions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set the source state of the next transition.
    pub fn from(&mut self, state: impl Into<State>) -> &mut Self {
        self.prev_state = Some(state.into().trimmed());
        self
    }

    /// Add a transition to `target` running migration `M`.
    pub fn to<M: MigrationType>(
        &mut self,
        target: impl Into<State>,
    ) -> Result<&mut Self, MigrationError> {
        let kind = MigrationKind::of::<M>();
        self.add(self.prev_state.clone(), target.into(), kind.clone(), true)?;
        self.register_kind(kind);
        Ok(self)
    }

    /// Add a transition to `target` running the migration named by `kind`.
    pub fn to_kind(
        &mut self,
        target: impl Into<State>,
        kind: MigrationKind,
    ) -> Result<&mut Self, MigrationError> {
        self.add(self.prev_state.clone(), target.into(), kind, false)?;
        Ok(self)
    }

    /// Add a transition to `target` that runs no migration.
    pub fn to_state(&mut self, target: impl Into<State>) -> Result<&mut Self, MigrationError> {
        self.add(
            self.prev_state.clone(),
            target.into(),
            MigrationKind::noop(),
            true,
        )?;
        Ok(self)
    }

    /// Add a transition to `target` running `N`, and a recovery transition
    /// from `recover_state` to `target` running `R`.
    ///
    /// Installations that already reached `recover_state` (a previously
    /// shipped final state) then still reach `target`.
    pub fn to_with_replace<N: MigrationType, R: MigrationType>(
        &mut self,
        recover_state: impl Into<State>,
        target: impl Into<State>,
    ) -> Result<&mut Self, MigrationError> {
        let target = target.into();
        self.to::<N>(target.clone())?;
        self.from(recover_state).to::<R>(target)
    }

    /// Like [`to_with_replace`](Self::to_with_replace), with a no-op
    /// recovery transition.
    pub fn to_with_replace_noop<N: MigrationType>(
        &mut self,
        recover_state: impl Into<State>,
        target: impl Into<State>,
    ) -> Result<&mut Self, MigrationError> {
        let target = target.into();
        self.to::<N>(target.clone())?;
        self.from(recover_state).to_state(target)
    }

    /// Kind-based form of [`to_with_replace`](Self::to_with_replace).
    ///
    /// A missing `recover_kind` means a no-op recovery transition.
    pub fn to_with_replace_kind(
        &mut self,
        new_kind: MigrationKind,
        recover_kind: Option<MigrationKind>,
        recover_state: impl Into<State>,
        target: impl Into<State>,
    ) -> Result<&mut Self, MigrationError> {
        let target = target.into();
        self.to_kind(target.clone(), new_kind)?;
        self.from(recover_state)
            .to_kind(target, recover_kind.unwrap_or_else(MigrationKind::noop))
    }

    /// Copy the chain running from `start` to `end` onto the current
    /// cursor, ending at `target`.
    ///
    /// Intermediate states of the copy are freshly generated.
    pub fn to_with_clone(
        &mut self,
        start: impl Into<State>,
        end: impl Into<State>,
        target: impl Into<State>,
    ) -> Result<&mut Self, MigrationError> {
        let start = start.into().trimmed();
        let end = end.into().trimmed();
        let target = target.into().trimmed();

        if end.is_blank() || target.is_blank() {
            return Err(MigrationError::BlankTargetState {
                plan: self.name.clone(),
            });
        }
        if start == end {
            return Err(MigrationError::EmptyCloneRange {
                plan: self.name.clone(),
                state: start,
            });
        }

        // Resolve the whole chain before touching the graph.
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut state = start.clone();
        while state != end {
            if !visited.insert(state.clone()) || visited.len() > self.entries.len() {
                return Err(MigrationError::CloneLoop {
                    plan: self.name.clone(),
                    start,
                    end,
                });
            }

            let transition = match self.transition_from(&state) {
                Some(Some(transition)) => transition,
                _ => {
                    return Err(MigrationError::UnknownCloneState {
                        plan: self.name.clone(),
                        state,
                    })
                }
            };
            state = transition.target_state().clone();
            chain.push(transition.clone());
        }

        for transition in chain {
            let next = if transition.target_state() == &end {
                target.clone()
            } else {
                self.create_random_state()
            };
            self.add(
                self.prev_state.clone(),
                next,
                transition.kind().clone(),
                true,
            )?;
        }

        Ok(self)
    }

    /// Add a kind to the catalogue, if the plan keeps one.
    pub(crate) fn register_kind(&mut self, kind: MigrationKind) {
        if let Some(known) = self.known_kinds.as_mut() {
            known.insert(kind);
        }
    }

    /// Generate a fresh synthetic state.
    pub fn create_random_state(&self) -> State {
        State::random()
    }

    /// Start a merge of two branches.
    pub fn merge(&mut self) -> MergeBuilder<'_> {
        MergeBuilder::new(self)
    }

    /// Queue migration `M` to run once after the main chain.
    #[deprecated(note = "post migrations run outside of any transition; prefer a regular step")]
    pub fn add_post_migration<M: MigrationType>(&mut self) -> &mut Self {
        self.post_migrations.push(MigrationKind::of::<M>());
        self
    }

    /// Queue the migration named by `kind` to run once after the main chain.
    #[deprecated(note = "post migrations run outside of any transition; prefer a regular step")]
    pub fn add_post_migration_kind(&mut self, kind: MigrationKind) -> &mut Self {
        self.post_migrations.push(kind);
        self
    }

    /// Post migrations queued on the plan, in insertion order.
    pub fn post_migrations(&self) -> &[MigrationKind] {
        &self.post_migrations
    }

    /// Validate the plan.
    ///
    /// Checks that exactly one state has no outgoing transition and that
    /// no chain of transitions loops. The final state is cached until the
    /// next mutation, so repeated calls are cheap.
    pub fn validate(&self) -> Result<(), MigrationError> {
        self.final_state().map(|_| ())
    }

    /// The plan's final state, validating the plan if needed.
    ///
    /// A plan without transitions has its initial state as final state.
    pub fn final_state(&self) -> Result<&State, MigrationError> {
        if let Some(state) = self.final_state.get() {
            return Ok(state);
        }
        let state = self.compute_final_state()?;
        Ok(self.final_state.get_or_init(|| state))
    }

    /// Look up the outgoing transition of `state`.
    ///
    /// `None` means the state is unknown; `Some(None)` means it is known
    /// but has no outgoing transition.
    pub fn transition_from(&self, state: &State) -> Option<Option<&Transition>> {
        self.index
            .get(state)
            .map(|&idx| self.entries[idx].transition.as_ref())
    }

    /// Check whether `state` is part of the plan.
    pub fn contains_state(&self, state: &State) -> bool {
        self.index.contains_key(state)
    }

    /// All known states, in insertion order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.entries.iter().map(|entry| &entry.state)
    }

    /// All transitions, in insertion order of their source state.
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.entries
            .iter()
            .filter_map(|entry| entry.transition.as_ref())
    }

    /// The error reported when execution is asked to start from a state
    /// the plan does not know.
    pub fn unknown_initial_state(&self, state: &State) -> MigrationError {
        MigrationError::UnknownState {
            plan: self.name.clone(),
            state: state.clone(),
        }
    }

    /// Resolve the first transition to run from `state`.
    ///
    /// A plan without transitions accepts its initial state and has nothing
    /// to run from it.
    pub(crate) fn start_transition(
        &self,
        state: &State,
    ) -> Result<Option<&Transition>, MigrationError> {
        if self.entries.is_empty() && state == &self.initial_state {
            return Ok(None);
        }
        self.transition_from(state)
            .ok_or_else(|| self.unknown_initial_state(state))
    }

    /// Resolve the transition following a reached state.
    ///
    /// Every reached state is a registered target, so a miss is an engine
    /// bug rather than a user error.
    pub(crate) fn next_transition(
        &self,
        state: &State,
    ) -> Result<Option<&Transition>, MigrationError> {
        self.transition_from(state).ok_or_else(|| {
            MigrationError::internal(format!(
                "plan {}: reached unknown state \"{}\"",
                self.name, state
            ))
        })
    }

    /// Replay the chain from `from` (default: initial state) to `to`
    /// (default: final state) without running any migration.
    ///
    /// Returns the visited states, starting with `from`.
    pub fn follow_path(
        &self,
        from: Option<&State>,
        to: Option<&State>,
    ) -> Result<Vec<State>, MigrationError> {
        self.validate()?;

        let to = to.filter(|state| !state.is_blank());
        let origin = from.unwrap_or(&self.initial_state).trimmed();
        let mut states = vec![origin.clone()];

        let mut transition = self.start_transition(&origin)?;
        if to == Some(&origin) {
            return Ok(states);
        }
        while let Some(current) = transition {
            let next = current.target_state();
            states.push(next.clone());
            if Some(next) == to {
                break;
            }
            transition = self.next_transition(next)?;
        }

        if let Some(to) = to {
            if states.last() != Some(to) {
                return Err(MigrationError::UnreachableState {
                    plan: self.name.clone(),
                    state: to.clone(),
                });
            }
        }

        Ok(states)
    }

    fn add(
        &mut self,
        source: Option<State>,
        target: State,
        kind: MigrationKind,
        recognized: bool,
    ) -> Result<(), MigrationError> {
        let source = source
            .ok_or_else(|| MigrationError::MissingSourceState {
                plan: self.name.clone(),
            })?
            .trimmed();

        if target.is_blank() {
            return Err(MigrationError::BlankTargetState {
                plan: self.name.clone(),
            });
        }
        let target = target.trimmed();

        if source == target {
            return Err(MigrationError::SelfLoop {
                plan: self.name.clone(),
                state: source,
            });
        }

        if kind.is_blank() {
            return Err(MigrationError::MissingMigrationKind {
                plan: self.name.clone(),
            });
        }
        if !recognized {
            if let Some(known) = &self.known_kinds {
                if !known.contains(&kind) {
                    return Err(MigrationError::UnknownMigrationKind {
                        plan: self.name.clone(),
                        kind,
                    });
                }
            }
        }

        if let Some(Some(_)) = self.transition_from(&source) {
            return Err(MigrationError::DuplicateTransition {
                plan: self.name.clone(),
                state: source,
            });
        }

        let transition = Transition::new(source.clone(), target.clone(), kind);
        match self.index.get(&source) {
            Some(&idx) => self.entries[idx].transition = Some(transition),
            None => self.push_entry(source, Some(transition)),
        }

        // Track the target even before it has a transition of its own.
        if !self.index.contains_key(&target) {
            self.push_entry(target.clone(), None);
        }

        self.prev_state = Some(target);
        self.final_state = OnceLock::new();
        Ok(())
    }

    fn push_entry(&mut self, state: State, transition: Option<Transition>) {
        self.index.insert(state.clone(), self.entries.len());
        self.entries.push(PlanEntry { state, transition });
    }

    fn compute_final_state(&self) -> Result<State, MigrationError> {
        if self.entries.is_empty() {
            return Ok(self.initial_state.clone());
        }

        // Dead ends: states registered as targets without a transition.
        let mut final_state: Option<&State> = None;
        for entry in self.entries.iter().filter(|e| e.transition.is_none()) {
            match final_state {
                None => final_state = Some(&entry.state),
                Some(first) => {
                    return Err(MigrationError::MultipleFinalStates {
                        plan: self.name.clone(),
                        first: first.clone(),
                        second: entry.state.clone(),
                    })
                }
            }
        }

        // Loops: walk forward from each unverified transition. States on a
        // walk that ends cleanly are verified and never walked again.
        let mut verified: HashSet<&State> = HashSet::new();
        for transition in self.transitions() {
            if verified.contains(transition.source_state()) {
                continue;
            }

            let mut visited: HashSet<&State> = HashSet::new();
            visited.insert(transition.source_state());

            let mut next = self.next_transition(transition.target_state())?;
            while let Some(current) = next {
                if verified.contains(current.source_state()) {
                    break;
                }
                if !visited.insert(current.source_state()) {
                    return Err(MigrationError::LoopDetected {
                        plan: self.name.clone(),
                        state: current.source_state().clone(),
                    });
                }
                next = self.next_transition(current.target_state())?;
            }

            verified.extend(visited);
        }

        final_state
            .cloned()
            .ok_or_else(|| MigrationError::NoFinalState {
                plan: self.name.clone(),
            })
    }
}
