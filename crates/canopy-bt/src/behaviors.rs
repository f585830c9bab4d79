use std::collections::BTreeMap;
use std::fmt;

use canopy_core::Agent;

use crate::blackboard::Globals;

pub type ConditionFn<A> = Box<dyn Fn(&A, &Globals) -> bool + Send + Sync>;
pub type CommandFn<A> = Box<dyn Fn(&mut A, &mut Globals) + Send + Sync>;

/// Named predicates and actions that Condition, Verifier and Command nodes
/// refer to.
///
/// Trees only store names, so one registry can serve every tree in a
/// forest and be shared (`Arc`) by all handlers of the same agent type.
pub struct Behaviors<A: Agent> {
    conditions: BTreeMap<String, ConditionFn<A>>,
    commands: BTreeMap<String, CommandFn<A>>,
}

impl<A: Agent> Default for Behaviors<A> {
    fn default() -> Self {
        Self {
            conditions: BTreeMap::new(),
            commands: BTreeMap::new(),
        }
    }
}

impl<A: Agent> Behaviors<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&A, &Globals) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.add_condition(name, f);
        self
    }

    pub fn with_command(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut A, &mut Globals) + Send + Sync + 'static,
    ) -> Self {
        self.add_command(name, f);
        self
    }

    pub fn add_condition(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&A, &Globals) -> bool + Send + Sync + 'static,
    ) {
        self.conditions.insert(name.into(), Box::new(f));
    }

    pub fn add_command(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut A, &mut Globals) + Send + Sync + 'static,
    ) {
        self.commands.insert(name.into(), Box::new(f));
    }

    /// `None` if no predicate is registered under `name`.
    pub fn check(&self, name: &str, agent: &A, globals: &Globals) -> Option<bool> {
        self.conditions.get(name).map(|f| f(agent, globals))
    }

    /// `false` if no action is registered under `name`.
    pub fn run(&self, name: &str, agent: &mut A, globals: &mut Globals) -> bool {
        match self.commands.get(name) {
            Some(f) => {
                f(agent, globals);
                true
            }
            None => false,
        }
    }

    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }
}

impl<A: Agent> fmt::Debug for Behaviors<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behaviors")
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}
