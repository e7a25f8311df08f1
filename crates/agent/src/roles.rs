//! Role registry and the factory that turns a role name into a Runner.
//!
//! A role is a recipe: system prompt, leaf tool names, and delegation
//! rules naming their target role by value. Delegation targets are looked
//! up when a Runner's tool set is materialized, so roles may reference
//! each other in any order (or themselves).

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use handoff_config::AppConfig;
use handoff_core::{Credentials, Error, Provider, Result, Tool};
use handoff_tools::{FILE_TOOLS, READ_ONLY_TOOLS};
use tracing::debug;

use crate::delegation::{ChildFactory, DelegationDescriptor, SpawnContext};
use crate::notes::{NotesLog, NotesView};
use crate::prompts;
use crate::runner::{Runner, RunnerSettings};

/// A delegation tool declared by a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRule {
    pub tool_name: String,
    pub description: String,
    pub task_description: String,
    /// Role that receives the task
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecipe {
    pub name: String,
    pub system_prompt: String,
    pub tools: Vec<String>,
    pub delegations: Vec<DelegationRule>,
}

impl RoleRecipe {
    fn new(name: &str, system_prompt: &str, tools: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            system_prompt: system_prompt.to_string(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            delegations: Vec::new(),
        }
    }

    fn delegates(mut self, tool_name: &str, description: &str, task_description: &str, role: &str) -> Self {
        self.delegations.push(DelegationRule {
            tool_name: tool_name.to_string(),
            description: description.to_string(),
            task_description: task_description.to_string(),
            role: role.to_string(),
        });
        self
    }
}

/// Role name to recipe.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    roles: BTreeMap<String, RoleRecipe>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in team.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(
            RoleRecipe::new("cto", prompts::CTO, FILE_TOOLS).delegates(
                "assignToDeveloper",
                "Assign a task to a developer. Returns the developer's summary of the work.",
                "A clear and precise description of the task to perform.",
                "developer-task",
            ),
        );
        registry.insert(RoleRecipe::new("developer-task", prompts::DEVELOPER_TASK, FILE_TOOLS));
        registry.insert(RoleRecipe::new("developer", prompts::DEVELOPER, FILE_TOOLS));
        registry.insert(
            RoleRecipe::new("lead-developer", prompts::CTO, FILE_TOOLS).delegates(
                "assignToDeveloper",
                "Assign a task to a developer. Returns the developer's response.",
                "A clear and precise description of the requested task.",
                "developer",
            ),
        );
        registry.insert(
            RoleRecipe::new("planner", prompts::PLANNER, &["readDirectory", "readFile"]).delegates(
                "assignToDeveloper",
                "Assign a task to an expert developer. Returns the developer's response.",
                "A highly detailed description of the requested task.",
                "developer",
            ),
        );
        registry.insert(
            RoleRecipe::new("clarifier", prompts::CLARIFIER, READ_ONLY_TOOLS).delegates(
                "sendInstructions",
                "Send instructions to the development team.",
                "Instructions for the development team, using absolute paths.",
                "developer",
            ),
        );
        registry
    }

    /// Built-in roles, overridden or extended by `[roles.*]` in the config.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::builtin();
        for (name, role) in &config.roles {
            registry.insert(RoleRecipe {
                name: name.clone(),
                system_prompt: role.system_prompt.clone(),
                tools: role.tools.clone(),
                delegations: role
                    .delegations
                    .iter()
                    .map(|d| DelegationRule {
                        tool_name: d.tool_name.clone(),
                        description: d.description.clone(),
                        task_description: d.task_description.clone(),
                        role: d.role.clone(),
                    })
                    .collect(),
            });
        }
        registry
    }

    pub fn insert(&mut self, recipe: RoleRecipe) {
        self.roles.insert(recipe.name.clone(), recipe);
    }

    pub fn get(&self, name: &str) -> Option<&RoleRecipe> {
        self.roles.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.roles.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleRecipe> {
        self.roles.values()
    }
}

/// Instantiates roles as Runners. Cloning shares the same factory.
#[derive(Clone)]
pub struct RunnerFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    provider: Arc<dyn Provider>,
    settings: RunnerSettings,
    catalog: Vec<Arc<dyn Tool>>,
    roles: RoleRegistry,
    workspace: PathBuf,
}

impl RunnerFactory {
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: RunnerSettings,
        catalog: Vec<Arc<dyn Tool>>,
        roles: RoleRegistry,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                provider,
                settings,
                catalog,
                roles,
                workspace: workspace.into(),
            }),
        }
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.inner.roles
    }

    /// A root Runner with a fresh notes log.
    pub fn root(&self, role: &str, credentials: Credentials) -> Result<Runner> {
        self.spawn(role, credentials, NotesLog::new().view(), 0)
    }

    /// Build a Runner for `role`. Unknown roles and tools are
    /// configuration errors.
    pub fn spawn(&self, role: &str, credentials: Credentials, notes: NotesView, depth: u32) -> Result<Runner> {
        let recipe = self
            .inner
            .roles
            .get(role)
            .ok_or_else(|| Error::config(format!("unknown role '{role}'")))?;

        let mut builder = Runner::builder(self.inner.provider.clone(), credentials)
            .settings(self.inner.settings.clone())
            .role(&recipe.name)
            .system_prompt(prompts::render(&recipe.system_prompt, &self.inner.workspace))
            .notes(notes)
            .depth(depth);

        for name in &recipe.tools {
            let tool = self
                .inner
                .catalog
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| Error::config(format!("role '{role}' uses unknown tool '{name}'")))?;
            builder = builder.tool(tool.clone());
        }

        for rule in &recipe.delegations {
            builder = builder.delegation(DelegationDescriptor::new(
                &rule.tool_name,
                &rule.description,
                &rule.task_description,
                RoleChildFactory {
                    factory: self.clone(),
                    role: rule.role.clone(),
                },
            ));
        }

        debug!(role, depth, "Spawned runner");
        Ok(builder.build())
    }
}

impl std::fmt::Debug for RunnerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerFactory")
            .field("provider", &self.inner.provider.name())
            .field("roles", &self.inner.roles.names())
            .field("workspace", &self.inner.workspace)
            .finish()
    }
}

/// Spawns children of a named role.
struct RoleChildFactory {
    factory: RunnerFactory,
    role: String,
}

impl ChildFactory for RoleChildFactory {
    fn spawn(&self, ctx: SpawnContext) -> Result<Runner> {
        self.factory.spawn(&self.role, ctx.credentials, ctx.notes, ctx.depth)
    }

    fn check(&self) -> Result<()> {
        if self.factory.roles().contains(&self.role) {
            Ok(())
        } else {
            Err(Error::config(format!("delegation target role '{}' is not defined", self.role)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use handoff_config::{DelegationConfig, RoleConfig};
    use handoff_config::ToolsConfig;
    use handoff_security::Sandbox;

    fn factory(roles: RoleRegistry, dir: &std::path::Path) -> RunnerFactory {
        let sandbox = Sandbox::new(dir).unwrap();
        let catalog = handoff_tools::builtin_tools(&sandbox, &ToolsConfig::default());
        RunnerFactory::new(
            ScriptedProvider::new(vec![]),
            RunnerSettings::default(),
            catalog,
            roles,
            dir,
        )
    }

    #[test]
    fn builtin_roles_delegate_by_name() {
        let roles = RoleRegistry::builtin();
        assert_eq!(
            roles.names(),
            vec!["clarifier", "cto", "developer", "developer-task", "lead-developer", "planner"]
        );
        for recipe in roles.iter() {
            for rule in &recipe.delegations {
                assert!(roles.contains(&rule.role), "{} -> {}", recipe.name, rule.role);
            }
        }
        assert_eq!(roles.get("cto").unwrap().delegations[0].role, "developer-task");
        assert_eq!(roles.get("clarifier").unwrap().delegations[0].tool_name, "sendInstructions");
    }

    #[test]
    fn config_roles_override_builtins() {
        let mut config = AppConfig::default();
        config.roles.insert(
            "cto".into(),
            RoleConfig {
                system_prompt: "custom".into(),
                tools: vec!["readFile".into()],
                delegations: vec![DelegationConfig {
                    tool_name: "askReviewer".into(),
                    description: "Ask for a review".into(),
                    task_description: "What to review".into(),
                    role: "reviewer".into(),
                }],
            },
        );
        let roles = RoleRegistry::from_config(&config);
        let cto = roles.get("cto").unwrap();
        assert_eq!(cto.system_prompt, "custom");
        assert_eq!(cto.delegations[0].role, "reviewer");
        assert!(roles.contains("developer"));
    }

    #[test]
    fn spawn_wires_tools_prompt_and_depth() {
        let dir = tempfile::tempdir().unwrap();
        let factory = factory(RoleRegistry::builtin(), dir.path());
        let notes = NotesLog::new();
        notes.append("earlier");

        let runner = factory
            .spawn("planner", Credentials::new("t"), notes.view(), 2)
            .unwrap();
        assert_eq!(runner.role(), "planner");
        assert_eq!(runner.depth(), 2);
        assert_eq!(runner.notes().version(), 1);
        assert_eq!(
            runner.tool_names(),
            vec!["readDirectory", "readFile", "attachNotes", "assignToDeveloper"]
        );
    }

    #[test]
    fn unknown_role_or_tool_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut roles = RoleRegistry::builtin();
        roles.insert(RoleRecipe::new("broken", "p", &["launchRockets"]));
        let factory = factory(roles, dir.path());

        let err = factory.root("nobody", Credentials::new("t")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        let err = factory.root("broken", Credentials::new("t")).unwrap_err();
        assert!(err.to_string().contains("launchRockets"));
    }

    #[tokio::test]
    async fn missing_delegation_target_fails_first_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut roles = RoleRegistry::builtin();
        roles.insert(RoleRecipe::new("lonely", "p", &[]).delegates("ask", "Ask", "Task", "ghost"));
        let factory = factory(roles, dir.path());

        let runner = factory.root("lonely", Credentials::new("t")).unwrap();
        let err = runner.send_message("hi").await.unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}
