//! `handoff roles`: list roles and their delegation tools.

use handoff_agent::RoleRegistry;
use handoff_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let roles = RoleRegistry::from_config(&config);

    println!();
    for recipe in roles.iter() {
        let marker = if recipe.name == config.root_role { " (root)" } else { "" };
        println!("  {}{marker}", recipe.name);
        println!("    tools:      {}", recipe.tools.join(", "));
        for rule in &recipe.delegations {
            println!("    delegates:  {} → {}", rule.tool_name, rule.role);
        }
    }
    println!();
    Ok(())
}
