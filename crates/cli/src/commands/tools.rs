//! `conductor tools`: list the registered tools and their parameters.

use conductor_core::tool::ToolDefinition;

/// One line per parameter, `?` marking optional ones.
fn describe(definition: &ToolDefinition) -> String {
    let mut out = format!("  {}\n    {}\n", definition.name, definition.description);
    for param in &definition.params {
        let marker = if param.required { "" } else { "?" };
        out.push_str(&format!(
            "      {}{marker}: {}  {}\n",
            param.name,
            param.ty.as_str(),
            param.description
        ));
    }
    out
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = conductor_tools::default_registry();
    println!("Registered tools ({})", registry.len());
    println!();
    for definition in registry.definitions() {
        println!("{}", describe(&definition));
    }
    Ok(())
}
