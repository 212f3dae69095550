use std::path::Path;

use kubot_core::WorkspaceTree;

pub fn index(workspace: &Path, format: &str) -> anyhow::Result<()> {
    let tree = WorkspaceTree::scan(workspace)?;
    println!("{}", render(&tree, format)?);
    Ok(())
}

fn render(tree: &WorkspaceTree, format: &str) -> anyhow::Result<String> {
    let suites = tree.schedulable();
    let skipped = tree.subdirectory_names();

    match format {
        "json" => Ok(serde_json::to_string_pretty(&serde_json::json!({
            "workspace": tree.path().display().to_string(),
            "suites": suites,
            "skipped_directories": skipped,
        }))?),
        _ => {
            let mut out = format!("{} suites in {}", suites.len(), tree.path().display());
            for suite in suites {
                out.push_str(&format!("\n  {suite}"));
            }
            if !skipped.is_empty() {
                out.push_str(&format!("\nNot scheduled: {}", skipped.join(", ")));
            }
            Ok(out)
        }
    }
}
