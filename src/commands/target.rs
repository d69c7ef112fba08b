//! `xf targets`

use anyhow::Result;
use colored::*;

use crate::target::TargetDb;
use crate::ui;

pub fn target_table(db: &TargetDb) -> ui::Table {
    let mut table = ui::Table::new(&["Target", "Core", "Toolchains", "Default build"]);
    for target in db.iter() {
        table.add_row(vec![
            target.name.green().to_string(),
            target.core.clone(),
            target.supported_toolchains.join(", "),
            target.default_build.clone(),
        ]);
    }
    table
}

pub fn handle_targets() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let db = super::load_targets(&cwd)?;
    println!("{} {}", "🎯".cyan(), "Known targets".bold());
    target_table(&db).print();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_target_listed() {
        let db = TargetDb::builtin();
        let text = target_table(&db).render();
        for target in db.iter() {
            assert!(text.contains(&target.name));
        }
        assert!(text.contains("Cortex-M7F"));
    }
}
