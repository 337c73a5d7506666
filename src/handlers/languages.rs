use anyhow::Result;
use colored::*;
use std::collections::HashMap;
use std::env;
use crate::config::load_config;

pub fn handle_languages() -> Result<()> {
    let current_dir = env::current_dir()?;
    let config = load_config(&current_dir)?;

    print_section("Executors by language:", &config.executor_map);
    print_section("Executors by file extension:", &config.executor_map_by_file_extension);

    if !config.executor_map_by_glob.is_empty() {
        println!();
        println!("{}", "Executors by glob:".bold().underline());
        for (glob, executor) in &config.executor_map_by_glob {
            println!("  {}  {}", glob.cyan(), executor.italic());
        }
    }

    if let Some(lang) = &config.default_language {
        println!();
        println!("Default language: {}", lang.bold());
    }

    Ok(())
}

fn print_section(title: &str, map: &HashMap<String, String>) {
    println!("{}", title.bold().underline());

    let mut entries: Vec<(&String, &String)> = map.iter().filter(|(_, v)| !v.is_empty()).collect();
    // Sort for consistent output
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let max_len = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);

    for (name, executor) in entries {
        let padding = " ".repeat(max_len - name.len() + 2);
        println!("  {}{}{}", name.cyan(), padding, executor.italic());
    }
}
