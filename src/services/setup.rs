use crate::core::models::GenerationRequest;
use anyhow::{anyhow, Context, Result};
use inquire::{CustomType, Select, Text};
use std::fs;
use std::path::{Path, PathBuf};

const PLOT_TYPED: &str = "Type the plot";
const PLOT_FROM_FILE: &str = "Load the plot from a text file";

/// Splits a comma or newline separated list of paths, dropping blanks.
pub fn parse_path_list(input: &str) -> Vec<PathBuf> {
    input
        .split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Paths from `paths` that do not exist on disk.
pub fn missing_paths(paths: &[PathBuf]) -> Vec<&Path> {
    paths
        .iter()
        .filter(|p| !p.exists())
        .map(PathBuf::as_path)
        .collect()
}

fn prompt_non_empty(message: &str) -> Result<String> {
    let value = Text::new(message).prompt()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(anyhow!("{} cannot be empty", message.trim_end_matches(':')));
    }
    Ok(value)
}

fn prompt_existing_file(message: &str) -> Result<PathBuf> {
    let path = PathBuf::from(prompt_non_empty(message)?);
    if !path.is_file() {
        return Err(anyhow!("File not found: {}", path.display()));
    }
    Ok(path)
}

pub fn prompt_generation_request() -> Result<GenerationRequest> {
    let title = prompt_non_empty("Title:")?;

    let source = Select::new("Plot source:", vec![PLOT_TYPED, PLOT_FROM_FILE]).prompt()?;
    let plot = if source == PLOT_FROM_FILE {
        let path = prompt_existing_file("Plot file:")?;
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        prompt_non_empty("Plot:")?
    };

    let images = Text::new("Reference images (comma separated, optional):").prompt()?;
    let reference_image_paths = parse_path_list(&images);
    let missing = missing_paths(&reference_image_paths);
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
        return Err(anyhow!("Reference images not found: {}", names.join(", ")));
    }

    Ok(GenerationRequest {
        title,
        plot,
        reference_image_paths,
    })
}

/// Title, comic file and protagonist image for a new avatar project.
pub fn prompt_project_input() -> Result<(String, PathBuf, PathBuf)> {
    let title = prompt_non_empty("Project title:")?;
    let comic = prompt_existing_file("Comic file:")?;
    let protagonist = prompt_existing_file("Protagonist image:")?;
    Ok((title, comic, protagonist))
}

pub fn prompt_project_id() -> Result<u64> {
    Ok(CustomType::<u64>::new("Project id:")
        .with_error_message("Please type a numeric id")
        .prompt()?)
}
