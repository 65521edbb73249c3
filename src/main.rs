use anyhow::{anyhow, Result};
use inquire::Select;
use log::warn;
use manga_factory::core::config::Config;
use manga_factory::core::io::{NativeStorage, Storage};
use manga_factory::core::repository::{InMemoryProjectRepository, ProjectRepository};
use manga_factory::services::avatar::{create_avatar_backend, AvatarProvisioner};
use manga_factory::services::llm::create_model;
use manga_factory::services::projects::ProjectService;
use manga_factory::services::setup;
use manga_factory::services::tts::elevenlabs::create_voice_provider;
use manga_factory::services::workflow::WorkflowManager;
use serde::Serialize;
use std::sync::Arc;

const GENERATE: &str = "Generate manga";
const CREATE_PROJECT: &str = "Create avatar project";
const LIST_PROJECTS: &str = "List projects";
const VIEW_PROJECT: &str = "View project";
const EXIT: &str = "Exit";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle(choice: &str, workflow: Option<&WorkflowManager>, projects: Option<&ProjectService>) -> Result<()> {
    match choice {
        GENERATE => {
            let workflow = workflow.ok_or_else(|| anyhow!("Manga generation needs GOOGLE_API_KEY"))?;
            let request = setup::prompt_generation_request()?;
            let result = workflow.run(&request).await?;
            print_json(&result)
        }
        CREATE_PROJECT => {
            let projects = projects.ok_or_else(|| anyhow!("Avatar projects need ANAM_API_KEY"))?;
            let (title, comic, protagonist) = setup::prompt_project_input()?;
            let record = projects.create_project(&title, &comic, &protagonist).await?;
            println!("Avatar created successfully!");
            print_json(&record)
        }
        LIST_PROJECTS => {
            let projects = projects.ok_or_else(|| anyhow!("Avatar projects need ANAM_API_KEY"))?;
            print_json(&projects.list_projects().await?)
        }
        VIEW_PROJECT => {
            let projects = projects.ok_or_else(|| anyhow!("Avatar projects need ANAM_API_KEY"))?;
            let id = setup::prompt_project_id()?;
            match projects.view_project(id).await? {
                Some(view) => print_json(&view),
                None => Err(anyhow!("Project {} not found", id)),
            }
        }
        _ => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Please check 'config.yml' or remove it to use defaults.");
            return Err(e);
        }
    };
    config.ensure_directories()?;

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let repository: Arc<dyn ProjectRepository> = Arc::new(InMemoryProjectRepository::new());

    let workflow = match create_model(&config.gemini) {
        Ok(model) => Some(
            WorkflowManager::new(&config, model, create_voice_provider(&config.elevenlabs), storage.clone())
                .with_progress(true),
        ),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };

    let projects = match create_avatar_backend(&config.anam) {
        Ok(backend) => {
            let provisioner = AvatarProvisioner::new(backend, storage.clone(), &config.anam);
            Some(ProjectService::new(provisioner, repository))
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    };

    loop {
        let options = vec![GENERATE, CREATE_PROJECT, LIST_PROJECTS, VIEW_PROJECT, EXIT];
        let choice = match Select::new("What would you like to do?", options).prompt() {
            Ok(choice) => choice,
            Err(_) => break,
        };
        if choice == EXIT {
            break;
        }

        if let Err(e) = handle(choice, workflow.as_ref(), projects.as_ref()).await {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}
