//! Project resolution.
//!
//! Turns an owner plus a project name into the numeric project ID the
//! watchdog polls. Runs once at startup.

use log::info;

use crate::error::AppError;
use crate::models::owner::Owner;
use crate::models::project::Project;
use crate::services::gitlab_client::{first_exact_match, SourceControl};

/// Resolve `project_name` under `owner` to a single project.
///
/// Name matching is exact and case-sensitive; the first match wins.
pub async fn resolve<S: SourceControl>(
    client: &S,
    owner: &Owner,
    project_name: &str,
) -> Result<Project, AppError> {
    let id = match owner {
        Owner::Group { name } => {
            let projects = client.group_projects(name).await?;
            info!("Group '{}' has {} project(s)", name, projects.len());
            first_exact_match(&projects, project_name)
                .map(|project| project.id)
                .ok_or_else(|| AppError::project_not_found(name.as_str(), project_name))?
        }
        Owner::Individual { name } => client.individual_project_id(name, project_name).await?,
    };

    info!("Resolved {} project '{}' to id {}", owner, project_name, id);

    Ok(Project {
        id,
        name: project_name.to_string(),
    })
}
