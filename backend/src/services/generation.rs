//! Orchestration of outline, description and image generation.
//!
//! Synchronous operations (outline, single-page description, refinements)
//! return the updated pages directly. Batch operations create a task, return
//! it at once and run the per-page work in the background, bounded by the
//! worker limits from the settings.

use super::ai_service::{
    extract_image_urls_from_markdown, flatten_outline, outline_from_pages, AiService,
    DescriptionEntry, OutlineItem, OutlinePage, ProjectContext,
};
use super::file_service::{page_image_path, FileService};
use super::task_manager::{ProgressTracker, TaskManager};
use crate::database::models::{
    CreationType, Page, PageDescription, PageImageVersion, PageStatus, Project, ProjectStatus,
    Settings, Task, TaskProgress, TaskType,
};
use crate::database::queries::{self, NewPage};
use crate::database::Database;
use crate::errors::{AppError, AppResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Concurrency limits for batch work.
#[derive(Debug, Clone, Copy)]
pub struct WorkerLimits {
    pub descriptions: usize,
    pub images: usize,
}

impl From<&Settings> for WorkerLimits {
    fn from(settings: &Settings) -> Self {
        Self {
            descriptions: settings.max_description_workers.max(1) as usize,
            images: settings.max_image_workers.max(1) as usize,
        }
    }
}

fn description_json(text: &str) -> AppResult<String> {
    serde_json::to_string(&PageDescription {
        text: text.to_string(),
    })
    .map_err(|err| AppError::Internal(err.to_string()))
}

fn outline_json(page: &OutlinePage) -> AppResult<String> {
    serde_json::to_string(&page.to_page_outline()).map_err(|err| AppError::Internal(err.to_string()))
}

/// Everything a page's image prompt needs, captured before the work is spawned.
struct ImageJob {
    page_id: String,
    page_index: usize,
    outline_page: OutlinePage,
    description: String,
}

#[derive(Clone)]
pub struct Generation {
    db: Database,
    files: Arc<FileService>,
    tasks: TaskManager,
    ai: Arc<AiService>,
    limits: WorkerLimits,
}

impl Generation {
    pub fn new(
        db: Database,
        files: Arc<FileService>,
        tasks: TaskManager,
        ai: Arc<AiService>,
        limits: WorkerLimits,
    ) -> Self {
        Self {
            db,
            files,
            tasks,
            ai,
            limits,
        }
    }

    async fn pages(&self, project_id: &str) -> AppResult<Vec<Page>> {
        let project_id = project_id.to_string();
        Ok(self
            .db
            .call(move |conn| queries::list_pages(conn, &project_id))
            .await?)
    }

    async fn set_project_status(&self, project_id: &str, status: ProjectStatus) -> AppResult<()> {
        let project_id = project_id.to_string();
        self.db
            .call(move |conn| queries::set_project_status(conn, &project_id, status))
            .await?;
        Ok(())
    }

    async fn replace_pages(&self, project_id: &str, pages: Vec<NewPage>) -> AppResult<Vec<Page>> {
        let project_id = project_id.to_string();
        Ok(self
            .db
            .call(move |conn| queries::replace_pages(conn, &project_id, pages))
            .await?)
    }

    /// Builds the outline from the project's input and replaces its pages.
    pub async fn generate_outline(&self, project: &Project) -> AppResult<Vec<Page>> {
        let context = ProjectContext::from(project);
        let (outline, descriptions) = match project.creation_type {
            CreationType::Idea => (self.ai.generate_outline(&context).await?, Vec::new()),
            CreationType::Outline => (self.ai.parse_outline_text(&context).await?, Vec::new()),
            CreationType::Descriptions => {
                let outline = self.ai.parse_description_to_outline(&context).await?;
                let descriptions = self
                    .ai
                    .parse_description_to_page_descriptions(&context, &outline)
                    .await?;
                (outline, descriptions)
            }
        };

        let flat = flatten_outline(&outline);
        if !descriptions.is_empty() && descriptions.len() != flat.len() {
            warn!(
                project_id = %project.id,
                pages = flat.len(),
                descriptions = descriptions.len(),
                "Description split does not match the outline"
            );
        }
        let mut new_pages = Vec::with_capacity(flat.len());
        for (index, page) in flat.iter().enumerate() {
            let description = descriptions.get(index).filter(|text| !text.trim().is_empty());
            new_pages.push(NewPage {
                part: page.part.clone(),
                outline_content: Some(outline_json(page)?),
                description_content: description.map(|text| description_json(text)).transpose()?,
                status: description.map(|_| PageStatus::DescriptionGenerated),
            });
        }

        let pages = self.replace_pages(&project.id, new_pages).await?;
        let status = if project.creation_type == CreationType::Descriptions {
            ProjectStatus::DescriptionsGenerated
        } else {
            ProjectStatus::OutlineGenerated
        };
        self.set_project_status(&project.id, status).await?;
        info!(project_id = %project.id, pages = pages.len(), "Outline generated");
        Ok(pages)
    }

    /// Refines the current outline. New pages keep the description of an
    /// old page with the same title.
    pub async fn refine_outline(
        &self,
        project: &Project,
        requirement: &str,
        previous: &[String],
    ) -> AppResult<Vec<Page>> {
        let old_pages = self.pages(&project.id).await?;
        let current = outline_from_pages(&old_pages);
        let refined = self
            .ai
            .refine_outline(&current, requirement, &ProjectContext::from(project), previous)
            .await?;

        let mut kept: HashMap<String, String> = HashMap::new();
        for page in &old_pages {
            if let (Some(outline), Some(description)) = (page.outline(), page.description_content.clone()) {
                kept.entry(outline.title).or_insert(description);
            }
        }

        let mut new_pages = Vec::new();
        for page in flatten_outline(&refined) {
            let description = kept.get(&page.title).cloned();
            new_pages.push(NewPage {
                part: page.part.clone(),
                outline_content: Some(outline_json(&page)?),
                status: description.as_ref().map(|_| PageStatus::DescriptionGenerated),
                description_content: description,
            });
        }
        let pages = self.replace_pages(&project.id, new_pages).await?;
        self.set_project_status(&project.id, ProjectStatus::OutlineGenerated)
            .await?;
        Ok(pages)
    }

    /// Starts a `GENERATE_DESCRIPTIONS` task over every page.
    pub async fn start_descriptions(&self, project: &Project) -> AppResult<Task> {
        let pages = self.pages(&project.id).await?;
        if pages.is_empty() {
            return Err(AppError::bad_request(
                "Project has no pages. Generate an outline first",
            ));
        }

        let task = self
            .tasks
            .create(&project.id, TaskType::GenerateDescriptions, pages.len() as u32)
            .await?;
        let tracker = self.tasks.tracker(&task);
        let worker = self.clone();
        let project = project.clone();
        self.tasks.spawn(task.id.clone(), async move {
            worker.run_descriptions(project, pages, tracker).await
        });
        Ok(task)
    }

    async fn run_descriptions(
        self,
        project: Project,
        pages: Vec<Page>,
        tracker: ProgressTracker,
    ) -> AppResult<TaskProgress> {
        let context = Arc::new(ProjectContext::from(&project));
        let outline = Arc::new(outline_from_pages(&pages));
        let semaphore = Arc::new(Semaphore::new(self.limits.descriptions));
        let mut workers = JoinSet::new();

        for (index, page) in pages.into_iter().enumerate() {
            let worker = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let context = Arc::clone(&context);
            let outline = Arc::clone(&outline);
            let tracker = tracker.clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outline_page = OutlinePage::from_page(&page);
                let result = worker
                    .describe_page(&context, &outline, &page.id, &outline_page, index + 1)
                    .await;
                if let Err(err) = &result {
                    warn!(page_id = %page.id, "Description generation failed: {err}");
                    worker.mark_page(&page.id, PageStatus::Failed).await;
                }
                tracker.record(result.is_ok()).await;
            });
        }
        drain(&mut workers).await;

        self.set_project_status(&project.id, ProjectStatus::DescriptionsGenerated)
            .await?;
        Ok(tracker.snapshot().await)
    }

    async fn describe_page(
        &self,
        context: &ProjectContext,
        outline: &[OutlineItem],
        page_id: &str,
        outline_page: &OutlinePage,
        page_index: usize,
    ) -> AppResult<String> {
        let text = self
            .ai
            .generate_page_description(context, outline, outline_page, page_index)
            .await?;
        let content = description_json(&text)?;
        let page_id = page_id.to_string();
        self.db
            .call(move |conn| {
                queries::set_page_description(conn, &page_id, &content, PageStatus::DescriptionGenerated)
            })
            .await?;
        Ok(text)
    }

    async fn mark_page(&self, page_id: &str, status: PageStatus) {
        let id = page_id.to_string();
        if let Err(err) = self
            .db
            .call(move |conn| queries::set_page_status(conn, &id, status))
            .await
        {
            error!(page_id = %page_id, "Failed to update page status: {err}");
        }
    }

    /// Generates the description of one page synchronously.
    pub async fn generate_page_description(&self, project: &Project, page_id: &str) -> AppResult<Page> {
        let pages = self.pages(&project.id).await?;
        let index = pages
            .iter()
            .position(|page| page.id == page_id)
            .ok_or_else(|| AppError::not_found("Page not found"))?;
        let outline = outline_from_pages(&pages);
        self.describe_page(
            &ProjectContext::from(project),
            &outline,
            page_id,
            &OutlinePage::from_page(&pages[index]),
            index + 1,
        )
        .await?;
        self.page(&project.id, page_id).await
    }

    async fn page(&self, project_id: &str, page_id: &str) -> AppResult<Page> {
        let (project_id, page_id) = (project_id.to_string(), page_id.to_string());
        self.db
            .call(move |conn| queries::get_page(conn, &project_id, &page_id))
            .await?
            .ok_or_else(|| AppError::not_found("Page not found"))
    }

    /// Refines every page description and assigns the results in page order.
    pub async fn refine_descriptions(
        &self,
        project: &Project,
        requirement: &str,
        previous: &[String],
    ) -> AppResult<Vec<Page>> {
        let pages = self.pages(&project.id).await?;
        if pages.is_empty() {
            return Err(AppError::bad_request("Project has no pages"));
        }
        let current: Vec<DescriptionEntry> = pages
            .iter()
            .enumerate()
            .map(|(index, page)| DescriptionEntry {
                index: index + 1,
                title: page.outline().map(|outline| outline.title).unwrap_or_default(),
                description: page.description_text(),
            })
            .collect();
        let outline = outline_from_pages(&pages);
        let refined = self
            .ai
            .refine_descriptions(
                &current,
                requirement,
                &ProjectContext::from(project),
                &outline,
                previous,
            )
            .await?;
        if refined.len() != pages.len() {
            warn!(
                project_id = %project.id,
                pages = pages.len(),
                descriptions = refined.len(),
                "Refined description count does not match the pages"
            );
        }

        let updates = pages
            .iter()
            .zip(refined.iter())
            .map(|(page, text)| Ok((page.id.clone(), description_json(text)?)))
            .collect::<AppResult<Vec<_>>>()?;
        self.db
            .call(move |conn| {
                for (page_id, content) in &updates {
                    queries::set_page_description(conn, page_id, content, PageStatus::DescriptionGenerated)?;
                }
                Ok(())
            })
            .await?;
        self.set_project_status(&project.id, ProjectStatus::DescriptionsGenerated)
            .await?;
        self.pages(&project.id).await
    }

    /// Starts a `GENERATE_IMAGES` task for `page_ids`, or every page.
    pub async fn start_images(&self, project: &Project, page_ids: Option<&[String]>) -> AppResult<Task> {
        let pages = self.pages(&project.id).await?;
        if pages.is_empty() {
            return Err(AppError::bad_request("Project has no pages"));
        }

        let mut jobs = Vec::new();
        for (index, page) in pages.iter().enumerate() {
            if let Some(ids) = page_ids {
                if !ids.iter().any(|id| *id == page.id) {
                    continue;
                }
            }
            let description = page.description_text().ok_or_else(|| {
                AppError::bad_request(format!("Page {} has no description", index + 1))
            })?;
            jobs.push(ImageJob {
                page_id: page.id.clone(),
                page_index: index + 1,
                outline_page: OutlinePage::from_page(page),
                description,
            });
        }
        if jobs.is_empty() {
            return Err(AppError::bad_request("No matching pages to generate"));
        }

        let task = self
            .tasks
            .create(&project.id, TaskType::GenerateImages, jobs.len() as u32)
            .await?;
        self.set_project_status(&project.id, ProjectStatus::GeneratingImages)
            .await?;
        for job in &jobs {
            self.mark_page(&job.page_id, PageStatus::Generating).await;
        }

        let tracker = self.tasks.tracker(&task);
        let worker = self.clone();
        let project = project.clone();
        let outline = outline_from_pages(&pages);
        self.tasks.spawn(task.id.clone(), async move {
            worker.run_images(project, outline, jobs, tracker).await
        });
        Ok(task)
    }

    async fn run_images(
        self,
        project: Project,
        outline: Vec<OutlineItem>,
        jobs: Vec<ImageJob>,
        tracker: ProgressTracker,
    ) -> AppResult<TaskProgress> {
        let project = Arc::new(project);
        let outline = Arc::new(outline);
        let semaphore = Arc::new(Semaphore::new(self.limits.images));
        let mut workers = JoinSet::new();

        for job in jobs {
            let worker = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let project = Arc::clone(&project);
            let outline = Arc::clone(&outline);
            let tracker = tracker.clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let result = worker.render_page(&project, &outline, &job).await;
                if let Err(err) = &result {
                    warn!(page_id = %job.page_id, "Image generation failed: {err}");
                    worker.mark_page(&job.page_id, PageStatus::Failed).await;
                }
                tracker.record(result.is_ok()).await;
            });
        }
        drain(&mut workers).await;

        self.set_project_status(&project.id, ProjectStatus::Completed)
            .await?;
        Ok(tracker.snapshot().await)
    }

    fn template_path(&self, project: &Project) -> Option<PathBuf> {
        let relative = project.template_image_path.as_deref()?;
        let path = self.files.absolute(relative)?;
        if path.is_file() {
            Some(path)
        } else {
            warn!(project_id = %project.id, "Template image is missing on disk");
            None
        }
    }

    async fn render_page(
        &self,
        project: &Project,
        outline: &[OutlineItem],
        job: &ImageJob,
    ) -> AppResult<PageImageVersion> {
        let template = self.template_path(project);
        let material_urls = extract_image_urls_from_markdown(&job.description);
        let prompt = self.ai.generate_image_prompt(
            outline,
            &job.outline_page,
            &job.description,
            job.page_index,
            !material_urls.is_empty(),
            template.is_some(),
            project.extra_requirements.as_deref(),
            project.template_style.as_deref(),
        );
        let generated = self
            .ai
            .generate_image(&prompt, template.as_deref(), &material_urls)
            .await?;
        self.store_image(&project.id, &job.page_id, &generated.bytes)
            .await
    }

    /// Decodes provider output and records it as the page's next version.
    /// The version number is reserved before any file is written so
    /// concurrent tasks on one page never share a file name.
    async fn store_image(&self, project_id: &str, page_id: &str, bytes: &[u8]) -> AppResult<PageImageVersion> {
        let image = image::load_from_memory(bytes)?;
        let (project, page) = (project_id.to_string(), page_id.to_string());
        let reserved = self
            .db
            .call(move |conn| {
                queries::reserve_image_version(conn, &page, |n| page_image_path(&project, &page, n))
            })
            .await?;

        let saved = match self
            .files
            .save_generated_image(project_id, page_id, reserved.version_number, image)
            .await
        {
            Ok(saved) => saved,
            Err(err) => {
                let id = reserved.id.clone();
                if let Err(cleanup) = self
                    .db
                    .call(move |conn| queries::discard_image_version(conn, &id))
                    .await
                {
                    warn!(page_id = %page_id, "Failed to drop image version reservation: {cleanup}");
                }
                return Err(err);
            }
        };

        let id = reserved.id.clone();
        let version = self
            .db
            .call(move |conn| {
                queries::complete_image_version(conn, &id, saved.cached_image_path.as_deref())
            })
            .await?;
        info!(page_id = %page_id, version = version.version_number, "Page image saved");
        Ok(version)
    }

    /// Starts an `EDIT_IMAGE` task that applies `instruction` to the page's
    /// current image.
    pub async fn start_edit(&self, project: &Project, page_id: &str, instruction: &str) -> AppResult<Task> {
        let page = self.page(&project.id, page_id).await?;
        let current = page
            .generated_image_path
            .as_deref()
            .and_then(|relative| self.files.absolute(relative))
            .filter(|path| path.is_file())
            .ok_or_else(|| AppError::bad_request("Page has no image to edit"))?;

        let task = self
            .tasks
            .create(&project.id, TaskType::EditImage, 1)
            .await?;
        self.mark_page(&page.id, PageStatus::Generating).await;

        let tracker = self.tasks.tracker(&task);
        let worker = self.clone();
        let project_id = project.id.clone();
        let instruction = instruction.to_string();
        self.tasks.spawn(task.id.clone(), async move {
            let description = page.description_text();
            let references = description
                .as_deref()
                .map(extract_image_urls_from_markdown)
                .unwrap_or_default();
            let result = async {
                let generated = worker
                    .ai
                    .edit_image(&instruction, &current, description.as_deref(), &references)
                    .await?;
                worker.store_image(&project_id, &page.id, &generated.bytes).await
            }
            .await;
            if let Err(err) = &result {
                warn!(page_id = %page.id, "Image edit failed: {err}");
                worker.mark_page(&page.id, PageStatus::Failed).await;
            }
            Ok(tracker.record(result.is_ok()).await)
        });
        Ok(task)
    }
}

async fn drain(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            error!("Generation worker panicked: {err}");
        }
    }
}
