//! Database query functions (Data Access Objects).
//!
//! All functions are synchronous and take a `&Connection`; callers run them
//! through [`Database::call`](super::Database::call). Multi-statement writes
//! use `unchecked_transaction` so they stay atomic.
//!
//! Tenant scoping: functions taking `tenant: Option<&str>` filter by
//! `user_id` when it is `Some` and see every row when it is `None`.

use super::models::{
    AllowedEmail, Material, Page, PageImageVersion, PageStatus, Project, ProjectStatus, Settings,
    Task, TaskProgress, TaskStatus, User, UserTemplate,
};
use super::DbResult;
use crate::utils::{new_id, now};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

/// Identity fields used to sync a user on login.
#[derive(Debug, Clone)]
pub struct UserSync<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub display_name: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
}

/// Creates the user on first login; afterwards refreshes `last_login_at` and
/// any non-empty profile fields.
pub fn get_or_create_user(conn: &Connection, sync: &UserSync<'_>) -> DbResult<User> {
    let timestamp = now();
    let display_name = sync.display_name.filter(|value| !value.is_empty());
    let avatar_url = sync.avatar_url.filter(|value| !value.is_empty());

    conn.execute(
        "INSERT INTO users (id, email, display_name, avatar_url, created_at, last_login_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(id) DO UPDATE SET
            email = excluded.email,
            display_name = COALESCE(excluded.display_name, users.display_name),
            avatar_url = COALESCE(excluded.avatar_url, users.avatar_url),
            last_login_at = excluded.last_login_at",
        params![sync.id, sync.email, display_name, avatar_url, timestamp],
    )?;

    let user = conn.query_row(
        "SELECT * FROM users WHERE id = ?1",
        [sync.id],
        User::from_row,
    )?;
    Ok(user)
}

pub fn get_user(conn: &Connection, id: &str) -> DbResult<Option<User>> {
    let user = conn
        .query_row("SELECT * FROM users WHERE id = ?1", [id], User::from_row)
        .optional()?;
    Ok(user)
}

// ---------------------------------------------------------------------------
// projects
// ---------------------------------------------------------------------------

pub fn insert_project(conn: &Connection, project: &Project) -> DbResult<()> {
    conn.execute(
        "INSERT INTO projects (
            id, user_id, creation_type, idea_prompt, outline_text, description_text,
            extra_requirements, template_style, template_image_path, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            project.id,
            project.user_id,
            project.creation_type,
            project.idea_prompt,
            project.outline_text,
            project.description_text,
            project.extra_requirements,
            project.template_style,
            project.template_image_path,
            project.status,
            project.created_at,
            project.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_project(conn: &Connection, id: &str, tenant: Option<&str>) -> DbResult<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT * FROM projects WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
            params![id, tenant],
            Project::from_row,
        )
        .optional()?;
    Ok(project)
}

/// Newest-updated first.
pub fn list_projects(
    conn: &Connection,
    tenant: Option<&str>,
    limit: u32,
    offset: u32,
) -> DbResult<Vec<Project>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM projects
         WHERE (?1 IS NULL OR user_id = ?1)
         ORDER BY updated_at DESC, rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let projects = stmt
        .query_map(params![tenant, limit, offset], Project::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

/// Writes every mutable project column and bumps `updated_at`.
pub fn update_project(conn: &Connection, project: &Project) -> DbResult<()> {
    conn.execute(
        "UPDATE projects SET
            idea_prompt = ?2,
            outline_text = ?3,
            description_text = ?4,
            extra_requirements = ?5,
            template_style = ?6,
            template_image_path = ?7,
            status = ?8,
            updated_at = ?9
         WHERE id = ?1",
        params![
            project.id,
            project.idea_prompt,
            project.outline_text,
            project.description_text,
            project.extra_requirements,
            project.template_style,
            project.template_image_path,
            project.status,
            now(),
        ],
    )?;
    Ok(())
}

pub fn set_project_status(conn: &Connection, id: &str, status: ProjectStatus) -> DbResult<()> {
    conn.execute(
        "UPDATE projects SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status, now()],
    )?;
    Ok(())
}

pub fn touch_project(conn: &Connection, id: &str) -> DbResult<()> {
    conn.execute(
        "UPDATE projects SET updated_at = ?2 WHERE id = ?1",
        params![id, now()],
    )?;
    Ok(())
}

/// Deletes the project; pages, versions, tasks and materials cascade.
pub fn delete_project(conn: &Connection, id: &str) -> DbResult<bool> {
    let removed = conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

// ---------------------------------------------------------------------------
// pages
// ---------------------------------------------------------------------------

/// Values for a page created from an outline.
#[derive(Debug, Clone, Default)]
pub struct NewPage {
    pub part: Option<String>,
    pub outline_content: Option<String>,
    pub description_content: Option<String>,
    pub status: Option<PageStatus>,
}

fn build_page(project_id: &str, order_index: i64, new_page: NewPage) -> Page {
    let timestamp = now();
    Page {
        id: new_id(),
        project_id: project_id.to_string(),
        order_index,
        part: new_page.part,
        outline_content: new_page.outline_content,
        description_content: new_page.description_content,
        generated_image_path: None,
        cached_image_path: None,
        status: new_page.status.unwrap_or(PageStatus::Draft),
        created_at: timestamp,
        updated_at: timestamp,
    }
}

fn write_new_page(conn: &Connection, page: &Page) -> DbResult<()> {
    conn.execute(
        "INSERT INTO pages (
            id, project_id, order_index, part, outline_content, description_content,
            generated_image_path, cached_image_path, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            page.id,
            page.project_id,
            page.order_index,
            page.part,
            page.outline_content,
            page.description_content,
            page.generated_image_path,
            page.cached_image_path,
            page.status,
            page.created_at,
            page.updated_at,
        ],
    )?;
    Ok(())
}

/// Pages of a project ordered by `order_index`.
pub fn list_pages(conn: &Connection, project_id: &str) -> DbResult<Vec<Page>> {
    let mut stmt =
        conn.prepare("SELECT * FROM pages WHERE project_id = ?1 ORDER BY order_index ASC")?;
    let pages = stmt
        .query_map([project_id], Page::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pages)
}

pub fn get_page(conn: &Connection, project_id: &str, page_id: &str) -> DbResult<Option<Page>> {
    let page = conn
        .query_row(
            "SELECT * FROM pages WHERE id = ?1 AND project_id = ?2",
            params![page_id, project_id],
            Page::from_row,
        )
        .optional()?;
    Ok(page)
}

/// Inserts a page at `order_index` (clamped to `0..=n`, default append) and
/// shifts later pages down by one.
pub fn insert_page_at(
    conn: &Connection,
    project_id: &str,
    order_index: Option<i64>,
    new_page: NewPage,
) -> DbResult<Page> {
    let tx = conn.unchecked_transaction()?;
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM pages WHERE project_id = ?1",
        [project_id],
        |row| row.get(0),
    )?;
    let index = order_index.unwrap_or(count).clamp(0, count);

    tx.execute(
        "UPDATE pages SET order_index = order_index + 1
         WHERE project_id = ?1 AND order_index >= ?2",
        params![project_id, index],
    )?;
    let page = build_page(project_id, index, new_page);
    write_new_page(&tx, &page)?;
    tx.commit()?;
    Ok(page)
}

/// Replaces every page of a project with `pages`, in order.
pub fn replace_pages(conn: &Connection, project_id: &str, pages: Vec<NewPage>) -> DbResult<Vec<Page>> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM pages WHERE project_id = ?1", [project_id])?;
    let mut created = Vec::with_capacity(pages.len());
    for (index, new_page) in pages.into_iter().enumerate() {
        let page = build_page(project_id, index as i64, new_page);
        write_new_page(&tx, &page)?;
        created.push(page);
    }
    tx.execute(
        "UPDATE projects SET updated_at = ?2 WHERE id = ?1",
        params![project_id, now()],
    )?;
    tx.commit()?;
    Ok(created)
}

/// Writes every mutable page column and bumps `updated_at`.
pub fn update_page(conn: &Connection, page: &Page) -> DbResult<()> {
    conn.execute(
        "UPDATE pages SET
            part = ?2,
            outline_content = ?3,
            description_content = ?4,
            generated_image_path = ?5,
            cached_image_path = ?6,
            status = ?7,
            updated_at = ?8
         WHERE id = ?1",
        params![
            page.id,
            page.part,
            page.outline_content,
            page.description_content,
            page.generated_image_path,
            page.cached_image_path,
            page.status,
            now(),
        ],
    )?;
    Ok(())
}

pub fn set_page_status(conn: &Connection, page_id: &str, status: PageStatus) -> DbResult<()> {
    conn.execute(
        "UPDATE pages SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![page_id, status, now()],
    )?;
    Ok(())
}

pub fn set_page_description(
    conn: &Connection,
    page_id: &str,
    description_content: &str,
    status: PageStatus,
) -> DbResult<()> {
    conn.execute(
        "UPDATE pages SET description_content = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        params![page_id, description_content, status, now()],
    )?;
    Ok(())
}

/// Deletes a page and renumbers the remaining pages to `0..n-1`.
pub fn delete_page(conn: &Connection, project_id: &str, page_id: &str) -> DbResult<bool> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute(
        "DELETE FROM pages WHERE id = ?1 AND project_id = ?2",
        params![page_id, project_id],
    )?;
    if removed > 0 {
        compact_order(&tx, project_id)?;
    }
    tx.commit()?;
    Ok(removed > 0)
}

fn compact_order(conn: &Connection, project_id: &str) -> DbResult<()> {
    let ids: Vec<String> = conn
        .prepare("SELECT id FROM pages WHERE project_id = ?1 ORDER BY order_index ASC")?
        .query_map([project_id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    for (index, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE pages SET order_index = ?2 WHERE id = ?1",
            params![id, index as i64],
        )?;
    }
    Ok(())
}

/// Applies a new page order. Returns `false` (and changes nothing) unless
/// `order` lists each page of the project exactly once.
pub fn reorder_pages(conn: &Connection, project_id: &str, order: &[String]) -> DbResult<bool> {
    let tx = conn.unchecked_transaction()?;
    let existing: HashSet<String> = tx
        .prepare("SELECT id FROM pages WHERE project_id = ?1")?
        .query_map([project_id], |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    let requested: HashSet<&String> = order.iter().collect();

    if requested.len() != order.len()
        || order.len() != existing.len()
        || !order.iter().all(|id| existing.contains(id))
    {
        return Ok(false);
    }

    let timestamp = now();
    for (index, id) in order.iter().enumerate() {
        tx.execute(
            "UPDATE pages SET order_index = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, index as i64, timestamp],
        )?;
    }
    tx.commit()?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// page image versions
// ---------------------------------------------------------------------------

/// Newest first.
pub fn list_image_versions(conn: &Connection, page_id: &str) -> DbResult<Vec<PageImageVersion>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM page_image_versions WHERE page_id = ?1 ORDER BY version_number DESC",
    )?;
    let versions = stmt
        .query_map([page_id], PageImageVersion::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

/// Claims the page's next version number by inserting a version row that is
/// not current yet. `image_path` names the file for the claimed number.
pub fn reserve_image_version(
    conn: &Connection,
    page_id: &str,
    image_path: impl FnOnce(i64) -> String,
) -> DbResult<PageImageVersion> {
    let tx = conn.unchecked_transaction()?;
    let max: i64 = tx.query_row(
        "SELECT COALESCE(MAX(version_number), 0) FROM page_image_versions WHERE page_id = ?1",
        [page_id],
        |row| row.get(0),
    )?;
    let version_number = max + 1;
    let version = PageImageVersion {
        id: new_id(),
        page_id: page_id.to_string(),
        image_path: image_path(version_number),
        cached_image_path: None,
        version_number,
        is_current: false,
        created_at: now(),
    };
    tx.execute(
        "INSERT INTO page_image_versions (
            id, page_id, image_path, cached_image_path, version_number, is_current, created_at
         ) VALUES (?1, ?2, ?3, NULL, ?4, 0, ?5)",
        params![
            version.id,
            version.page_id,
            version.image_path,
            version.version_number,
            version.created_at,
        ],
    )?;
    tx.commit()?;
    Ok(version)
}

/// Makes a reserved version the page's current image once its files exist
/// and marks the page `COMPLETED`.
pub fn complete_image_version(
    conn: &Connection,
    version_id: &str,
    cached_image_path: Option<&str>,
) -> DbResult<PageImageVersion> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE page_image_versions SET cached_image_path = ?2 WHERE id = ?1",
        params![version_id, cached_image_path],
    )?;
    let mut version = tx.query_row(
        "SELECT * FROM page_image_versions WHERE id = ?1",
        [version_id],
        PageImageVersion::from_row,
    )?;
    tx.execute(
        "UPDATE page_image_versions SET is_current = (id = ?2) WHERE page_id = ?1",
        params![version.page_id, version.id],
    )?;
    tx.execute(
        "UPDATE pages SET generated_image_path = ?2, cached_image_path = ?3, status = ?4, updated_at = ?5
         WHERE id = ?1",
        params![
            version.page_id,
            version.image_path,
            version.cached_image_path,
            PageStatus::Completed,
            now()
        ],
    )?;
    tx.commit()?;
    version.is_current = true;
    Ok(version)
}

/// Drops a reservation whose files could not be written.
pub fn discard_image_version(conn: &Connection, version_id: &str) -> DbResult<()> {
    conn.execute("DELETE FROM page_image_versions WHERE id = ?1", [version_id])?;
    Ok(())
}

/// Makes `version_id` current and points the page at its files. Returns
/// `None` when the version does not belong to the page.
pub fn set_current_version(
    conn: &Connection,
    page_id: &str,
    version_id: &str,
) -> DbResult<Option<PageImageVersion>> {
    let tx = conn.unchecked_transaction()?;
    let Some(mut version) = tx
        .query_row(
            "SELECT * FROM page_image_versions WHERE id = ?1 AND page_id = ?2",
            params![version_id, page_id],
            PageImageVersion::from_row,
        )
        .optional()?
    else {
        return Ok(None);
    };

    tx.execute(
        "UPDATE page_image_versions SET is_current = (id = ?2) WHERE page_id = ?1",
        params![page_id, version_id],
    )?;
    tx.execute(
        "UPDATE pages SET generated_image_path = ?2, cached_image_path = ?3, updated_at = ?4
         WHERE id = ?1",
        params![page_id, version.image_path, version.cached_image_path, now()],
    )?;
    tx.commit()?;
    version.is_current = true;
    Ok(Some(version))
}

// ---------------------------------------------------------------------------
// tasks
// ---------------------------------------------------------------------------

pub fn insert_task(conn: &Connection, task: &Task) -> DbResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            id, project_id, task_type, status, progress, error_message, created_at, completed_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            task.id,
            task.project_id,
            task.task_type,
            task.status,
            serde_json::to_string(&task.progress)?,
            task.error_message,
            task.created_at,
            task.completed_at,
        ],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, project_id: &str, task_id: &str) -> DbResult<Option<Task>> {
    let task = conn
        .query_row(
            "SELECT * FROM tasks WHERE id = ?1 AND project_id = ?2",
            params![task_id, project_id],
            Task::from_row,
        )
        .optional()?;
    Ok(task)
}

pub fn update_task_progress(conn: &Connection, task_id: &str, progress: &TaskProgress) -> DbResult<()> {
    conn.execute(
        "UPDATE tasks SET progress = ?2 WHERE id = ?1",
        params![task_id, serde_json::to_string(progress)?],
    )?;
    Ok(())
}

/// Terminal statuses also stamp `completed_at`.
pub fn set_task_status(
    conn: &Connection,
    task_id: &str,
    status: TaskStatus,
    error_message: Option<&str>,
) -> DbResult<()> {
    let completed_at = status.is_terminal().then(now);
    conn.execute(
        "UPDATE tasks SET status = ?2, error_message = COALESCE(?3, error_message), completed_at = ?4
         WHERE id = ?1",
        params![task_id, status, error_message, completed_at],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// user templates
// ---------------------------------------------------------------------------

pub fn insert_user_template(conn: &Connection, template: &UserTemplate) -> DbResult<()> {
    conn.execute(
        "INSERT INTO user_templates (
            id, user_id, name, file_path, thumb_path, file_size, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            template.id,
            template.user_id,
            template.name,
            template.file_path,
            template.thumb_path,
            template.file_size,
            template.created_at,
            template.updated_at,
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn list_user_templates(conn: &Connection, tenant: Option<&str>) -> DbResult<Vec<UserTemplate>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM user_templates
         WHERE (?1 IS NULL OR user_id = ?1)
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let templates = stmt
        .query_map([tenant], UserTemplate::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(templates)
}

pub fn get_user_template(
    conn: &Connection,
    id: &str,
    tenant: Option<&str>,
) -> DbResult<Option<UserTemplate>> {
    let template = conn
        .query_row(
            "SELECT * FROM user_templates WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
            params![id, tenant],
            UserTemplate::from_row,
        )
        .optional()?;
    Ok(template)
}

pub fn delete_user_template(conn: &Connection, id: &str) -> DbResult<bool> {
    let removed = conn.execute("DELETE FROM user_templates WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

// ---------------------------------------------------------------------------
// materials
// ---------------------------------------------------------------------------

/// Which materials a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialScope {
    All,
    Global,
    Project(String),
}

pub fn insert_material(conn: &Connection, material: &Material) -> DbResult<()> {
    conn.execute(
        "INSERT INTO materials (id, project_id, user_id, filename, relative_path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            material.id,
            material.project_id,
            material.user_id,
            material.filename,
            material.relative_path,
            material.created_at,
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn list_materials(
    conn: &Connection,
    tenant: Option<&str>,
    scope: &MaterialScope,
) -> DbResult<Vec<Material>> {
    let (mode, project_id) = match scope {
        MaterialScope::All => ("all", None),
        MaterialScope::Global => ("global", None),
        MaterialScope::Project(id) => ("project", Some(id.as_str())),
    };
    let mut stmt = conn.prepare(
        "SELECT * FROM materials
         WHERE (?1 IS NULL OR user_id = ?1)
           AND (
                ?2 = 'all'
                OR (?2 = 'global' AND project_id IS NULL)
                OR (?2 = 'project' AND project_id = ?3)
           )
         ORDER BY created_at DESC, rowid DESC",
    )?;
    let materials = stmt
        .query_map(params![tenant, mode, project_id], Material::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(materials)
}

pub fn get_material(conn: &Connection, id: &str, tenant: Option<&str>) -> DbResult<Option<Material>> {
    let material = conn
        .query_row(
            "SELECT * FROM materials WHERE id = ?1 AND (?2 IS NULL OR user_id = ?2)",
            params![id, tenant],
            Material::from_row,
        )
        .optional()?;
    Ok(material)
}

pub fn delete_material(conn: &Connection, id: &str) -> DbResult<bool> {
    let removed = conn.execute("DELETE FROM materials WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

// ---------------------------------------------------------------------------
// allowed emails
// ---------------------------------------------------------------------------

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Newest first.
pub fn list_allowed_emails(conn: &Connection) -> DbResult<Vec<AllowedEmail>> {
    let mut stmt =
        conn.prepare("SELECT * FROM allowed_emails ORDER BY created_at DESC, id DESC")?;
    let emails = stmt
        .query_map([], AllowedEmail::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(emails)
}

pub fn count_allowed_emails(conn: &Connection) -> DbResult<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM allowed_emails", [], |row| row.get(0))?;
    Ok(count)
}

/// Idempotent: adding an existing address returns the stored row unchanged.
pub fn add_allowed_email(
    conn: &Connection,
    email: &str,
    added_by: Option<&str>,
) -> DbResult<AllowedEmail> {
    let email = normalize_email(email);
    conn.execute(
        "INSERT OR IGNORE INTO allowed_emails (email, added_by, created_at) VALUES (?1, ?2, ?3)",
        params![email, added_by, now()],
    )?;
    let row = conn.query_row(
        "SELECT * FROM allowed_emails WHERE email = ?1",
        [&email],
        AllowedEmail::from_row,
    )?;
    Ok(row)
}

pub fn remove_allowed_email(conn: &Connection, email: &str) -> DbResult<bool> {
    let removed = conn.execute(
        "DELETE FROM allowed_emails WHERE email = ?1",
        [normalize_email(email)],
    )?;
    Ok(removed > 0)
}

pub fn is_email_allowed(conn: &Connection, email: &str) -> DbResult<bool> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Ok(false);
    }
    let found = conn
        .query_row(
            "SELECT 1 FROM allowed_emails WHERE email = ?1",
            [email],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

// ---------------------------------------------------------------------------
// settings
// ---------------------------------------------------------------------------

pub fn get_settings(conn: &Connection) -> DbResult<Option<Settings>> {
    let settings = conn
        .query_row("SELECT * FROM settings WHERE id = 1", [], Settings::from_row)
        .optional()?;
    Ok(settings)
}

/// Returns the singleton row, inserting `defaults` on first access.
pub fn get_or_create_settings(conn: &Connection, defaults: &Settings) -> DbResult<Settings> {
    if let Some(settings) = get_settings(conn)? {
        return Ok(settings);
    }
    save_settings(conn, defaults)?;
    Ok(defaults.clone())
}

/// Upserts the singleton row.
pub fn save_settings(conn: &Connection, settings: &Settings) -> DbResult<()> {
    conn.execute(
        "INSERT INTO settings (
            id, ai_provider_format, api_base_url, api_key, image_resolution, image_aspect_ratio,
            max_description_workers, max_image_workers, text_model, image_model,
            image_caption_model, mineru_api_base, mineru_token, baidu_ocr_api_key,
            output_language, enable_text_reasoning, text_thinking_budget,
            enable_image_reasoning, image_thinking_budget, created_at, updated_at
         ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
         ON CONFLICT(id) DO UPDATE SET
            ai_provider_format = excluded.ai_provider_format,
            api_base_url = excluded.api_base_url,
            api_key = excluded.api_key,
            image_resolution = excluded.image_resolution,
            image_aspect_ratio = excluded.image_aspect_ratio,
            max_description_workers = excluded.max_description_workers,
            max_image_workers = excluded.max_image_workers,
            text_model = excluded.text_model,
            image_model = excluded.image_model,
            image_caption_model = excluded.image_caption_model,
            mineru_api_base = excluded.mineru_api_base,
            mineru_token = excluded.mineru_token,
            baidu_ocr_api_key = excluded.baidu_ocr_api_key,
            output_language = excluded.output_language,
            enable_text_reasoning = excluded.enable_text_reasoning,
            text_thinking_budget = excluded.text_thinking_budget,
            enable_image_reasoning = excluded.enable_image_reasoning,
            image_thinking_budget = excluded.image_thinking_budget,
            updated_at = excluded.updated_at",
        params![
            settings.ai_provider_format,
            settings.api_base_url,
            settings.api_key,
            settings.image_resolution,
            settings.image_aspect_ratio,
            settings.max_description_workers,
            settings.max_image_workers,
            settings.text_model,
            settings.image_model,
            settings.image_caption_model,
            settings.mineru_api_base,
            settings.mineru_token,
            settings.baidu_ocr_api_key,
            settings.output_language,
            settings.enable_text_reasoning,
            settings.text_thinking_budget,
            settings.enable_image_reasoning,
            settings.image_thinking_budget,
            settings.created_at,
            settings.updated_at,
        ],
    )?;
    Ok(())
}
