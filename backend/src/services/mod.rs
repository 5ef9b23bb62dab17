//! Module for core business logic services.
//!
//! This module encapsulates the services that perform the generation
//! workflow and orchestrate interactions between the database, the upload
//! folder and the AI providers: prompt building, provider caching, file
//! storage, background tasks and the persisted settings.

pub mod ai_registry;
pub mod ai_service;
pub mod file_service;
pub mod generation;
pub mod prompts;
pub mod settings;
pub mod task_manager;
