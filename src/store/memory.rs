//! In-memory datastore implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::RuleError;
use crate::model::{
    CaptureJob, CapturedPage, ObfuscationRule, Project, TagManagerConfig, Version,
};
use crate::obfuscation;

use super::Datastore;

#[derive(Default)]
struct Tables {
    projects: Vec<Project>,
    versions: Vec<Version>,
    pages: Vec<CapturedPage>,
    rules: Vec<ObfuscationRule>,
    jobs: Vec<CaptureJob>,
    tag_managers: HashMap<Uuid, TagManagerConfig>,
}

/// Process-local [`Datastore`] used by tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_project(&self, project: Project) {
        self.tables.lock().await.projects.push(project);
    }

    pub async fn insert_version(&self, version: Version) {
        self.tables.lock().await.versions.push(version);
    }

    pub async fn set_tag_manager(&self, project_id: Uuid, config: TagManagerConfig) {
        self.tables
            .lock()
            .await
            .tag_managers
            .insert(project_id, config);
    }

    pub async fn rule_count(&self) -> usize {
        self.tables.lock().await.rules.len()
    }

    pub async fn page_count(&self) -> usize {
        self.tables.lock().await.pages.len()
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn project_by_subdomain(&self, subdomain: &str) -> anyhow::Result<Option<Project>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .projects
            .iter()
            .find(|p| p.subdomain == subdomain)
            .cloned())
    }

    async fn latest_active_version(&self, project_id: Uuid) -> anyhow::Result<Option<Version>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .versions
            .iter()
            .filter(|v| {
                v.project_id == project_id
                    && v.status == crate::model::VersionStatus::Active
            })
            .max_by_key(|v| v.created_at)
            .cloned())
    }

    async fn pages_for_version(&self, version_id: Uuid) -> anyhow::Result<Vec<CapturedPage>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .pages
            .iter()
            .filter(|p| p.version_id == version_id)
            .cloned()
            .collect())
    }

    async fn insert_page(&self, page: CapturedPage) -> anyhow::Result<()> {
        self.tables.lock().await.pages.push(page);
        Ok(())
    }

    async fn active_rules(&self, project_id: Uuid) -> anyhow::Result<Vec<ObfuscationRule>> {
        let tables = self.tables.lock().await;
        let mut rules: Vec<ObfuscationRule> = tables
            .rules
            .iter()
            .filter(|r| r.project_id == project_id && r.is_active)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.ordinal);
        Ok(rules)
    }

    async fn create_rule(&self, rule: ObfuscationRule) -> anyhow::Result<Result<(), RuleError>> {
        if let Err(rejection) = obfuscation::validate(&rule) {
            return Ok(Err(rejection));
        }
        self.tables.lock().await.rules.push(rule);
        Ok(Ok(()))
    }

    async fn update_rule(&self, rule: ObfuscationRule) -> anyhow::Result<Result<(), RuleError>> {
        if let Err(rejection) = obfuscation::validate(&rule) {
            return Ok(Err(rejection));
        }
        let mut tables = self.tables.lock().await;
        match tables.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => {
                *existing = rule;
                Ok(Ok(()))
            }
            None => Err(anyhow::anyhow!("no rule with id {}", rule.id)),
        }
    }

    async fn tag_manager_config(
        &self,
        project_id: Uuid,
    ) -> anyhow::Result<Option<TagManagerConfig>> {
        let tables = self.tables.lock().await;
        Ok(tables.tag_managers.get(&project_id).cloned())
    }

    async fn create_capture_job(&self, job: CaptureJob) -> anyhow::Result<()> {
        self.tables.lock().await.jobs.push(job);
        Ok(())
    }

    async fn capture_job(&self, job_id: Uuid) -> anyhow::Result<Option<CaptureJob>> {
        let tables = self.tables.lock().await;
        Ok(tables.jobs.iter().find(|j| j.id == job_id).cloned())
    }
}
