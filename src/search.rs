use anyhow::{anyhow, Result};

use crate::api::JobTrackerApi;
use crate::models::{JobListing, NewApplication, RecordId, SavedJob, SearchParams, TrackingDraft};
use crate::notice::Notices;

pub const PAGE_SIZE: u64 = 10;

pub fn page_count(total_results: u64) -> u64 {
    total_results.div_ceil(PAGE_SIZE)
}

/// Opens an external URL, e.g. an employer's application form.
pub trait UrlOpener {
    fn open(&self, url: &str) -> Result<()>;
}

pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        #[cfg(target_os = "macos")]
        let result = std::process::Command::new("open").arg(url).spawn();
        #[cfg(target_os = "windows")]
        let result = std::process::Command::new("explorer").arg(url).spawn();
        #[cfg(all(unix, not(target_os = "macos")))]
        let result = std::process::Command::new("xdg-open").arg(url).spawn();

        result
            .map(|_| ())
            .map_err(|e| anyhow!("Failed to open {}: {}", url, e))
    }
}

#[derive(Debug, Default)]
pub struct JobSearch {
    params: SearchParams,
    jobs: Vec<JobListing>,
    total_results: u64,
    pub notices: Notices,
}

impl JobSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[JobListing] {
        &self.jobs
    }

    pub fn total_results(&self) -> u64 {
        self.total_results
    }

    pub fn current_page(&self) -> u32 {
        self.params.page
    }

    pub fn page_count(&self) -> u64 {
        page_count(self.total_results)
    }

    pub fn job(&self, id: &RecordId) -> Option<&JobListing> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    /// A new query always starts from page 1.
    pub fn search(&mut self, api: &dyn JobTrackerApi, params: SearchParams) -> bool {
        self.params = SearchParams { page: 1, ..params };
        self.fetch(api)
    }

    /// A fresh query that starts on `start_page` instead of the first.
    pub fn search_from(&mut self, api: &dyn JobTrackerApi, params: SearchParams, start_page: u32) -> bool {
        self.params = SearchParams {
            page: start_page.max(1),
            ..params
        };
        self.fetch(api)
    }

    pub fn go_to_page(&mut self, api: &dyn JobTrackerApi, page: u32) -> bool {
        self.params.page = page.max(1);
        self.fetch(api)
    }

    fn fetch(&mut self, api: &dyn JobTrackerApi) -> bool {
        match api.search_jobs(&self.params) {
            Ok(page) => {
                tracing::debug!(
                    page = self.params.page,
                    total = page.total_results,
                    "search results"
                );
                self.jobs = page.jobs;
                self.total_results = page.total_results;
                true
            }
            Err(e) => {
                self.notices.error(format!("Failed to fetch jobs: {}", e));
                false
            }
        }
    }

    /// Flip the saved flag on screen, then tell the server. A refused call
    /// puts the flag back.
    pub fn toggle_saved(&mut self, api: &dyn JobTrackerApi, id: &RecordId) -> bool {
        let Some(index) = self.jobs.iter().position(|j| &j.id == id) else {
            self.notices.error(format!("Job {} is not in the current results", id));
            return false;
        };
        let was_saved = self.jobs[index].is_saved;
        self.jobs[index].is_saved = !was_saved;

        let result = if was_saved {
            api.unsave_job(id)
        } else {
            let mut listing = self.jobs[index].clone();
            listing.is_saved = false;
            api.save_job(&listing)
        };

        match result {
            Ok(()) => {
                if was_saved {
                    self.notices.success("Job removed from saved jobs");
                } else {
                    self.notices.success("Job saved successfully");
                }
                true
            }
            Err(e) => {
                if let Some(job) = self.jobs.iter_mut().find(|j| &j.id == id) {
                    job.is_saved = was_saved;
                }
                let action = if was_saved { "remove job" } else { "save job" };
                self.notices.error(format!("Failed to {}: {}", action, e));
                false
            }
        }
    }

    /// Track first, then send the user to the employer. Nothing opens if
    /// tracking fails.
    pub fn track_and_apply(
        &mut self,
        api: &dyn JobTrackerApi,
        id: &RecordId,
        draft: &TrackingDraft,
        opener: &dyn UrlOpener,
    ) -> bool {
        let Some(job) = self.job(id).cloned() else {
            self.notices.error(format!("Job {} is not in the current results", id));
            return false;
        };

        let payload = NewApplication::from_listing(&job, draft);
        if let Err(e) = api.create_application(&payload) {
            self.notices.error(format!("Failed to track application: {}", e));
            return false;
        }
        self.notices.success("Application tracked successfully");

        match job.application_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                if let Err(e) = opener.open(url) {
                    self.notices.error(e.to_string());
                }
            }
            None => self
                .notices
                .error(format!("{} has no application link", job.title)),
        }
        true
    }
}

#[derive(Debug, Default)]
pub struct SavedJobs {
    jobs: Vec<SavedJob>,
    pub notices: Notices,
}

impl SavedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[SavedJob] {
        &self.jobs
    }

    pub fn load(&mut self, api: &dyn JobTrackerApi) -> bool {
        match api.saved_jobs() {
            Ok(jobs) => {
                self.jobs = jobs;
                true
            }
            Err(e) => {
                self.notices.error(format!("Failed to fetch saved jobs: {}", e));
                false
            }
        }
    }

    pub fn unsave(&mut self, api: &dyn JobTrackerApi, id: &RecordId) -> bool {
        match api.unsave_job(id) {
            Ok(()) => {
                self.jobs.retain(|s| &s.job.id != id);
                self.notices.success("Job removed from saved jobs");
                true
            }
            Err(e) => {
                self.notices.error(format!("Failed to remove job: {}", e));
                false
            }
        }
    }
}
