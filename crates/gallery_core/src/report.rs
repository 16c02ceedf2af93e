use serde::{Deserialize, Serialize};

use crate::{HarvestReport, HeroImage};

/// Per-page JSON record handed to the report generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub page_name: String,
    pub url: String,
    pub hero_image: Option<HeroImage>,
    pub projects: Vec<ProjectRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageRecord {
    pub fn new(page_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            page_name: page_name.into(),
            url: url.into(),
            hero_image: None,
            projects: Vec::new(),
            error: None,
        }
    }

    pub fn failed(
        page_name: impl Into<String>,
        url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(page_name, url)
        }
    }

    pub fn total_photos(&self) -> usize {
        self.projects.iter().map(|p| p.found_photos).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub project_number: usize,
    pub title: String,
    pub description: String,
    pub found_photos: usize,
    pub images: Vec<ImageRecord>,
}

impl ProjectRecord {
    pub fn from_report(
        project_number: usize,
        title: impl Into<String>,
        description: impl Into<String>,
        report: &HarvestReport,
    ) -> Self {
        let images: Vec<ImageRecord> = report
            .result
            .entries()
            .iter()
            .map(|entry| ImageRecord {
                index: entry.position,
                url: entry.url.raw().to_string(),
                alt: entry.label.clone().unwrap_or_default(),
            })
            .collect();
        Self {
            project_number,
            title: title.into(),
            description: description.into(),
            found_photos: images.len(),
            images,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub index: usize,
    pub url: String,
    pub alt: String,
}

/// Run-level summary written next to the per-page records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestSummary {
    pub extracted_at: String,
    pub total_pages: usize,
    pub pages: Vec<PageRecord>,
}

/// One resource for the fetcher, in download order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub url: String,
    /// Relative path without extension, e.g. `kitchen-renovation/project-2/03`.
    pub filename_hint: String,
}

/// Lowercase, dash-separated page name usable as a directory or file stem.
pub fn page_slug(page_name: &str) -> String {
    let mut slug = String::with_capacity(page_name.len());
    for c in page_name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "page".to_string()
    } else {
        slug
    }
}

/// Orders every resource of a page for download: hero first, then each
/// project's images in discovery order.
pub fn fetch_plan(page: &PageRecord) -> Vec<FetchTarget> {
    let slug = page_slug(&page.page_name);
    let mut targets = Vec::with_capacity(page.total_photos() + 1);
    if let Some(hero) = &page.hero_image {
        targets.push(FetchTarget {
            url: hero.url.clone(),
            filename_hint: format!("{slug}/hero"),
        });
    }
    for project in &page.projects {
        for image in &project.images {
            targets.push(FetchTarget {
                url: image.url.clone(),
                filename_hint: format!(
                    "{slug}/project-{}/{:02}",
                    project.project_number, image.index
                ),
            });
        }
    }
    targets
}
