//! GitHub source
//!
//! Catalog nodes `repository` and `contributors`, and the time-series node
//! `repositoryStats` (a snapshot of stars and contributor count, recorded
//! for yesterday or today only). Authenticates with a personal access token.

use super::{flatten_object, select_fields};
use crate::auth::{AuthMethod, TokenProvider, ACCESS_TOKEN};
use crate::config::{Attribute, Configuration, Parameter};
use crate::error::{Error, Result};
use crate::runtime::{FetchRequest, HostRuntime};
use crate::schema::{FieldType, NodeSchema};
use crate::source::{BatchReady, FetchContext, Source};
use crate::types::{JsonValue, Row};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;

pub const GITHUB_API_URL: &str = "https://api.github.com";

const REPOSITORY_NAME: &str = "RepositoryName";
const PER_PAGE: usize = 100;

/// GitHub REST API source
#[derive(Debug, Clone)]
pub struct GitHubSource {
    base_url: String,
    schemas: Vec<NodeSchema>,
    auth: TokenProvider,
}

impl Default for GitHubSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubSource {
    pub fn new() -> Self {
        Self {
            base_url: GITHUB_API_URL.to_string(),
            schemas: schemas(),
            auth: TokenProvider::new(AuthMethod::Static),
        }
    }

    /// Point the source at another API root (GitHub Enterprise, mock servers)
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get(&self, ctx: &FetchContext<'_>, endpoint: &str) -> Result<JsonValue> {
        let token = self.auth.access_token(ctx.runtime, ctx.config).await?;
        let request = FetchRequest::get(format!("{}/{endpoint}", self.base_url))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "conduit-cdk")
            .bearer(&token);

        debug!("GET {endpoint}");
        let response = ctx.runtime.fetch(request).await?;
        if response.status == 404 {
            return Err(Error::fetch(
                "The repository was not found. The repository name should be in the format: owner/repo",
            ));
        }
        response.error_for_status()?.json()
    }

    fn repository(ctx: &FetchContext<'_>) -> Result<String> {
        ctx.config
            .string(REPOSITORY_NAME)
            .map(ToString::to_string)
            .ok_or_else(|| Error::configuration(REPOSITORY_NAME, "Repository name is required"))
    }

    fn schema(&self, node: &str) -> Result<&NodeSchema> {
        self.node_schema(node)
            .ok_or_else(|| Error::schema(node, "Unknown GitHub node"))
    }

    /// Walk every contributors page, flushing each one to `on_batch_ready`
    /// when given. Returns the number of contributors seen.
    async fn contributors(
        &self,
        ctx: &FetchContext<'_>,
        schema: &NodeSchema,
        mut on_batch_ready: Option<&mut dyn BatchReady>,
    ) -> Result<usize> {
        let repository = Self::repository(ctx)?;
        let mut total = 0;
        let mut page = 1;

        loop {
            let body = self
                .get(
                    ctx,
                    &format!("repos/{repository}/contributors?per_page={PER_PAGE}&page={page}"),
                )
                .await?;
            let items = match body {
                JsonValue::Array(items) => items,
                JsonValue::Null => Vec::new(),
                other => {
                    return Err(Error::fetch(format!(
                        "Expected a list of contributors, got {other}"
                    )))
                }
            };

            let count = items.len();
            total += count;
            if let Some(callback) = on_batch_ready.as_deref_mut() {
                let rows = items
                    .iter()
                    .map(|item| select_fields(flatten_object(item), schema, ctx.fields))
                    .collect();
                callback.on_batch_ready(rows).await?;
            }

            if count < PER_PAGE {
                return Ok(total);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl Source for GitHubSource {
    fn name(&self) -> &str {
        "github"
    }

    fn parameters(&self) -> Vec<(String, Parameter)> {
        vec![
            (
                format!("{ACCESS_TOKEN}*"),
                Parameter::new()
                    .label("Access Token")
                    .description("GitHub API Access Token for authentication")
                    .attribute(Attribute::Secret),
            ),
            (
                format!("{REPOSITORY_NAME}*"),
                Parameter::new()
                    .required_type("string")
                    .label("Repository Name")
                    .description("GitHub repository name in format 'owner/repo'"),
            ),
        ]
    }

    fn schemas(&self) -> &[NodeSchema] {
        &self.schemas
    }

    async fn authenticate(
        &self,
        runtime: &dyn HostRuntime,
        config: &mut Configuration,
    ) -> Result<()> {
        self.auth.authorize(runtime, config).await.map(|_| ())
    }

    async fn fetch_catalog(
        &self,
        ctx: &FetchContext<'_>,
        on_batch_ready: &mut dyn BatchReady,
    ) -> Result<Vec<Row>> {
        let schema = self.schema(ctx.node)?;
        match ctx.node {
            "repository" => {
                let repository = Self::repository(ctx)?;
                let body = self.get(ctx, &format!("repos/{repository}")).await?;
                Ok(vec![select_fields(flatten_object(&body), schema, ctx.fields)])
            }
            "contributors" => {
                self.contributors(ctx, schema, Some(on_batch_ready)).await?;
                Ok(Vec::new())
            }
            other => Err(Error::schema(other, "Not a GitHub catalog node")),
        }
    }

    async fn fetch_time_series_day(
        &self,
        ctx: &FetchContext<'_>,
        day: NaiveDate,
    ) -> Result<Vec<Row>> {
        let schema = self.schema(ctx.node)?;
        if ctx.node != "repositoryStats" {
            return Err(Error::schema(ctx.node, "Not a GitHub time-series node"));
        }

        // The API only reports current counts, so they are attributed to
        // the most recent day and never to a historical one
        let latest = ctx.runtime.today().pred_opt().unwrap_or(day);
        if day < latest {
            debug!("No repository snapshot for past day {day}");
            return Ok(Vec::new());
        }

        let repository = Self::repository(ctx)?;
        let repo = self.get(ctx, &format!("repos/{repository}")).await?;
        let contributors = self.contributors(ctx, schema, None).await?;

        let row = flatten_object(&json!({
            "date": ctx.runtime.format_date(day),
            "stars": repo.get("stargazers_count").cloned().unwrap_or(JsonValue::Null),
            "contributors": contributors,
        }));
        Ok(vec![select_fields(row, schema, ctx.fields)])
    }
}

fn schemas() -> Vec<NodeSchema> {
    vec![
        NodeSchema::new("repository")
            .description("Repository metadata")
            .documentation("https://docs.github.com/en/rest/repos/repos#get-a-repository")
            .field("id", FieldType::Integer)
            .field("node_id", FieldType::String)
            .field("name", FieldType::String)
            .field("full_name", FieldType::String)
            .field("private", FieldType::Boolean)
            .field("owner_login", FieldType::String)
            .field("owner_id", FieldType::Integer)
            .field("owner_type", FieldType::String)
            .field("html_url", FieldType::String)
            .field("description", FieldType::String)
            .field("fork", FieldType::Boolean)
            .field("created_at", FieldType::Datetime)
            .field("updated_at", FieldType::Datetime)
            .field("pushed_at", FieldType::Datetime)
            .field("stargazers_count", FieldType::Integer)
            .field("watchers_count", FieldType::Integer)
            .field("forks_count", FieldType::Integer)
            .field("open_issues_count", FieldType::Integer)
            .field("language", FieldType::String)
            .field("default_branch", FieldType::String)
            .unique_keys(["id"])
            .destination_name("github_repository"),
        NodeSchema::new("contributors")
            .description("Repository contributors")
            .documentation(
                "https://docs.github.com/en/rest/repos/repos#list-repository-contributors",
            )
            .field("id", FieldType::Integer)
            .field("login", FieldType::String)
            .field("type", FieldType::String)
            .field("html_url", FieldType::String)
            .field("contributions", FieldType::Integer)
            .unique_keys(["id"])
            .destination_name("github_contributors"),
        NodeSchema::new("repositoryStats")
            .description("Daily stars and contributor count")
            .field("date", FieldType::Date)
            .field("stars", FieldType::Integer)
            .field("contributors", FieldType::Integer)
            .unique_keys(["date"])
            .time_series()
            .destination_name("github_repository_stats"),
    ]
}
